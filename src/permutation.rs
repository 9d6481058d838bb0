//! Tile permutation.
//!
//! `P[i]` is the destination slot of the tile originally at linear index `i`.
//! The shuffle is a descending Fisher-Yates driven by [`Mulberry32`]; the
//! iteration order and the `floor(r * (i + 1))` draw are part of the stored
//! format, since previously scrambled images can only be restored by
//! regenerating exactly the same sequence.

use crate::prng::Mulberry32;

/// Generate the permutation of `0..n` for `seed`.
pub fn generate_permutation(seed: &[u8], n: usize) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..n).collect();
    let mut rng = Mulberry32::new(seed);
    for i in (1..n).rev() {
        let j = (rng.next_f64() * (i + 1) as f64) as usize;
        perm.swap(i, j);
    }
    perm
}

/// Inverse mapping: `inv[P[i]] == i`.
pub fn invert(perm: &[usize]) -> Vec<usize> {
    let mut inv = vec![0usize; perm.len()];
    for (src, &dst) in perm.iter().enumerate() {
        inv[dst] = src;
    }
    inv
}

/// True if every value in `0..perm.len()` appears exactly once.
pub fn is_bijection(perm: &[usize]) -> bool {
    let mut seen = vec![false; perm.len()];
    for &dst in perm {
        match seen.get_mut(dst) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}
