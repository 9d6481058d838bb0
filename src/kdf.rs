//! Per-image key derivation.
//!
//! ```text
//! image_key = HKDF-SHA256(ikm = master_key, salt = per-image salt, info = context)
//! seed      = HMAC-SHA256(image_key, "perm-seed")
//! ```
//!
//! The seed drives [`crate::permutation::generate_permutation`]. Other values
//! can be derived from the same image key by MAC-ing a different label.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::permutation::generate_permutation;

type HmacSha256 = Hmac<Sha256>;

/// Per-image salt length in bytes.
pub const SALT_LEN: usize = 16;
/// Length of the derived image key and permutation seed.
pub const KEY_LEN: usize = 32;

const PERM_SEED_LABEL: &[u8] = b"perm-seed";

/// Fresh salt from the thread-local CSPRNG.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// HKDF-SHA256 of the master key, salted per image and bound to `context`.
pub fn derive_image_key(master_key: &[u8], salt: &[u8], context: &str) -> Zeroizing<[u8; KEY_LEN]> {
    let hk = Hkdf::<Sha256>::new(Some(salt), master_key);
    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(context.as_bytes(), &mut *okm)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    okm
}

/// HMAC-SHA256 of the `"perm-seed"` label under the image key.
pub fn derive_permutation_seed(image_key: &[u8; KEY_LEN]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut mac = HmacSha256::new_from_slice(image_key).expect("HMAC can take key of any size");
    mac.update(PERM_SEED_LABEL);
    Zeroizing::new(mac.finalize().into_bytes().into())
}

/// Seed for the tile permutation of one image.
pub fn permutation_seed(master_key: &[u8], salt: &[u8], context: &str) -> Zeroizing<[u8; KEY_LEN]> {
    let image_key = derive_image_key(master_key, salt, context);
    derive_permutation_seed(&image_key)
}

/// Full chain: key derivation, seed derivation and shuffle over `n` tiles.
pub fn permutation_for(master_key: &[u8], salt: &[u8], context: &str, n: usize) -> Vec<usize> {
    let seed = permutation_seed(master_key, salt, context);
    generate_permutation(&*seed, n)
}
