//! Persisted per-image scramble record.
//!
//! Stored by the caller as a small camelCase JSON object, usually nested in a
//! larger document under [`DOCUMENT_FIELD`]:
//!
//! ```json
//! { "enabled": true, "version": 1, "salt": "AAAAAAAAAAAAAAAAAAAAAA", "tileRows": 4, "tileCols": 4 }
//! ```
//!
//! The salt is base64url without padding. Nothing in the record is
//! authenticated: an edited grid or salt yields a different, valid-looking
//! permutation rather than an error.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::MetadataError;
use crate::kdf::SALT_LEN;

/// Key under which callers embed the record in their own metadata document.
pub const DOCUMENT_FIELD: &str = "scramble";

/// Largest grid a record may name. Each tile covers at least one pixel, so
/// this also bounds the permutation built for a record before any image is
/// looked at.
pub const MAX_TILE_COUNT: u64 = 1 << 24;

/// base64url, unpadded on output, padding tolerated on input.
pub const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrambleMetadata {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_rows: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_cols: Option<u32>,
}

/// A validated record of a scrambled image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMetadata {
    pub version: u32,
    pub salt: [u8; SALT_LEN],
    pub tile_rows: u32,
    pub tile_cols: u32,
}

impl ResolvedMetadata {
    pub fn tile_count(&self) -> usize {
        self.tile_rows as usize * self.tile_cols as usize
    }
}

impl ScrambleMetadata {
    pub fn scrambled(version: u32, salt: &[u8; SALT_LEN], tile_rows: u32, tile_cols: u32) -> Self {
        Self {
            enabled: true,
            version: Some(version),
            salt: Some(BASE64URL.encode(salt)),
            tile_rows: Some(tile_rows),
            tile_cols: Some(tile_cols),
        }
    }

    /// Record for an image stored while scrambling was off: no salt, no grid.
    pub fn disabled(version: u32) -> Self {
        Self {
            enabled: false,
            version: Some(version),
            salt: None,
            tile_rows: None,
            tile_cols: None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, MetadataError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| MetadataError::Malformed(e.to_string()))?;
        Self::from_document(&value)
    }

    /// Accepts either the record itself or a caller document carrying it
    /// under [`DOCUMENT_FIELD`].
    pub fn from_document(doc: &serde_json::Value) -> Result<Self, MetadataError> {
        let record = match doc.get(DOCUMENT_FIELD) {
            Some(serde_json::Value::Null) => return Err(MetadataError::Absent),
            Some(inner) => inner,
            None if doc.get("enabled").is_some() => doc,
            None => return Err(MetadataError::Absent),
        };
        serde_json::from_value(record.clone()).map_err(|e| MetadataError::Malformed(e.to_string()))
    }

    pub fn to_json(&self) -> String {
        // A struct of plain scalars always serialises.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Validate the record for permutation recovery.
    pub fn resolve(&self) -> Result<ResolvedMetadata, MetadataError> {
        if !self.enabled {
            return Err(MetadataError::NotEnabled);
        }
        let version = self.version.ok_or(MetadataError::MissingField("version"))?;
        let encoded = self.salt.as_deref().ok_or(MetadataError::MissingField("salt"))?;
        let tile_rows = self.tile_rows.ok_or(MetadataError::MissingField("tileRows"))?;
        let tile_cols = self.tile_cols.ok_or(MetadataError::MissingField("tileCols"))?;
        if tile_rows == 0 || tile_cols == 0 {
            return Err(MetadataError::Malformed(format!(
                "tile grid {tile_rows}x{tile_cols} is empty"
            )));
        }
        // u32 * u32 always fits in u64.
        let tiles = u64::from(tile_rows) * u64::from(tile_cols);
        if tiles > MAX_TILE_COUNT {
            return Err(MetadataError::Malformed(format!(
                "tile grid {tile_rows}x{tile_cols} exceeds {MAX_TILE_COUNT} tiles"
            )));
        }

        let raw = BASE64URL
            .decode(encoded.trim())
            .map_err(|e| MetadataError::BadSalt(e.to_string()))?;
        let salt: [u8; SALT_LEN] = raw.as_slice().try_into().map_err(|_| {
            MetadataError::BadSalt(format!("expected {SALT_LEN} bytes, got {}", raw.len()))
        })?;

        Ok(ResolvedMetadata {
            version,
            salt,
            tile_rows,
            tile_cols,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_shape_is_camel_case() {
        let meta = ScrambleMetadata::scrambled(1, &[0u8; SALT_LEN], 4, 6);
        let value: serde_json::Value = serde_json::from_str(&meta.to_json()).unwrap();
        assert_eq!(
            value,
            json!({
                "enabled": true,
                "version": 1,
                "salt": "AAAAAAAAAAAAAAAAAAAAAA",
                "tileRows": 4,
                "tileCols": 6
            })
        );
    }

    #[test]
    fn disabled_record_has_no_salt() {
        let value: serde_json::Value =
            serde_json::from_str(&ScrambleMetadata::disabled(3).to_json()).unwrap();
        assert_eq!(value, json!({ "enabled": false, "version": 3 }));
    }

    #[test]
    fn resolves_from_nested_document() {
        let salt = [0xfbu8; SALT_LEN];
        let doc = json!({
            "originalName": "cat.jpg",
            "uploaderId": 42,
            "scramble": ScrambleMetadata::scrambled(2, &salt, 3, 5),
        });
        let resolved = ScrambleMetadata::from_document(&doc).unwrap().resolve().unwrap();
        assert_eq!(
            resolved,
            ResolvedMetadata {
                version: 2,
                salt,
                tile_rows: 3,
                tile_cols: 5
            }
        );
        assert_eq!(resolved.tile_count(), 15);
    }

    #[test]
    fn padded_salt_is_accepted() {
        let meta = ScrambleMetadata::from_json(
            r#"{"enabled":true,"version":1,"salt":"AAAAAAAAAAAAAAAAAAAAAA==","tileRows":2,"tileCols":2}"#,
        )
        .unwrap();
        assert_eq!(meta.resolve().unwrap().salt, [0u8; SALT_LEN]);
    }

    #[test]
    fn not_enabled_is_reported_first() {
        let err = ScrambleMetadata::disabled(1).resolve().unwrap_err();
        assert!(matches!(err, MetadataError::NotEnabled));
    }

    #[test]
    fn missing_fields_are_named() {
        let meta = ScrambleMetadata::from_json(r#"{"enabled":true,"version":1,"tileRows":2,"tileCols":2}"#).unwrap();
        assert!(matches!(meta.resolve(), Err(MetadataError::MissingField("salt"))));

        let meta = ScrambleMetadata::from_json(r#"{"enabled":true,"version":1,"salt":"AAAAAAAAAAAAAAAAAAAAAA"}"#).unwrap();
        assert!(matches!(meta.resolve(), Err(MetadataError::MissingField("tileRows"))));
    }

    #[test]
    fn short_salt_rejected() {
        let meta = ScrambleMetadata::from_json(
            r#"{"enabled":true,"version":1,"salt":"AAAA","tileRows":2,"tileCols":2}"#,
        )
        .unwrap();
        assert!(matches!(meta.resolve(), Err(MetadataError::BadSalt(_))));
    }

    #[test]
    fn unparseable_json_is_malformed() {
        assert!(matches!(
            ScrambleMetadata::from_json("{not json"),
            Err(MetadataError::Malformed(_))
        ));
        assert!(matches!(
            ScrambleMetadata::from_json(r#"{"enabled":"yes"}"#),
            Err(MetadataError::Malformed(_))
        ));
    }

    #[test]
    fn oversized_grid_is_malformed() {
        let meta = ScrambleMetadata::from_json(
            r#"{"enabled":true,"version":1,"salt":"AAAAAAAAAAAAAAAAAAAAAA","tileRows":4294967295,"tileCols":4294967295}"#,
        )
        .unwrap();
        assert!(matches!(meta.resolve(), Err(MetadataError::Malformed(_))));

        let meta = ScrambleMetadata::scrambled(1, &[0u8; SALT_LEN], 65536, 65536);
        assert!(matches!(meta.resolve(), Err(MetadataError::Malformed(_))));

        let meta = ScrambleMetadata::scrambled(1, &[0u8; SALT_LEN], 4096, 4096);
        assert_eq!(meta.resolve().unwrap().tile_count(), MAX_TILE_COUNT as usize);
    }

    #[test]
    fn document_without_record_is_absent() {
        assert!(matches!(
            ScrambleMetadata::from_document(&json!({ "originalName": "a.png" })),
            Err(MetadataError::Absent)
        ));
        assert!(matches!(
            ScrambleMetadata::from_document(&json!({ "scramble": null })),
            Err(MetadataError::Absent)
        ));
    }
}
