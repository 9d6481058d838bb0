//! Process-wide scrambler configuration.
//!
//! Built once at startup from a JSON file or the environment, validated on
//! construction and never mutated afterwards. Algorithmic code receives it by
//! reference.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use zeroize::Zeroizing;

use crate::error::ConfigError;
use crate::metadata::MAX_TILE_COUNT;

/// Environment variable prefix for [`ScramblerConfig::from_env`].
pub const ENV_PREFIX: &str = "TILESCRAMBLE_";

pub const DEFAULT_CONTEXT: &str = "media-scramble-v1";
pub const DEFAULT_TILE_ROWS: u32 = 12;
pub const DEFAULT_TILE_COLS: u32 = 24;
pub const DEFAULT_VERSION: u32 = 1;

#[derive(Clone)]
pub struct ScramblerConfig {
    enabled: bool,
    master_key: Zeroizing<Vec<u8>>,
    context_string: String,
    tile_rows: u32,
    tile_cols: u32,
    version: u32,
    legacy_contexts: BTreeMap<u32, String>,
}

/// On-disk shape. Field names follow the persisted metadata (camelCase).
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawConfig {
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    master_key: Option<String>,
    #[serde(default = "default_context")]
    context_string: String,
    #[serde(default = "default_rows")]
    tile_rows: u32,
    #[serde(default = "default_cols")]
    tile_cols: u32,
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    legacy_contexts: BTreeMap<u32, String>,
}

fn default_enabled() -> bool {
    true
}
fn default_context() -> String {
    DEFAULT_CONTEXT.to_string()
}
fn default_rows() -> u32 {
    DEFAULT_TILE_ROWS
}
fn default_cols() -> u32 {
    DEFAULT_TILE_COLS
}
fn default_version() -> u32 {
    DEFAULT_VERSION
}

impl ScramblerConfig {
    /// Enabled configuration with the default grid and version.
    pub fn new(master_key: impl AsRef<[u8]>, context_string: impl Into<String>) -> Result<Self, ConfigError> {
        Self {
            enabled: true,
            master_key: Zeroizing::new(master_key.as_ref().to_vec()),
            context_string: context_string.into(),
            tile_rows: DEFAULT_TILE_ROWS,
            tile_cols: DEFAULT_TILE_COLS,
            version: DEFAULT_VERSION,
            legacy_contexts: BTreeMap::new(),
        }
        .validated()
    }

    /// Scrambling switched off; no key material required.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            master_key: Zeroizing::new(Vec::new()),
            context_string: DEFAULT_CONTEXT.to_string(),
            tile_rows: DEFAULT_TILE_ROWS,
            tile_cols: DEFAULT_TILE_COLS,
            version: DEFAULT_VERSION,
            legacy_contexts: BTreeMap::new(),
        }
    }

    pub fn with_grid(mut self, tile_rows: u32, tile_cols: u32) -> Result<Self, ConfigError> {
        self.tile_rows = tile_rows;
        self.tile_cols = tile_cols;
        self.validated()
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Keep the context string that was in force for an older `version`, so
    /// images stored under it stay recoverable.
    pub fn with_legacy_context(mut self, version: u32, context_string: impl Into<String>) -> Self {
        self.legacy_contexts.insert(version, context_string.into());
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(json)?;
        Self {
            enabled: raw.enabled,
            master_key: Zeroizing::new(raw.master_key.map(String::into_bytes).unwrap_or_default()),
            context_string: raw.context_string,
            tile_rows: raw.tile_rows,
            tile_cols: raw.tile_cols,
            version: raw.version,
            legacy_contexts: raw.legacy_contexts,
        }
        .validated()
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = Zeroizing::new(std::fs::read_to_string(path)?);
        Self::from_json_str(&text)
    }

    /// Read `TILESCRAMBLE_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Names are looked up with
    /// [`ENV_PREFIX`] prepended.
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `ENABLED` | `true`/`false` (also `1`/`0`, `yes`/`no`, `on`/`off`) |
    /// | `MASTER_KEY` | raw key material, used as its UTF-8 bytes |
    /// | `CONTEXT` | domain-separation string |
    /// | `TILE_ROWS`, `TILE_COLS` | grid size |
    /// | `VERSION` | format version stored with each image |
    /// | `LEGACY_CONTEXTS` | `version=context` pairs separated by `;` |
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(format!("{ENV_PREFIX}{key}").as_str());

        let enabled = match var("ENABLED") {
            Some(v) => parse_bool("ENABLED", &v)?,
            None => true,
        };
        let mut legacy_contexts = BTreeMap::new();
        if let Some(list) = var("LEGACY_CONTEXTS") {
            for pair in list.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                let (version, context) = pair.split_once('=').ok_or_else(|| ConfigError::InvalidValue {
                    key: "LEGACY_CONTEXTS",
                    value: pair.to_string(),
                })?;
                legacy_contexts.insert(parse_u32("LEGACY_CONTEXTS", version.trim())?, context.trim().to_string());
            }
        }

        Self {
            enabled,
            master_key: Zeroizing::new(var("MASTER_KEY").map(String::into_bytes).unwrap_or_default()),
            context_string: var("CONTEXT").unwrap_or_else(default_context),
            tile_rows: var("TILE_ROWS").map(|v| parse_u32("TILE_ROWS", &v)).transpose()?.unwrap_or(DEFAULT_TILE_ROWS),
            tile_cols: var("TILE_COLS").map(|v| parse_u32("TILE_COLS", &v)).transpose()?.unwrap_or(DEFAULT_TILE_COLS),
            version: var("VERSION").map(|v| parse_u32("VERSION", &v)).transpose()?.unwrap_or(DEFAULT_VERSION),
            legacy_contexts,
        }
        .validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        let tiles = u64::from(self.tile_rows) * u64::from(self.tile_cols);
        if tiles == 0 || tiles > MAX_TILE_COUNT {
            return Err(ConfigError::InvalidGrid {
                rows: self.tile_rows,
                cols: self.tile_cols,
            });
        }
        if self.enabled {
            if self.master_key.is_empty() {
                return Err(ConfigError::MissingMasterKey);
            }
            if self.context_string.is_empty() {
                return Err(ConfigError::EmptyContext);
            }
        }
        Ok(self)
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn master_key(&self) -> &[u8] {
        &self.master_key
    }

    pub fn context_string(&self) -> &str {
        &self.context_string
    }

    pub fn tile_rows(&self) -> u32 {
        self.tile_rows
    }

    pub fn tile_cols(&self) -> u32 {
        self.tile_cols
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Context string for images stored under `version`, or `None` when the
    /// version is neither current nor registered as legacy.
    pub fn context_for_version(&self, version: u32) -> Option<&str> {
        if version == self.version {
            return Some(&self.context_string);
        }
        self.legacy_contexts.get(&version).map(String::as_str)
    }
}

impl fmt::Debug for ScramblerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScramblerConfig")
            .field("enabled", &self.enabled)
            .field("master_key", &"<redacted>")
            .field("context_string", &self.context_string)
            .field("tile_rows", &self.tile_rows)
            .field("tile_cols", &self.tile_cols)
            .field("version", &self.version)
            .field("legacy_contexts", &self.legacy_contexts)
            .finish()
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

fn parse_u32(key: &'static str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
