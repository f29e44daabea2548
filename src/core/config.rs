//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, TriageError};
use crate::triage::quarantine::IndexFormat;

/// Full triage pipeline configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub registry: RegistryConfig,
    pub cache: CacheConfig,
    pub quarantine: QuarantineConfig,
    pub scan: ScanConfig,
    pub log: LogConfig,
}

/// Registry entity and tagging knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RegistryConfig {
    /// Entity type queried and updated (the registry schema name).
    pub entity_type: String,
    /// Tag pushed onto infected records.
    pub quarantine_tag_id: i64,
}

/// Local cache store location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Root directory for canonical cached downloads.
    pub root: PathBuf,
}

/// Quarantine index persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QuarantineConfig {
    /// File the index is appended to on every detection.
    pub index_path: PathBuf,
    /// On-disk format for index appends.
    pub index_format: IndexFormat,
}

/// Candidate selection and signature knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    /// Byte signature whose presence marks a file infected.
    pub signature: String,
    /// Relative calendar-window offset in months (negative; -2 = last
    /// two calendar months).
    pub calendar_window_offset: i32,
    /// Filename suffixes eligible for triage (each with leading dot).
    pub suffixes: Vec<String>,
}

/// Run-log sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// Append-only JSONL activity log path.
    pub run_log: PathBuf,
}

fn data_dir() -> PathBuf {
    let home_dir = env::var_os("HOME").map_or_else(
        || {
            eprintln!("[ATG-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    );
    home_dir.join(".local").join("share").join("atriage")
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            entity_type: "Attachment".to_string(),
            quarantine_tag_id: 4379,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: data_dir().join("cache"),
        }
    }
}

impl Default for QuarantineConfig {
    fn default() -> Self {
        Self {
            index_path: data_dir().join("source_files.json"),
            index_format: IndexFormat::Snapshot,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            signature: "phage".to_string(),
            calendar_window_offset: -2,
            suffixes: vec![".mb".to_string(), ".ma".to_string()],
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            run_log: data_dir().join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        let home_dir = env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);
        home_dir
            .join(".config")
            .join("atriage")
            .join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| TriageError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(TriageError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Signature as raw bytes for the scanner.
    #[must_use]
    pub fn signature_bytes(&self) -> &[u8] {
        self.scan.signature.as_bytes()
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(raw) = env_var("ATG_REGISTRY_ENTITY_TYPE") {
            self.registry.entity_type = raw;
        }
        set_env_i64(
            "ATG_REGISTRY_QUARANTINE_TAG_ID",
            &mut self.registry.quarantine_tag_id,
        )?;
        if let Some(raw) = env_var("ATG_CACHE_ROOT") {
            self.cache.root = PathBuf::from(raw);
        }
        if let Some(raw) = env_var("ATG_QUARANTINE_INDEX_PATH") {
            self.quarantine.index_path = PathBuf::from(raw);
        }
        if let Some(raw) = env_var("ATG_QUARANTINE_INDEX_FORMAT") {
            self.quarantine.index_format = match raw.as_str() {
                "snapshot" => IndexFormat::Snapshot,
                "jsonl" => IndexFormat::Jsonl,
                other => {
                    return Err(TriageError::ConfigParse {
                        context: "env",
                        details: format!(
                            "ATG_QUARANTINE_INDEX_FORMAT={other:?}: expected \"snapshot\" or \"jsonl\""
                        ),
                    });
                }
            };
        }
        if let Some(raw) = env_var("ATG_SCAN_SIGNATURE") {
            self.scan.signature = raw;
        }
        set_env_i32(
            "ATG_SCAN_CALENDAR_WINDOW_OFFSET",
            &mut self.scan.calendar_window_offset,
        )?;
        if let Some(raw) = env_var("ATG_SCAN_SUFFIXES") {
            self.scan.suffixes = raw.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Some(raw) = env_var("ATG_LOG_RUN_LOG") {
            self.log.run_log = PathBuf::from(raw);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.registry.entity_type.trim().is_empty() {
            return Err(TriageError::InvalidConfig {
                details: "registry.entity_type must not be empty".to_string(),
            });
        }
        if self.registry.quarantine_tag_id <= 0 {
            return Err(TriageError::InvalidConfig {
                details: format!(
                    "registry.quarantine_tag_id must be > 0, got {}",
                    self.registry.quarantine_tag_id
                ),
            });
        }
        if self.scan.signature.is_empty() {
            return Err(TriageError::InvalidConfig {
                details: "scan.signature must not be empty".to_string(),
            });
        }
        if self.scan.calendar_window_offset >= 0 {
            return Err(TriageError::InvalidConfig {
                details: format!(
                    "scan.calendar_window_offset must be negative (months back), got {}",
                    self.scan.calendar_window_offset
                ),
            });
        }
        if self.scan.suffixes.is_empty() {
            return Err(TriageError::InvalidConfig {
                details: "scan.suffixes must list at least one filename suffix".to_string(),
            });
        }
        for suffix in &self.scan.suffixes {
            if !suffix.starts_with('.') || suffix.len() < 2 {
                return Err(TriageError::InvalidConfig {
                    details: format!("scan.suffixes entry {suffix:?} must start with '.'"),
                });
            }
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_env_i64(name: &str, slot: &mut i64) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<i64>().map_err(|error| TriageError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn set_env_i32(name: &str, slot: &mut i32) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<i32>().map_err(|error| TriageError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}
