use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What happens to the resident day's unflushed rows when a different day
/// is accessed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionPolicy {
    /// Drop unflushed rows (logged as a warning). Rows already flushed stay
    /// on disk and are reloaded on the next access to that day.
    #[default]
    Discard,
    /// Flush the resident day before switching.
    FlushFirst,
}

/// Everything needed to construct a
/// [`PartitionedLogger`](crate::logger::PartitionedLogger).
///
/// ```toml
/// category = "sample"
/// root_dir = "/var/lib/meter"
/// columns = ["A", "B", "C"]
/// auto_flush = false
/// eviction = "flush-first"
/// durable = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub category: String,
    pub root_dir: PathBuf,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default = "default_true")]
    pub auto_flush: bool,
    #[serde(default)]
    pub eviction: EvictionPolicy,
    /// fsync each partition file before it replaces the previous one.
    #[serde(default)]
    pub durable: bool,
}

impl LoggerConfig {
    /// Config with the given identity and every other field defaulted.
    #[must_use]
    pub fn new(category: impl Into<String>, root_dir: impl Into<PathBuf>) -> Self {
        Self {
            category: category.into(),
            root_dir: root_dir.into(),
            columns: Vec::new(),
            auto_flush: default_true(),
            eviction: EvictionPolicy::default(),
            durable: false,
        }
    }

    #[must_use]
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn with_auto_flush(mut self, auto_flush: bool) -> Self {
        self.auto_flush = auto_flush;
        self
    }

    #[must_use]
    pub const fn with_eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }

    #[must_use]
    pub const fn with_durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    /// Load a config from a TOML file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not a valid config.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        toml::from_str::<Self>(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg: LoggerConfig =
            toml::from_str("category = \"sample\"\nroot_dir = \"/tmp/meter\"\n").expect("parse");
        assert_eq!(cfg, LoggerConfig::new("sample", "/tmp/meter"));
        assert!(cfg.auto_flush);
        assert!(cfg.columns.is_empty());
        assert_eq!(cfg.eviction, EvictionPolicy::Discard);
        assert!(!cfg.durable);
    }

    #[test]
    fn full_config_parses() {
        let content = r#"
category = "sample"
root_dir = "/var/lib/meter"
columns = ["A", "B", "C"]
auto_flush = false
eviction = "flush-first"
durable = true
"#;
        let cfg: LoggerConfig = toml::from_str(content).expect("parse");
        let expected = LoggerConfig::new("sample", "/var/lib/meter")
            .with_columns(["A", "B", "C"])
            .with_auto_flush(false)
            .with_eviction(EvictionPolicy::FlushFirst)
            .with_durable(true);
        assert_eq!(cfg, expected);
    }

    #[test]
    fn unknown_eviction_is_rejected() {
        let content = "category = \"s\"\nroot_dir = \"/r\"\neviction = \"sometimes\"\n";
        assert!(toml::from_str::<LoggerConfig>(content).is_err());
    }

    #[test]
    fn load_reads_file() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("daylog.toml");
        std::fs::write(&path, "category = \"meter\"\nroot_dir = \"data\"\n").expect("write");

        let cfg = LoggerConfig::load(&path).expect("load");
        assert_eq!(cfg.category, "meter");
        assert_eq!(cfg.root_dir, PathBuf::from("data"));
    }

    #[test]
    fn load_missing_file_mentions_path() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("absent.toml");
        let err = LoggerConfig::load(&path).expect_err("missing");
        assert!(format!("{err:#}").contains("absent.toml"));
    }
}
