use crate::error::ConfigError;
use crate::executor::DEFAULT_FEEDER_GRACE;
use crate::resolver::DEFAULT_CACHE_CAPACITY;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming a config file, consulted when `--config` is absent.
pub const CONFIG_ENV: &str = "PIPESH_CONFIG";

// ── Config types ──

/// Shell configuration, read from TOML. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellConfig {
    pub prompt: String,
    /// Entries kept by the line editor's in-memory history.
    pub history_size: usize,
    pub resolver: ResolverConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// External commands kept in the LRU cache.
    pub cache_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// How long a stdin feeder may outlive its process chain.
    pub feeder_grace_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub level: String,
    /// Log to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: "$ ".to_string(),
            history_size: 1000,
            resolver: ResolverConfig::default(),
            pipeline: PipelineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            feeder_grace_ms: DEFAULT_FEEDER_GRACE.as_millis() as u64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "info".to_string(),
            file: None,
        }
    }
}

impl PipelineConfig {
    pub fn feeder_grace(&self) -> Duration {
        Duration::from_millis(self.feeder_grace_ms)
    }
}

// ── Loading ──

impl ShellConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Read and parse one config file.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the configuration for this process.
    ///
    /// `explicit` (from `--config`) wins, then `$PIPESH_CONFIG`; both must exist.
    /// Otherwise `$HOME/.config/pipesh/config.toml` is used if present, and the
    /// defaults if not.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let located = locate(
            explicit,
            std::env::var_os(CONFIG_ENV),
            std::env::var_os("HOME"),
        );
        match located {
            Some(Located::Required(path)) => Self::read(&path),
            Some(Located::Optional(path)) if path.is_file() => Self::read(&path),
            _ => Ok(Self::default()),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Located {
    Required(PathBuf),
    Optional(PathBuf),
}

fn locate(
    explicit: Option<&Path>,
    from_env: Option<OsString>,
    home: Option<OsString>,
) -> Option<Located> {
    if let Some(path) = explicit {
        return Some(Located::Required(path.to_path_buf()));
    }
    if let Some(path) = from_env.filter(|p| !p.is_empty()) {
        return Some(Located::Required(PathBuf::from(path)));
    }
    home.map(|home| Located::Optional(default_path(Path::new(&home))))
}

/// `~/.config/pipesh/config.toml` for the given home directory.
pub fn default_path(home: &Path) -> PathBuf {
    home.join(".config/pipesh/config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_means_defaults() {
        let config = ShellConfig::from_toml_str("").unwrap();
        assert_eq!(config, ShellConfig::default());
        assert_eq!(config.resolver.cache_capacity, 100);
        assert_eq!(config.pipeline.feeder_grace(), Duration::from_millis(100));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = ShellConfig::from_toml_str(
            r#"
            prompt = "> "

            [resolver]
            cache_capacity = 8

            [logging]
            enabled = true
            file = "/tmp/pipesh.log"
            "#,
        )
        .unwrap();

        assert_eq!(config.prompt, "> ");
        assert_eq!(config.history_size, 1000);
        assert_eq!(config.resolver.cache_capacity, 8);
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert!(config.logging.enabled);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/pipesh.log")));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(ShellConfig::from_toml_str("promt = \"typo\"").is_err());
        assert!(ShellConfig::from_toml_str("[resolver]\nsize = 3").is_err());
    }

    #[test]
    fn read_reports_path_on_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let broken = tmp.path().join("broken.toml");
        std::fs::write(&broken, "history_size = \"many\"").unwrap();

        let err = ShellConfig::read(&broken).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.toml"));

        let err = ShellConfig::read(&tmp.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn lookup_order() {
        let explicit = Path::new("/etc/explicit.toml");

        assert_eq!(
            locate(Some(explicit), Some("/env.toml".into()), Some("/home/u".into())),
            Some(Located::Required(explicit.to_path_buf()))
        );
        assert_eq!(
            locate(None, Some("/env.toml".into()), Some("/home/u".into())),
            Some(Located::Required(PathBuf::from("/env.toml")))
        );
        assert_eq!(
            locate(None, Some("".into()), Some("/home/u".into())),
            Some(Located::Optional(PathBuf::from("/home/u/.config/pipesh/config.toml")))
        );
        assert_eq!(locate(None, None, None), None);
    }
}
