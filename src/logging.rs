use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode, WriteLogger};
use std::fs::OpenOptions;
use std::str::FromStr;

/// Environment variable that turns logging on at the given level.
pub const LOG_ENV: &str = "PIPESH_LOG";

/// Install the global logger described by `config`.
///
/// `$PIPESH_LOG` overrides the configured level and forces logging to stderr.
/// When logging is disabled nothing is installed and the `log` macros stay silent.
pub fn init(config: &LoggingConfig) -> Result<()> {
    init_with(config, std::env::var(LOG_ENV).ok())
}

fn init_with(config: &LoggingConfig, from_env: Option<String>) -> Result<()> {
    let Some(target) = plan(config, from_env)? else {
        return Ok(());
    };

    let log_config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .build();

    match target {
        Target::Stderr(level) => {
            TermLogger::init(level, log_config, TerminalMode::Stderr, ColorChoice::Auto)
                .context("logger already installed")
        }
        Target::File(level, path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("can't open log file {}", path.display()))?;
            WriteLogger::init(level, log_config, file).context("logger already installed")
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Target {
    Stderr(LevelFilter),
    File(LevelFilter, std::path::PathBuf),
}

fn parse_level(level: &str) -> Result<LevelFilter> {
    LevelFilter::from_str(level.trim()).with_context(|| format!("unknown log level `{level}`"))
}

fn plan(config: &LoggingConfig, from_env: Option<String>) -> Result<Option<Target>> {
    if let Some(level) = from_env.filter(|l| !l.trim().is_empty()) {
        return Ok(Some(Target::Stderr(parse_level(&level)?)));
    }
    if !config.enabled {
        return Ok(None);
    }
    let level = parse_level(&config.level)?;
    Ok(Some(match &config.file {
        Some(path) => Target::File(level, path.clone()),
        None => Target::Stderr(level),
    }))
}
