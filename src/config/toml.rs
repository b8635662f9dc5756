//! TOML configuration file parsing

use super::FarmConfig;
use crate::config::cli::Cli;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<FarmConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<FarmConfig> {
    let config: FarmConfig = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: FarmConfig) -> FarmConfig {
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(wait_ms) = cli.wait_ms {
        config.wait_interval_ms = wait_ms;
    }
    if let Some(ref listen) = cli.listen {
        config.listen = listen.clone();
    }
    if let Some(ref connect) = cli.connect {
        config.connect = connect.clone();
    }
    config
}

/// Load the effective configuration for a CLI invocation
pub fn load_config(cli: &Cli) -> Result<FarmConfig> {
    let base = match cli.config {
        Some(ref path) => parse_toml_file(path)?,
        None => FarmConfig::default(),
    };
    Ok(merge_cli_with_config(cli, base))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_parse_toml_basic() {
        let toml = r#"
workers = 4
wait_interval_ms = 250
listen = "0.0.0.0:7000"
connect = "10.0.1.10:7000"
"#;

        let config = parse_toml_string(toml).unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.wait_interval_ms, 250);
        assert_eq!(config.listen, "0.0.0.0:7000");
        assert_eq!(config.connect, "10.0.1.10:7000");
    }

    #[test]
    fn test_parse_toml_defaults() {
        let config = parse_toml_string("workers = 2\n").unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.wait_interval_ms, 5000);
        assert_eq!(config.listen, FarmConfig::default().listen);
    }

    #[test]
    fn test_parse_toml_rejects_bad_types() {
        assert!(parse_toml_string("workers = \"many\"\n").is_err());
    }

    #[test]
    fn test_parse_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers = 3").unwrap();
        writeln!(file, "wait_interval_ms = 10").unwrap();

        let config = parse_toml_file(file.path()).unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.wait_interval_ms, 10);
    }

    #[test]
    fn test_parse_toml_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_toml_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read config file"));
    }

    #[test]
    fn test_cli_overrides_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers = 3").unwrap();
        writeln!(file, "wait_interval_ms = 10").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::parse_from([
            "taskfarm",
            "--tasks",
            "t.json",
            "--config",
            path.as_str(),
            "--workers",
            "8",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.workers, 8);
        assert_eq!(config.wait_interval_ms, 10);
    }
}
