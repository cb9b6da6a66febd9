mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./clipforge.toml",
        "~/.config/clipforge/config.toml",
        "/etc/clipforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.batch.concurrency == 0 {
        anyhow::bail!("batch.concurrency must be at least 1");
    }
    if config.engine.timeout_secs == 0 {
        anyhow::bail!("engine.timeout_secs must be at least 1");
    }
    if config.model.name.trim().is_empty() {
        anyhow::bail!("model.name must not be empty");
    }
    for pack in &config.packs {
        if !pack.exists() {
            anyhow::bail!("skill pack not found: {:?}", pack);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.retry.decode_retries, 1);
        assert_eq!(config.retry.execution_retries, 2);
    }

    #[test]
    fn parses_partial_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[engine]\ntimeout_secs = 120\n\n[batch]\nconcurrency = 4\n"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.engine.timeout_secs, 120);
        assert_eq!(config.batch.concurrency, 4);
        assert_eq!(config.retry.execution_retries, 2);
    }

    #[test]
    fn rejects_zero_concurrency() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[batch]\nconcurrency = 0\n").unwrap();
        assert!(load_config(file.path()).is_err());
    }
}
