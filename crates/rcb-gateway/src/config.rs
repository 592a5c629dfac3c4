use anyhow::{Context, Result};
use std::path::PathBuf;

use rcb_types::config::BridgeConfig;

/// Returns the bridge home directory (~/.rconbridge/)
pub fn bridge_home() -> PathBuf {
    dirs::home_dir()
        .expect("Could not determine home directory")
        .join(".rconbridge")
}

/// Returns the path to the config file (~/.rconbridge/config.toml)
pub fn config_path() -> PathBuf {
    bridge_home().join("config.toml")
}

/// Load config from disk, creating a default file if it doesn't exist.
/// `RCON_PASSWORD` in the environment overrides the stored password.
pub fn load_config() -> Result<BridgeConfig> {
    let path = config_path();

    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?
    } else {
        let home = bridge_home();
        std::fs::create_dir_all(&home)
            .with_context(|| format!("Failed to create {}", home.display()))?;
        let default = BridgeConfig::default();
        let toml_str = toml::to_string_pretty(&default)
            .context("Failed to serialize default config")?;
        std::fs::write(&path, toml_str)
            .with_context(|| format!("Failed to write default config to {}", path.display()))?;
        default
    };

    if let Ok(password) = std::env::var("RCON_PASSWORD") {
        if !password.is_empty() {
            config.rcon.password = password;
        }
    }

    Ok(config)
}

/// Save config to disk, overwriting the existing file.
pub fn save_config(config: &BridgeConfig) -> Result<()> {
    let path = config_path();
    let toml_str = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(&path, toml_str)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_home_is_under_the_expected_directory() {
        let home = bridge_home();
        assert!(home.to_string_lossy().contains(".rconbridge"));
    }

    #[test]
    fn default_config_roundtrips() {
        let config = BridgeConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: BridgeConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.http.port, config.http.port);
        assert_eq!(parsed.rcon.port, 25575);
        assert_eq!(parsed.rcon.reply_timeout_ms, 2000);
    }

    #[test]
    fn reply_timeout_defaults_when_absent() {
        let parsed: BridgeConfig = toml::from_str(
            "[http]\nhost = \"0.0.0.0\"\nport = 8080\n\n[rcon]\nhost = \"127.0.0.1\"\nport = 25575\n",
        )
        .unwrap();
        assert_eq!(parsed.rcon.reply_timeout_ms, 2000);
        assert!(parsed.rcon.password.is_empty());
    }
}
