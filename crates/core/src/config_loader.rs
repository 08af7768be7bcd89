use crate::config::AppConfig;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

/// Default location of the TOML configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/Config.toml";

/// Prefix for environment overrides, e.g. `WHEEL_TASTYTRADE__CLIENT_ID`.
pub const ENV_PREFIX: &str = "WHEEL_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from the default TOML file and environment.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed or fails validation.
    pub fn load() -> Result<AppConfig> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Loads configuration by layering built-in defaults, a TOML file and
    /// `WHEEL_`-prefixed environment variables (later layers win).
    ///
    /// A missing file is not an error; everything can come from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed or fails validation.
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig> {
        let path = path.as_ref();
        let config: AppConfig = Self::figment(path)
            .extract()
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;

        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

        tracing::debug!(path = %path.display(), api_url = %config.tastytrade.api_url, "configuration loaded");
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_load_layers_file_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "Config.toml",
                r#"
                [tastytrade]
                client_id = "file-client"
                client_secret = "file-secret"
                refresh_token = "file-refresh"

                [screener]
                target_dte = 30
                "#,
            )?;
            jail.set_env("WHEEL_TASTYTRADE__CLIENT_ID", "env-client");
            jail.set_env("WHEEL_SERVER__PORT", "9090");

            let config = ConfigLoader::load_from("Config.toml").expect("config loads");
            assert_eq!(config.tastytrade.client_id, "env-client");
            assert_eq!(config.tastytrade.client_secret, "file-secret");
            assert_eq!(config.screener.target_dte, 30);
            assert_eq!(config.screener.max_expiration_probes, 6);
            assert_eq!(config.server.port, 9090);
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_env_only() {
        Jail::expect_with(|jail| {
            jail.set_env("WHEEL_TASTYTRADE__CLIENT_ID", "id");
            jail.set_env("WHEEL_TASTYTRADE__CLIENT_SECRET", "secret");
            jail.set_env("WHEEL_TASTYTRADE__REFRESH_TOKEN", "refresh");

            let config = ConfigLoader::load_from("does-not-exist.toml").expect("config loads");
            assert_eq!(config.tastytrade.refresh_token, "refresh");
            assert_eq!(config.server.port, 8080);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        Jail::expect_with(|_jail| {
            let err = ConfigLoader::load_from("absent.toml").unwrap_err();
            assert!(err.to_string().contains("invalid configuration"));
            Ok(())
        });
    }
}
