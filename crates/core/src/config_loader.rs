use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Json, Toml},
    Figment,
};
use std::path::Path;

/// Environment variable prefix, nested keys split on `__`
/// (e.g. `CALMON_MARKET_DATA__TOKEN`).
pub const ENV_PREFIX: &str = "CALMON_";

pub const DEFAULT_CONFIG_PATH: &str = "config/Config.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration by merging the default TOML file, environment variables, and JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load() -> Result<AppConfig> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Loads configuration from a specific TOML file. Missing files are skipped,
    /// so defaults plus environment always produce a config.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig> {
        let path = path.as_ref();
        let config: AppConfig = Self::base(path)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .join(Json::file(path.with_extension("json")))
            .extract()?;

        Ok(config)
    }

    /// Loads configuration with a profile overlay (`Config.{profile}.toml` next to `path`).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_with_profile(path: impl AsRef<Path>, profile: &str) -> Result<AppConfig> {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Config");
        let profile_path = path.with_file_name(format!("{stem}.{profile}.toml"));

        let config: AppConfig = Self::base(path)
            .merge(Toml::file(profile_path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .join(Json::file(path.with_extension("json")))
            .extract()?;

        Ok(config)
    }

    fn base(path: &Path) -> Figment {
        Figment::from(figment::providers::Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::load_from(dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.monitor.poll_interval_secs, 300);
    }

    #[test]
    fn toml_and_profile_are_layered() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("Config.toml");
        let mut f = std::fs::File::create(&base).unwrap();
        writeln!(
            f,
            "[monitor]\npoll_interval_secs = 120\n\n[storage]\nbackend = \"postgres\"\ndatabase_url = \"postgresql://localhost/calendars\""
        )
        .unwrap();

        let mut p = std::fs::File::create(dir.path().join("Config.dev.toml")).unwrap();
        writeln!(p, "[monitor]\npoll_interval_secs = 30").unwrap();

        let config = ConfigLoader::load_from(&base).unwrap();
        assert_eq!(config.monitor.poll_interval_secs, 120);
        assert_eq!(config.storage.backend, StorageBackend::Postgres);

        let config = ConfigLoader::load_with_profile(&base, "dev").unwrap();
        assert_eq!(config.monitor.poll_interval_secs, 30);
        assert_eq!(
            config.storage.database_url.as_deref(),
            Some("postgresql://localhost/calendars")
        );
    }
}
