//! Handles settings for the application. Configuration is read from
//! `settings.toml` in the working directory, then from `COOPFLEET__*`
//! environment variables (`COOPFLEET__APP__LEVEL=debug`).
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Database::Memory => String::from("sqlite::memory:"),
            Database::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub database: Option<Database>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("app.level", "info")?
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("COOPFLEET").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Connection string of the configured database, or the shared default.
    pub fn database_url(&self) -> String {
        self.database
            .as_ref()
            .map_or_else(|| migration::DEFAULT_DATABASE_URL.to_string(), Database::url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_urls() {
        assert_eq!(Database::Memory.url(), "sqlite::memory:");
        assert_eq!(
            Database::Sqlite("fleet.db".to_string()).url(),
            "sqlite:fleet.db?mode=rwc"
        );
    }

    #[test]
    fn sqlite_table_deserializes() {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(
                "[app]\nlevel = \"debug\"\n[database]\nsqlite = \"x.db\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.app.level, "debug");
        assert_eq!(settings.database_url(), "sqlite:x.db?mode=rwc");
    }

    #[test]
    fn missing_database_uses_shared_default() {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(
                "[app]\nlevel = \"info\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert!(settings.database.is_none());
        assert_eq!(settings.database_url(), migration::DEFAULT_DATABASE_URL);
    }
}
