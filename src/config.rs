use serde::Deserialize;

/// Process-level configuration.
///
/// Only locates the store file. The HTTP port and worker-thread count live
/// in the store's single-row `configuration` table and are read at startup.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "db.db".to_string(),
        }
    }
}

impl Config {
    /// Loads the YAML file named by `ELASTCI_CONFIG` when set, then applies
    /// the `ELASTCI_DB` override on top.
    pub fn load() -> Self {
        let mut config: Config = std::env::var("ELASTCI_CONFIG")
            .ok()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|text| serde_yaml::from_str(&text).ok())
            .unwrap_or_default();

        if let Ok(path) = std::env::var("ELASTCI_DB") {
            config.database_path = path;
        }

        config
    }
}
