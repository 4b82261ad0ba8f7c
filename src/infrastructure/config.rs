use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server settings, merged from defaults, `csvbridge.toml` and
/// `CSVBRIDGE_`-prefixed environment variables (last wins).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Bind address for the HTTP server
    pub host: String,
    pub port: u16,

    /// Directory holding one SQLite file per ingested source
    pub db_root_dir: PathBuf,

    /// Download ceiling in bytes, enforced while streaming
    pub max_file_size: u64,

    /// Page size applied when a query carries no `_size`
    pub default_page_size: u32,

    /// Upper bounds accepted for `_size` and `_offset`
    pub max_page_size: u32,
    pub max_offset: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            db_root_dir: PathBuf::from("./dbs"),
            max_file_size: 100 * 1024 * 1024,
            default_page_size: 100,
            max_page_size: 1000,
            max_offset: 1_000_000,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("csvbridge.toml"))
            .merge(Env::prefixed("CSVBRIDGE_"))
            .extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.default_page_size, 100);
        assert!(settings.max_page_size >= settings.default_page_size);
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("CSVBRIDGE_PORT", "9999");
        let settings = Settings::load().expect("settings should load");
        assert_eq!(settings.port, 9999);
        std::env::remove_var("CSVBRIDGE_PORT");
    }
}
