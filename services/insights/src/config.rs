use crate::error::ConfigError;

/// Process settings read from the environment (and `.env` via dotenvy in the
/// binaries).
#[derive(Debug, Clone)]
pub struct Settings {
    pub db_url: String,
    pub api_bind: String,
    pub db_max_connections: u32,
    pub log_json: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let db_url = lookup("DB_URL").ok_or(ConfigError::Missing("DB_URL"))?;
        let api_bind = lookup("API_BIND").unwrap_or_else(|| "127.0.0.1:8080".to_string());
        let db_max_connections = match lookup("DB_MAX_CONNECTIONS") {
            None => 10,
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "DB_MAX_CONNECTIONS",
                value: raw.clone(),
            })?,
        };
        let log_json = match lookup("LOG_JSON").as_deref().map(str::trim) {
            None | Some("") => false,
            Some("1") | Some("true") | Some("TRUE") => true,
            Some("0") | Some("false") | Some("FALSE") => false,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_JSON",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            db_url,
            api_bind,
            db_max_connections,
            log_json,
        })
    }
}
