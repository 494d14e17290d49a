//! Runtime settings read from the environment.

use crate::error::ConfigError;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/clinic_admin";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    pub cors_allowed_origins: Vec<String>,
    /// JPEG or PNG drawn in the PDF header. Missing or unreadable files fall back to a text placeholder.
    pub logo_path: Option<PathBuf>,
    pub body_limit_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: DEFAULT_DATABASE_URL.into(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            db_max_connections: 5,
            cors_allowed_origins: vec![DEFAULT_CORS_ORIGIN.into()],
            logo_path: None,
            body_limit_bytes: DEFAULT_BODY_LIMIT,
        }
    }
}

impl Settings {
    /// Reads `DATABASE_URL`, `BIND_ADDR`, `DB_MAX_CONNECTIONS`, `CORS_ALLOWED_ORIGINS`,
    /// `LOGO_PATH` and `BODY_LIMIT_BYTES`. Callers load `.env` first if they want it.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into());
        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.into())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "BIND_ADDR",
                message: e.to_string(),
            })?;
        let db_max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(v) => v.parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| ConfigError::Invalid {
                key: "DB_MAX_CONNECTIONS",
                message: format!("expected a positive integer, got '{}'", v),
            })?,
            None => 5,
        };
        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_else(|| vec![DEFAULT_CORS_ORIGIN.into()]);
        let body_limit_bytes = match get("BODY_LIMIT_BYTES") {
            Some(v) => v.parse::<usize>().map_err(|_| ConfigError::Invalid {
                key: "BODY_LIMIT_BYTES",
                message: format!("expected a byte count, got '{}'", v),
            })?,
            None => DEFAULT_BODY_LIMIT,
        };

        Ok(Settings {
            database_url,
            bind_addr,
            db_max_connections,
            cors_allowed_origins,
            logo_path: get("LOGO_PATH").map(PathBuf::from),
            body_limit_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let s = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(s.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(s.bind_addr.port(), 8000);
        assert_eq!(s.db_max_connections, 5);
        assert_eq!(s.cors_allowed_origins, vec![DEFAULT_CORS_ORIGIN.to_string()]);
        assert!(s.logo_path.is_none());
    }

    #[test]
    fn parses_origins_and_logo() {
        let s = Settings::from_lookup(lookup(&[
            ("CORS_ALLOWED_ORIGINS", "http://localhost:3000, http://10.0.0.5:3000,"),
            ("LOGO_PATH", "static/logo.jpg"),
            ("BIND_ADDR", "127.0.0.1:9000"),
        ]))
        .unwrap();
        assert_eq!(s.cors_allowed_origins.len(), 2);
        assert_eq!(s.cors_allowed_origins[1], "http://10.0.0.5:3000");
        assert_eq!(s.logo_path, Some(PathBuf::from("static/logo.jpg")));
        assert_eq!(s.bind_addr.to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Settings::from_lookup(lookup(&[("BIND_ADDR", "nope")])),
            Err(ConfigError::Invalid { key: "BIND_ADDR", .. })
        ));
        assert!(matches!(
            Settings::from_lookup(lookup(&[("DB_MAX_CONNECTIONS", "0")])),
            Err(ConfigError::Invalid { key: "DB_MAX_CONNECTIONS", .. })
        ));
    }
}
