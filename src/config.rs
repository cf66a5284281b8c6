use std::path::PathBuf;
use std::str::FromStr;

/// Server settings, read from `COURTBOOK_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub password: String,
    pub max_connections: usize,
    /// Journal appends between compactions.
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        Ok(Self {
            bind: get("COURTBOOK_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port: var(&get, "COURTBOOK_PORT")?.unwrap_or(5433),
            data_dir: get("COURTBOOK_DATA_DIR").unwrap_or_else(|| "./data".into()).into(),
            password: get("COURTBOOK_PASSWORD").unwrap_or_else(|| "courtbook".into()),
            max_connections: var(&get, "COURTBOOK_MAX_CONNECTIONS")?.unwrap_or(256),
            compact_threshold: var(&get, "COURTBOOK_COMPACT_THRESHOLD")?.unwrap_or(1000),
            metrics_port: var(&get, "COURTBOOK_METRICS_PORT")?,
            tls_cert: get("COURTBOOK_TLS_CERT").map(PathBuf::from),
            tls_key: get("COURTBOOK_TLS_KEY").map(PathBuf::from),
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// A typed variable; present but malformed is an error, not a default.
fn var<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|value| value.trim().parse().map_err(|e| format!("{key}={value:?}: {e}")))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.listen_addr(), "0.0.0.0:5433");
        assert_eq!(c.data_dir, PathBuf::from("./data"));
        assert_eq!(c.password, "courtbook");
        assert_eq!(c.max_connections, 256);
        assert_eq!(c.compact_threshold, 1000);
        assert_eq!(c.metrics_port, None);
        assert_eq!(c.tls_cert, None);
    }

    #[test]
    fn overrides() {
        let c = config(&[
            ("COURTBOOK_BIND", "127.0.0.1"),
            ("COURTBOOK_PORT", "6543"),
            ("COURTBOOK_MAX_CONNECTIONS", "8"),
            ("COURTBOOK_METRICS_PORT", "9000"),
            ("COURTBOOK_TLS_CERT", "/etc/courtbook/cert.pem"),
        ])
        .unwrap();
        assert_eq!(c.listen_addr(), "127.0.0.1:6543");
        assert_eq!(c.max_connections, 8);
        assert_eq!(c.metrics_port, Some(9000));
        assert_eq!(c.tls_cert, Some(PathBuf::from("/etc/courtbook/cert.pem")));
        assert_eq!(c.tls_key, None);
    }

    #[test]
    fn malformed_numbers_are_errors() {
        let err = config(&[("COURTBOOK_PORT", "http")]).unwrap_err();
        assert!(err.starts_with("COURTBOOK_PORT="));
        assert!(config(&[("COURTBOOK_COMPACT_THRESHOLD", "-1")]).is_err());
    }
}
