use std::path::PathBuf;

const DEFAULT_DB_PATH: &str = "showbuff.db";
const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_ENV: &str = "production";

/// Process configuration, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImporterConfig {
    pub db_path: String,
    pub bind_addr: String,
    /// TMDB v3 API key. `None` disables remote lookups.
    pub tmdb_api_key: Option<String>,
    /// Where binary uploads wait for the worker.
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub env: String,
}

impl ImporterConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            db_path: get("SHOWBUFF_DB").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            bind_addr: get("SHOWBUFF_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            tmdb_api_key: get("TMDB_API_KEY"),
            upload_dir: get("SHOWBUFF_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("showbuff_uploads")),
            max_upload_bytes: get("SHOWBUFF_MAX_UPLOAD_BYTES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            env: get("SHOWBUFF_ENV").unwrap_or_else(|| DEFAULT_ENV.to_string()),
        }
    }
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = ImporterConfig::default();
        assert_eq!(cfg.db_path, "showbuff.db");
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080");
        assert_eq!(cfg.tmdb_api_key, None);
        assert_eq!(cfg.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.env, "production");
    }

    #[test]
    fn reads_overrides_and_ignores_blank_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SHOWBUFF_DB", "/data/imports.db"),
            ("TMDB_API_KEY", "  "),
            ("SHOWBUFF_UPLOAD_DIR", "/data/uploads"),
            ("SHOWBUFF_MAX_UPLOAD_BYTES", "2048"),
            ("SHOWBUFF_ENV", "dev"),
        ]);
        let cfg = ImporterConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.db_path, "/data/imports.db");
        assert_eq!(cfg.tmdb_api_key, None);
        assert_eq!(cfg.upload_dir, PathBuf::from("/data/uploads"));
        assert_eq!(cfg.max_upload_bytes, 2048);
        assert_eq!(cfg.env, "dev");
    }

    #[test]
    fn unparsable_upload_limit_falls_back() {
        let cfg = ImporterConfig::from_lookup(|k| {
            (k == "SHOWBUFF_MAX_UPLOAD_BYTES").then(|| "lots".to_string())
        });
        assert_eq!(cfg.max_upload_bytes, 10 * 1024 * 1024);
    }
}
