use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{Context, Result, bail};

const DEFAULT_MAX_UPLOAD_BYTES: &str = "26214400"; // 25 MiB

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: PathBuf,
    pub upload_dir: PathBuf,
    /// Prefix of the URIs handed out for stored uploads, e.g. `/uploads`.
    pub upload_url_prefix: String,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Reads the configuration from the environment (and `.env`, if present).
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            port: try_load("TRADEPOST_PORT", "3000")?,
            database_path: try_load("TRADEPOST_DB_PATH", "tradepost.db")?,
            upload_dir: try_load("TRADEPOST_UPLOAD_DIR", "uploads")?,
            upload_url_prefix: url_prefix(try_load("TRADEPOST_UPLOAD_URL_PREFIX", "/uploads")?)?,
            max_upload_bytes: try_load("TRADEPOST_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        log::info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value: {raw}"))
}

/// Uploads are mounted under this prefix, which must be an absolute path below the root.
fn url_prefix(raw: String) -> Result<String> {
    let prefix = raw.trim().trim_end_matches('/');

    if prefix.is_empty() {
        bail!("TRADEPOST_UPLOAD_URL_PREFIX must be a path below '/', got '{raw}'");
    }
    if !prefix.starts_with('/') {
        bail!("TRADEPOST_UPLOAD_URL_PREFIX must start with '/', got '{raw}'");
    }
    if prefix.contains(['{', '}', '*']) {
        bail!("TRADEPOST_UPLOAD_URL_PREFIX cannot contain route parameters, got '{raw}'");
    }

    Ok(prefix.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_defaults() {
        let port: u16 = try_load("TRADEPOST_TEST_UNSET_PORT", "3000").unwrap();
        assert_eq!(port, 3000);
    }

    #[test]
    fn rejects_unparseable_defaults() {
        assert!(try_load::<u16>("TRADEPOST_TEST_UNSET_PORT", "not-a-port").is_err());
    }

    #[test]
    fn upload_prefixes() {
        assert_eq!(url_prefix("/uploads".into()).unwrap(), "/uploads");
        assert_eq!(url_prefix("/static/img/".into()).unwrap(), "/static/img");

        for bad in ["", "/", "uploads", "  ", "/files/{id}"] {
            assert!(url_prefix(bad.into()).is_err(), "accepted '{bad}'");
        }
    }
}
