use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use tracing::warn;

use chatty_media::CloudinaryConfig;

/// Secrets that must never sign production sessions.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your_jwt_secret",
];

const DEV_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub jwt_secret: String,
    pub production: bool,
    pub trust_proxy: bool,
    pub cloudinary: Option<CloudinaryConfig>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub allowed_origins: Vec<String>,
    pub upload_dir: PathBuf,
    pub moderation_timeout: Duration,
    pub upload_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from any variable source. Empty values count as unset.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let production = var("NODE_ENV").is_some_and(|v| v.eq_ignore_ascii_case("production"));

        let trust_proxy = var("TRUST_PROXY")
            .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) if production && PLACEHOLDER_SECRETS.contains(&secret.as_str()) => {
                bail!("JWT_SECRET is still a placeholder; set a random secret for production")
            }
            Some(secret) => secret,
            None if production => bail!("JWT_SECRET must be set in production"),
            None => {
                warn!("JWT_SECRET is unset, using the development secret");
                DEV_SECRET.to_string()
            }
        };

        let port: u16 = var("PORT")
            .unwrap_or_else(|| "5002".into())
            .parse()
            .context("PORT must be a port number")?;

        let cloudinary = match (
            var("CLOUD_NAME"),
            var("CLOUDINARY_API_KEY"),
            var("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };

        let allowed_origins = var("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        let secs = |key: &str, default: u64| -> anyhow::Result<Duration> {
            match var(key) {
                Some(v) => Ok(Duration::from_secs(
                    v.parse().with_context(|| format!("{key} must be a number of seconds"))?,
                )),
                None => Ok(Duration::from_secs(default)),
            }
        };

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            database_path: var("DATABASE_PATH").unwrap_or_else(|| "chatty.db".into()).into(),
            jwt_secret,
            production,
            trust_proxy,
            cloudinary,
            gemini_api_key: var("GEMINI_API_KEY"),
            gemini_model: var("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.0-flash".into()),
            allowed_origins,
            upload_dir: var("UPLOAD_DIR").unwrap_or_else(|| "uploads".into()).into(),
            moderation_timeout: secs("MODERATION_TIMEOUT_SECS", 60)?,
            upload_timeout: secs("UPLOAD_TIMEOUT_SECS", 120)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_outside_production() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.port, 5002);
        assert!(!cfg.production);
        assert_eq!(cfg.jwt_secret, DEV_SECRET);
        assert_eq!(cfg.allowed_origins, ["http://localhost:5173"]);
        assert!(cfg.cloudinary.is_none());
        assert!(cfg.gemini_api_key.is_none());
        assert!(!cfg.trust_proxy);
        assert_eq!(cfg.moderation_timeout, Duration::from_secs(60));
        assert_eq!(cfg.upload_timeout, Duration::from_secs(120));
    }

    #[test]
    fn production_requires_a_real_secret() {
        assert!(config(&[("NODE_ENV", "production")]).is_err());
        assert!(config(&[("NODE_ENV", "production"), ("JWT_SECRET", "dev-secret-change-me")]).is_err());

        let cfg = config(&[("NODE_ENV", "production"), ("JWT_SECRET", "s3cr3t-value")]).unwrap();
        assert!(cfg.production);
    }

    #[test]
    fn partial_cloudinary_credentials_are_ignored() {
        let cfg = config(&[("CLOUD_NAME", "demo"), ("CLOUDINARY_API_KEY", "k")]).unwrap();
        assert!(cfg.cloudinary.is_none());

        let cfg = config(&[
            ("CLOUD_NAME", "demo"),
            ("CLOUDINARY_API_KEY", "k"),
            ("CLOUDINARY_API_SECRET", "s"),
        ])
        .unwrap();
        assert_eq!(cfg.cloudinary.unwrap().cloud_name, "demo");
    }

    #[test]
    fn origins_are_split_and_trimmed() {
        let cfg = config(&[("ALLOWED_ORIGINS", "https://a.example, https://b.example,")]).unwrap();
        assert_eq!(cfg.allowed_origins, ["https://a.example", "https://b.example"]);
    }

    #[test]
    fn trust_proxy_flag() {
        assert!(config(&[("TRUST_PROXY", "true")]).unwrap().trust_proxy);
        assert!(config(&[("TRUST_PROXY", "1")]).unwrap().trust_proxy);
        assert!(!config(&[("TRUST_PROXY", "no")]).unwrap().trust_proxy);
    }

    #[test]
    fn bad_numbers_are_errors() {
        assert!(config(&[("PORT", "http")]).is_err());
        assert!(config(&[("UPLOAD_TIMEOUT_SECS", "soon")]).is_err());
    }
}
