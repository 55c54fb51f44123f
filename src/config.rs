use std::env;

pub const MAX_ACCESS_TOKEN_EXPIRY_SECONDS: u64 = 86_400;
pub const MAX_REFRESH_TOKEN_EXPIRY_DAYS: u64 = 365;

/// Which backend holds uploaded avatars and cover images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectStoreKind {
    Disk,
    Cloudinary,
}

impl std::str::FromStr for ObjectStoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disk" => Ok(ObjectStoreKind::Disk),
            "cloudinary" => Ok(ObjectStoreKind::Cloudinary),
            _ => Err(anyhow::anyhow!("Unknown OBJECT_STORE backend: {s}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_expiry_seconds: u64,
    pub refresh_token_expiry_days: u64,
    pub bcrypt_cost: u32,
    pub upload_temp_dir: String,
    pub object_store: ObjectStoreKind,
    pub media_dir: String,
    pub media_base_url: String,
    pub cloudinary: Option<CloudinaryConfig>,
    /// Upper bound on a single credential-store write during registration.
    pub store_timeout_seconds: u64,
    pub cors_origin: Option<String>,
    /// Marks session cookies `Secure`.
    pub production: bool,
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    /// Local defaults used by tests and `from_env` fallbacks. Secrets here are
    /// placeholders; `from_env` always requires real ones.
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/vidtube".into(),
            redis_url: None,
            access_token_secret: "local-access-token-secret".into(),
            refresh_token_secret: "local-refresh-token-secret".into(),
            access_token_expiry_seconds: 900,
            refresh_token_expiry_days: 10,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            upload_temp_dir: "./public/temp".into(),
            object_store: ObjectStoreKind::Disk,
            media_dir: "./public/media".into(),
            media_base_url: "http://localhost:8000/media".into(),
            cloudinary: None,
            store_timeout_seconds: 10,
            cors_origin: None,
            production: false,
            host: "0.0.0.0".into(),
            port: 8000,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();

        let object_store: ObjectStoreKind = env::var("OBJECT_STORE")
            .unwrap_or_else(|_| "disk".into())
            .parse()?;

        let cloudinary = match object_store {
            ObjectStoreKind::Cloudinary => Some(CloudinaryConfig {
                cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
                api_key: required("CLOUDINARY_API_KEY")?,
                api_secret: required("CLOUDINARY_API_SECRET")?,
            }),
            ObjectStoreKind::Disk => None,
        };

        let config = Self {
            database_url: required("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
            access_token_secret: required("ACCESS_TOKEN_SECRET")?,
            refresh_token_secret: required("REFRESH_TOKEN_SECRET")?,
            access_token_expiry_seconds: env::var("ACCESS_TOKEN_EXPIRY_SECONDS")
                .unwrap_or_else(|_| "900".into())
                .parse()?,
            refresh_token_expiry_days: env::var("REFRESH_TOKEN_EXPIRY_DAYS")
                .unwrap_or_else(|_| "10".into())
                .parse()?,
            bcrypt_cost: env::var("BCRYPT_COST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bcrypt_cost),
            upload_temp_dir: env::var("UPLOAD_TEMP_DIR").unwrap_or(defaults.upload_temp_dir),
            object_store,
            media_dir: env::var("MEDIA_DIR").unwrap_or(defaults.media_dir),
            media_base_url: env::var("MEDIA_BASE_URL").unwrap_or(defaults.media_base_url),
            cloudinary,
            store_timeout_seconds: env::var("STORE_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "10".into())
                .parse()?,
            cors_origin: env::var("CORS_ORIGIN").ok().filter(|s| !s.is_empty()),
            production: env::var("APP_ENV")
                .map(|v| v.eq_ignore_ascii_case("production"))
                .unwrap_or(false),
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".into())
                .parse()?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Signing secrets must be present and distinct per token class, and
    /// token lifetimes must be non-zero and bounded.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.access_token_secret.trim().is_empty() {
            anyhow::bail!("ACCESS_TOKEN_SECRET must not be empty");
        }
        if self.refresh_token_secret.trim().is_empty() {
            anyhow::bail!("REFRESH_TOKEN_SECRET must not be empty");
        }
        if self.access_token_secret == self.refresh_token_secret {
            anyhow::bail!("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ");
        }
        if !(1..=MAX_ACCESS_TOKEN_EXPIRY_SECONDS).contains(&self.access_token_expiry_seconds) {
            anyhow::bail!(
                "ACCESS_TOKEN_EXPIRY_SECONDS must be between 1 and {MAX_ACCESS_TOKEN_EXPIRY_SECONDS}"
            );
        }
        if !(1..=MAX_REFRESH_TOKEN_EXPIRY_DAYS).contains(&self.refresh_token_expiry_days) {
            anyhow::bail!("REFRESH_TOKEN_EXPIRY_DAYS must be between 1 and {MAX_REFRESH_TOKEN_EXPIRY_DAYS}");
        }
        Ok(())
    }

    pub fn refresh_token_expiry_seconds(&self) -> u64 {
        self.refresh_token_expiry_days.saturating_mul(86_400)
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}
