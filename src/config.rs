use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Client-server engine connection string. Absent means the embedded
    /// SQLite engine at `path`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub secret: String,
    #[serde(default = "default_token_expire")]
    pub token_expire_minutes: u64,
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub local: LocalStoreConfig,
    #[serde(default)]
    pub object_store: Option<ObjectStoreConfig>,
    #[serde(default)]
    pub cdn: Option<CdnConfig>,
}

/// Local filesystem backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LocalStoreConfig {
    #[serde(default = "default_upload_dir")]
    pub base_path: String,
}

/// S3-compatible object storage credentials
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStoreConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_url_expire")]
    pub url_expire_seconds: u64,
}

/// CDN media host credentials
#[derive(Debug, Clone, Deserialize)]
pub struct CdnConfig {
    pub cloud_name: String,
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default = "default_cdn_api_base")]
    pub api_base: String,
    #[serde(default = "default_cdn_delivery_base")]
    pub delivery_base: String,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_db_path() -> String {
    "data/studyshare.db".to_string()
}

fn default_jwt_secret() -> String {
    "change-this-secret".to_string()
}

fn default_token_expire() -> u64 {
    720 // 12 hours
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_admin_password() -> String {
    "admin1234".to_string()
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_url_expire() -> u64 {
    3600 // 1 hour
}

fn default_cdn_api_base() -> String {
    "https://api.cloudinary.com".to_string()
}

fn default_cdn_delivery_base() -> String {
    "https://res.cloudinary.com".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            path: default_db_path(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: default_jwt_secret(),
            token_expire_minutes: default_token_expire(),
            admin_username: default_admin_username(),
            admin_password: default_admin_password(),
        }
    }
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self {
            base_path: default_upload_dir(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides();
        config.ensure_directories()?;
        config.ensure_jwt_secret()?;
        Ok(config)
    }

    /// Load configuration from config.toml
    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = ["config.toml", "data/config.toml"];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config: Config = toml::from_str(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    /// Apply environment variable overrides. Server and auth settings use
    /// the `SS_CONF_` prefix; the database URL and the storage credential
    /// bundles use their conventional names so deploy environments work
    /// without a config file.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("SS_CONF_SERVER_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = env::var("SS_CONF_SERVER_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }

        if let Ok(val) = env::var("DATABASE_URL") {
            if !val.trim().is_empty() {
                self.database.url = Some(val);
            }
        }
        if let Ok(val) = env::var("SS_CONF_DATABASE_PATH") {
            self.database.path = val;
        }

        if let Ok(val) = env::var("SS_CONF_AUTH_SECRET") {
            self.auth.secret = val;
        }
        if let Ok(val) = env::var("SS_CONF_AUTH_TOKEN_EXPIRE") {
            if let Ok(minutes) = val.parse() {
                self.auth.token_expire_minutes = minutes;
            }
        }
        if let Ok(val) = env::var("SS_CONF_ADMIN_PASSWORD") {
            self.auth.admin_password = val;
        }

        if let Ok(val) = env::var("SS_CONF_UPLOAD_DIR") {
            self.storage.local.base_path = val;
        }

        // An object-store bundle counts as present only when all required
        // credentials are set.
        if let (Ok(access_key_id), Ok(secret_access_key), Ok(bucket)) = (
            env::var("S3_ACCESS_KEY_ID"),
            env::var("S3_SECRET_ACCESS_KEY"),
            env::var("S3_BUCKET"),
        ) {
            let region = env::var("S3_REGION").unwrap_or_else(|_| default_region());
            self.storage.object_store = Some(ObjectStoreConfig {
                access_key_id,
                secret_access_key,
                bucket,
                region,
                url_expire_seconds: default_url_expire(),
            });
        }

        // The CDN bundle needs the account name and the api key.
        if let (Ok(cloud_name), Ok(api_key)) =
            (env::var("CDN_CLOUD_NAME"), env::var("CDN_API_KEY"))
        {
            let api_secret = env::var("CDN_API_SECRET").unwrap_or_default();
            self.storage.cdn = Some(CdnConfig {
                cloud_name,
                api_key,
                api_secret,
                api_base: default_cdn_api_base(),
                delivery_base: default_cdn_delivery_base(),
            });
        }
    }

    /// Ensure the JWT secret is not the default; persist a generated one
    fn ensure_jwt_secret(&mut self) -> anyhow::Result<()> {
        if self.auth.secret == default_jwt_secret() || self.auth.secret.is_empty() {
            let secret_path = Path::new("data/.jwt_secret");

            if secret_path.exists() {
                let secret = fs::read_to_string(secret_path)?;
                self.auth.secret = secret.trim().to_string();
                tracing::info!("Loaded persisted JWT secret from data/.jwt_secret");
            } else {
                let secret = uuid::Uuid::new_v4().to_string();
                if let Some(parent) = secret_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(secret_path, &secret)?;
                self.auth.secret = secret;
                tracing::info!("Generated and persisted new JWT secret to data/.jwt_secret");
            }
        }
        Ok(())
    }

    /// Ensure required directories exist
    fn ensure_directories(&self) -> anyhow::Result<()> {
        if self.database.url.is_none() {
            if let Some(parent) = Path::new(&self.database.path).parent() {
                fs::create_dir_all(parent)?;
            }
        }

        fs::create_dir_all(&self.storage.local.base_path)?;

        Ok(())
    }
}
