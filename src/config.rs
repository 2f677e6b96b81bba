use std::env;
use url::Url;
use crate::error::{StoreError, StoreResult};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis configuration
    pub redis: RedisConfig,
    /// Vector index configuration
    pub vector: VectorIndexConfig,
}

/// Redis configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis host
    pub host: String,
    /// Redis port
    pub port: u16,
    /// Optional password (AUTH)
    pub password: Option<String>,
    /// Logical database index
    pub db: u8,
    /// Use TLS (rediss://)
    pub tls: bool,
    /// Prefix applied to every key written by this process
    pub key_prefix: String,
    /// Maximum Redis connections in the shared pool
    pub max_connections: u32,
    /// Connection and command timeout in seconds
    pub connection_timeout_secs: u64,
    /// Expiration applied by `set` when the caller gives none
    pub default_ttl_secs: u64,
}

/// Vector index configuration
#[derive(Debug, Clone)]
pub struct VectorIndexConfig {
    /// RediSearch index name
    pub index_name: String,
    /// Embedding dimension enforced on every vector
    pub dimension: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> StoreResult<Self> {
        // Load .env file if it exists
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("Could not load .env file: {}", e);
        }

        let defaults = Config::default();

        let config = Config {
            redis: RedisConfig {
                host: env::var("REDIS_HOST").unwrap_or(defaults.redis.host),
                port: parse_var("REDIS_PORT", defaults.redis.port)?,
                password: env::var("REDIS_PASSWORD").ok().filter(|p| !p.is_empty()),
                db: parse_var("REDIS_DB", defaults.redis.db)?,
                tls: parse_var("REDIS_TLS", defaults.redis.tls)?,
                key_prefix: env::var("REDIS_KEY_PREFIX").unwrap_or(defaults.redis.key_prefix),
                max_connections: parse_var("REDIS_MAX_CONNECTIONS", defaults.redis.max_connections)?,
                connection_timeout_secs: parse_var(
                    "REDIS_CONNECTION_TIMEOUT_SECS",
                    defaults.redis.connection_timeout_secs,
                )?,
                default_ttl_secs: parse_var("REDIS_DEFAULT_TTL_SECS", defaults.redis.default_ttl_secs)?,
            },
            vector: VectorIndexConfig {
                index_name: env::var("VECTOR_INDEX_NAME").unwrap_or(defaults.vector.index_name),
                dimension: parse_var("EMBEDDING_DIMENSION", defaults.vector.dimension)?,
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> StoreResult<()> {
        if self.redis.host.trim().is_empty() {
            return Err(StoreError::Config("REDIS_HOST cannot be empty".to_string()));
        }

        if self.redis.port == 0 {
            return Err(StoreError::Config("Redis port cannot be 0".to_string()));
        }

        if self.redis.max_connections == 0 {
            return Err(StoreError::Config("REDIS_MAX_CONNECTIONS must be greater than 0".to_string()));
        }

        if self.redis.connection_timeout_secs == 0 {
            return Err(StoreError::Config("Connection timeout must be greater than 0".to_string()));
        }

        if self.vector.index_name.trim().is_empty() {
            return Err(StoreError::Config("VECTOR_INDEX_NAME cannot be empty".to_string()));
        }

        if self.vector.dimension == 0 {
            return Err(StoreError::Config("Embedding dimension must be greater than 0".to_string()));
        }

        Ok(())
    }
}

impl RedisConfig {
    /// Connection URL including credentials and database index
    pub fn connection_url(&self) -> StoreResult<String> {
        let scheme = if self.tls { "rediss" } else { "redis" };
        let mut url = Url::parse(&format!("{}://{}:{}/{}", scheme, self.host, self.port, self.db))
            .map_err(|e| StoreError::Config(format!("Invalid Redis address: {}", e)))?;

        if let Some(password) = &self.password {
            url.set_password(Some(password))
                .map_err(|_| StoreError::Config("Cannot attach password to Redis URL".to_string()))?;
        }

        Ok(url.to_string())
    }

    /// Connection URL with the password masked, for logs
    pub fn redacted_url(&self) -> String {
        let masked = RedisConfig {
            password: self.password.as_ref().map(|_| "****".to_string()),
            ..self.clone()
        };
        masked
            .connection_url()
            .unwrap_or_else(|_| format!("{}:{}", self.host, self.port))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            redis: RedisConfig {
                host: "127.0.0.1".to_string(),
                port: 6379,
                password: None,
                db: 0,
                tls: false,
                key_prefix: "chatbot:".to_string(),
                max_connections: 1,
                connection_timeout_secs: 5,
                default_ttl_secs: 3600, // 1 hour
            },
            vector: VectorIndexConfig {
                index_name: "idx:vectors".to_string(),
                dimension: 384,
            },
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> StoreResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| StoreError::Config(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}
