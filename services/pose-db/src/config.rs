use serde::Deserialize;
use std::time::Duration;

/// Main configuration for the pose access layer
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Document store configuration
    pub mongo: MongoConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Document store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    /// MongoDB connection URI
    pub uri: String,
    /// Logical database holding the pose collections
    #[serde(default = "default_database")]
    pub database: String,
    /// Collection of 2D pose detections
    #[serde(default = "default_poses_2d_collection")]
    pub poses_2d_collection: String,
    /// Collection of 3D pose reconstructions
    #[serde(default = "default_poses_3d_collection")]
    pub poses_3d_collection: String,
    /// Application name reported to the server
    pub app_name: Option<String>,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Server selection timeout in seconds
    #[serde(default = "default_server_selection_timeout_secs")]
    pub server_selection_timeout_secs: u64,
}

/// Environment variable consulted for the store URI when none is configured
pub const MONGO_POSE_URI_ENV: &str = "MONGO_POSE_URI";

// Default value functions
fn default_service_name() -> String {
    "pose-db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_database() -> String {
    "poses".to_string()
}

fn default_poses_2d_collection() -> String {
    "poses_2d".to_string()
}

fn default_poses_3d_collection() -> String {
    "poses_3d".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_server_selection_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with default values
            .set_default("service.name", "pose-db")?
            .set_default("service.log_level", "info")?
            // Add config file if present
            .add_source(config::File::with_name("config/pose-db").required(false))
            .add_source(config::File::with_name("/etc/pose-db/pose-db").required(false))
            // Override with environment variables
            // POSE_DB__MONGO__URI -> mongo.uri
            .add_source(
                config::Environment::with_prefix("POSE_DB")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("mongo.uri", std::env::var(MONGO_POSE_URI_ENV).ok())?
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }
}

impl MongoConfig {
    /// Configuration for the given URI with every other setting at its default
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: default_database(),
            poses_2d_collection: default_poses_2d_collection(),
            poses_3d_collection: default_poses_3d_collection(),
            app_name: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            server_selection_timeout_secs: default_server_selection_timeout_secs(),
        }
    }

    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Get server selection timeout as Duration
    pub fn server_selection_timeout(&self) -> Duration {
        Duration::from_secs(self.server_selection_timeout_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}
