use std::net::SocketAddr;
use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Address the HTTP server binds (default: 127.0.0.1:5000).
    pub listen_addr: SocketAddr,
    /// S3 bucket holding the reference image gallery.
    pub bucket: String,
    /// DynamoDB table holding one record per identifier.
    pub table: String,
    /// Attribute name of the table's partition key.
    pub key_field: String,
    /// Similarity a comparison must strictly exceed to count as a match.
    pub similarity_threshold: f32,
    /// Directory where captured frames are staged before upload.
    pub staging_dir: PathBuf,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            listen_addr: env_addr("ROLLCALL_LISTEN_ADDR", ([127, 0, 0, 1], 5000).into()),
            bucket: env_string("ROLLCALL_BUCKET", "speechrekog"),
            table: env_string("ROLLCALL_TABLE", "iSHIP"),
            key_field: env_string("ROLLCALL_KEY_FIELD", "Roll Number"),
            similarity_threshold: env_f32("ROLLCALL_SIMILARITY_THRESHOLD", 90.0),
            staging_dir: std::env::var("ROLLCALL_STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_addr(key: &str, default: SocketAddr) -> SocketAddr {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
