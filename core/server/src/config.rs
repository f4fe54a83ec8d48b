use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "relation-memory-server")]
#[command(about = "Relationship memory service: categories, persons and their memories")]
pub struct Config {
    /// Path to SQLite database file
    #[arg(long, short, env = "DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Address the HTTP server listens on
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:21960")]
    pub bind_addr: SocketAddr,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Database location, falling back to the per-user data directory
    pub fn resolved_db_path(&self) -> PathBuf {
        if let Some(path) = &self.db_path {
            return path.clone();
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home)
            .join(".local/share/RelationMemory")
            .join("relation-memory.db")
    }
}
