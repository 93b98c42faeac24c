//! Server command implementation

use std::path::Path;

use anyhow::Result;
use mony_server::ServerConfig;

use super::{load_config, open_db};

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    cors_origins: Vec<String>,
) -> Result<()> {
    let config = load_config()?;
    let db = open_db(db_path)?;

    println!("🚀 Starting Mony web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    println!("   Fallback currency: {}", config.fallback_currency);
    if !cors_origins.is_empty() {
        println!("   CORS origins: {}", cors_origins.join(", "));
    }

    let server_config = ServerConfig {
        allowed_origins: cors_origins,
    };

    mony_server::serve_with_config(db, config, server_config, host, port).await
}
