//! Subcommand arguments and handlers

pub mod history;
pub mod import;
pub mod machines;
pub mod merge;
pub mod show;

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::config::repository::migrations;

/// Open the configured metrics database
pub(crate) async fn open_database(config: &Config) -> Result<SqlitePool> {
    let path = config.database_path()?;
    log::info!("Using database {}", path.display());
    migrations::connect(&path).await
}

/// Format an optional ratio as a percentage
pub(crate) fn percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}%", v * 100.0),
        None => "-".to_string(),
    }
}
