use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;

use crate::engine::DEFAULT_PAGE_SIZE;
use crate::kernel::deps::DEFAULT_COMPONENT;

/// Migrator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Replaces the `#__` placeholder in table names
    pub db_prefix: String,
    pub page_size: u32,
    /// Extension element whose params are migrated
    pub component: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            db_prefix: env::var("DB_PREFIX").unwrap_or_else(|_| "jos_".to_string()),
            page_size: parse_page_size(env::var("MIGRATION_PAGE_SIZE").ok())?,
            component: env::var("COMPONENT_ELEMENT")
                .unwrap_or_else(|_| DEFAULT_COMPONENT.to_string()),
        })
    }
}

fn parse_page_size(raw: Option<String>) -> Result<u32> {
    let page_size: u32 = match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .context("MIGRATION_PAGE_SIZE must be a valid number")?,
        None => DEFAULT_PAGE_SIZE,
    };
    if page_size == 0 {
        bail!("MIGRATION_PAGE_SIZE must be greater than zero");
    }
    Ok(page_size)
}
