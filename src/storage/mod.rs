//! Storage Layer
//!
//! Locates the configuration and documents directories.

pub mod recovery;

use anyhow::Result;
use std::path::PathBuf;

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("org", "page-reader", "PageReader")
        .ok_or_else(|| anyhow::anyhow!("Could not determine project directories"))
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = project_dirs()?.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Get the user's documents directory, falling back to home
pub fn get_documents_dir() -> Result<PathBuf> {
    let user_dirs = directories::UserDirs::new()
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;

    Ok(user_dirs
        .document_dir()
        .unwrap_or_else(|| user_dirs.home_dir())
        .to_path_buf())
}
