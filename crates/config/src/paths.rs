//! Path utilities

use std::path::PathBuf;

/// Data directory (~/.assetline)
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".assetline")
}

/// Config file location
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}
