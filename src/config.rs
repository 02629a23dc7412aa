// SPDX-FileCopyrightText: 2025 The downdeck Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use figment::providers::{Env, Format, Toml};
use figment::Figment;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Settings {
    /// Level filter for the rolling file log ("trace".."error").
    pub log_filter: String,

    // UI
    pub draw_interval_ms: u64,

    // Engine
    pub progress_interval_ms: u64,
    pub fetch_workers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            draw_interval_ms: 33,
            progress_interval_ms: 1000,
            fetch_workers: 4,
        }
    }
}

/// Single source of truth for app directories: (config dir, data dir).
pub fn get_app_paths() -> Option<(PathBuf, PathBuf)> {
    if let Some(proj_dirs) = ProjectDirs::from("com", "github", "downdeck") {
        let config_dir = proj_dirs.config_dir().to_path_buf();
        let data_dir = proj_dirs.data_local_dir().to_path_buf();

        fs::create_dir_all(&config_dir).ok()?;
        fs::create_dir_all(&data_dir).ok()?;

        Some((config_dir, data_dir))
    } else {
        None
    }
}

pub fn load_settings() -> Settings {
    if let Some((config_dir, _)) = get_app_paths() {
        let config_file_path = config_dir.join("settings.toml");

        return Figment::new()
            .merge(Toml::file(config_file_path))
            .merge(Env::prefixed("DOWNDECK_"))
            .extract()
            .unwrap_or_default();
    }

    Settings::default()
}
