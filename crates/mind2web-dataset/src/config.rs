// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Converter settings.
//!
//! Values are layered: built-in defaults, then a TOML file, then environment
//! variables prefixed with `MIND2WEB_` (for example
//! `MIND2WEB_DATASETS_DIR=/data/fo`). Command line flags are applied on top
//! by the caller.

use crate::Error;
use directories::ProjectDirs;
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "MIND2WEB";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("ai", "EdgeFirst", "Mind2Web Dataset")
}

/// Location of the user configuration file, when a home directory exists.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

fn default_datasets_dir() -> PathBuf {
    match project_dirs() {
        Some(dirs) => dirs.data_dir().join("datasets"),
        None => PathBuf::from("datasets"),
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    /// Root directory of the [`LocalStore`](crate::LocalStore).
    pub datasets_dir: PathBuf,
    /// Where screenshots are written; defaults to
    /// `<datasets_dir>/<dataset name>/screenshots` when unset.
    #[serde(default)]
    pub screenshots_dir: Option<PathBuf>,
    /// JPEG quality used for written screenshots (1-100).
    pub jpeg_quality: u8,
    /// Replace an existing dataset of the same name.
    pub overwrite: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            datasets_dir: default_datasets_dir(),
            screenshots_dir: None,
            jpeg_quality: 75,
            overwrite: true,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from [`default_config_path`] when no
    /// path is given. An explicit path must exist; the default one may not.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let defaults = Settings::default();

        let mut builder = config::Config::builder()
            .set_default(
                "datasets_dir",
                defaults.datasets_dir.to_string_lossy().into_owned(),
            )?
            .set_default("jpeg_quality", defaults.jpeg_quality as i64)?
            .set_default("overwrite", defaults.overwrite)?;

        let file = path.map(Path::to_path_buf).or_else(default_config_path);
        if let Some(file) = file {
            debug!("Reading settings from {:?}", file);
            builder = builder.add_source(config::File::from(file).required(path.is_some()));
        }

        let settings: Settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::InvalidParameters(format!(
                "jpeg_quality must be within 1-100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }

    /// Screenshot directory for the dataset named `name`.
    pub fn screenshots_dir_for(&self, name: &str) -> PathBuf {
        self.screenshots_dir
            .clone()
            .unwrap_or_else(|| self.datasets_dir.join(name).join("screenshots"))
    }
}
