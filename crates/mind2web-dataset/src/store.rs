// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Dataset persistence.
//!
//! Conversion code only needs a handful of container operations: create a
//! named dataset (optionally replacing an existing one), persist it, and load
//! it back by name. [`DatasetStore`] captures exactly that so the converter
//! never depends on how datasets are laid out.
//!
//! # Store Implementations
//!
//! - [`LocalStore`]: one directory per dataset under a root directory
//! - [`MemoryStore`]: in-memory only, nothing survives the process
//!
//! # Examples
//!
//! ```rust,no_run
//! use mind2web_dataset::{DatasetStore, LocalStore};
//!
//! # fn main() -> Result<(), mind2web_dataset::Error> {
//! let store = LocalStore::new("/data/datasets");
//! for name in store.list()? {
//!     let dataset = store.load(&name)?;
//!     println!("{}: {} samples", name, dataset.len());
//! }
//! # Ok(())
//! # }
//! ```

use crate::{Dataset, Error};
use log::{debug, info};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::RwLock,
};

const MANIFEST: &str = "dataset.json";

/// Persistent collection of named datasets.
pub trait DatasetStore: Send + Sync {
    /// Whether a dataset named `name` has been saved.
    fn exists(&self, name: &str) -> Result<bool, Error>;

    /// Start a new, empty dataset.
    ///
    /// An existing dataset with the same name is deleted when `overwrite` is
    /// set, otherwise [`Error::DatasetExists`] is returned. Nothing is written
    /// until [`save`](Self::save).
    fn create(&self, name: &str, overwrite: bool) -> Result<Dataset, Error> {
        validate_name(name)?;
        if self.exists(name)? {
            if !overwrite {
                return Err(Error::DatasetExists(name.to_owned()));
            }
            info!("Overwriting existing dataset {}", name);
            self.delete(name)?;
        }
        Ok(Dataset::new(name))
    }

    /// Persist the dataset under its name and mark it persistent.
    fn save(&self, dataset: &mut Dataset) -> Result<(), Error>;

    /// Load a previously saved dataset.
    fn load(&self, name: &str) -> Result<Dataset, Error>;

    /// Names of every saved dataset, sorted.
    fn list(&self) -> Result<Vec<String>, Error>;

    /// Delete a saved dataset.
    fn delete(&self, name: &str) -> Result<(), Error>;
}

/// Dataset names become directory names, so keep them to one path component.
fn validate_name(name: &str) -> Result<(), Error> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if invalid {
        return Err(Error::InvalidParameters(format!(
            "invalid dataset name {:?}",
            name
        )));
    }
    Ok(())
}

/// File based store keeping `<root>/<name>/dataset.json` per dataset.
///
/// Saves go through a temporary file in the dataset directory which is then
/// renamed over the manifest, so a crash never leaves a half written file.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the dataset named `name`.
    pub fn dataset_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn manifest_path(&self, name: &str) -> PathBuf {
        self.dataset_dir(name).join(MANIFEST)
    }
}

impl DatasetStore for LocalStore {
    fn exists(&self, name: &str) -> Result<bool, Error> {
        validate_name(name)?;
        Ok(self.manifest_path(name).is_file())
    }

    fn save(&self, dataset: &mut Dataset) -> Result<(), Error> {
        validate_name(dataset.name())?;
        let dir = self.dataset_dir(dataset.name());
        std::fs::create_dir_all(&dir)?;

        dataset.mark_saved();

        let tmp = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::with_capacity(64 * 1024, tmp.as_file());
            serde_json::to_writer(&mut writer, dataset)?;
            writer.flush()?;
        }
        tmp.persist(self.manifest_path(dataset.name()))
            .map_err(|e| Error::IoError(e.error))?;

        debug!(
            "Saved dataset {} ({} samples) to {:?}",
            dataset.name(),
            dataset.len(),
            dir
        );
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Dataset, Error> {
        if !self.exists(name)? {
            return Err(Error::DatasetNotFound(name.to_owned()));
        }
        let file = File::open(self.manifest_path(name))?;
        let reader = BufReader::with_capacity(64 * 1024, file);
        Ok(serde_json::from_reader(reader)?)
    }

    fn list(&self) -> Result<Vec<String>, Error> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.path().join(MANIFEST).is_file()
                && let Some(name) = entry.file_name().to_str()
            {
                names.push(name.to_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<(), Error> {
        if !self.exists(name)? {
            return Err(Error::DatasetNotFound(name.to_owned()));
        }
        std::fs::remove_dir_all(self.dataset_dir(name))?;
        debug!("Deleted dataset {}", name);
        Ok(())
    }
}

/// In-memory store (no persistence).
///
/// Useful for tests and for callers that only need the converted dataset
/// within the current process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    datasets: RwLock<BTreeMap<String, Dataset>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(what: &str) -> Error {
    Error::IoError(std::io::Error::other(format!("{} lock poisoned", what)))
}

impl DatasetStore for MemoryStore {
    fn exists(&self, name: &str) -> Result<bool, Error> {
        let datasets = self.datasets.read().map_err(|_| poisoned("store"))?;
        Ok(datasets.contains_key(name))
    }

    fn save(&self, dataset: &mut Dataset) -> Result<(), Error> {
        validate_name(dataset.name())?;
        dataset.mark_saved();
        let mut datasets = self.datasets.write().map_err(|_| poisoned("store"))?;
        datasets.insert(dataset.name().to_owned(), dataset.clone());
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Dataset, Error> {
        let datasets = self.datasets.read().map_err(|_| poisoned("store"))?;
        datasets
            .get(name)
            .cloned()
            .ok_or_else(|| Error::DatasetNotFound(name.to_owned()))
    }

    fn list(&self) -> Result<Vec<String>, Error> {
        let datasets = self.datasets.read().map_err(|_| poisoned("store"))?;
        Ok(datasets.keys().cloned().collect())
    }

    fn delete(&self, name: &str) -> Result<(), Error> {
        let mut datasets = self.datasets.write().map_err(|_| poisoned("store"))?;
        datasets
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::DatasetNotFound(name.to_owned()))
    }
}
