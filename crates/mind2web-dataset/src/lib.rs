// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! # Mind2Web Dataset Library
//!
//! Converts Mind2Web web navigation trajectories into visual datasets of
//! screenshots annotated with the UI elements each step acted on.
//!
//! ## Features
//!
//! - **Record Readers**: Stream records from JSON Lines exports or
//!   HuggingFace Parquet shards
//! - **Conversion**: Normalized bounding boxes, action labels and previous
//!   action context for every trajectory step
//! - **Dataset Container**: Samples with detections and classifications,
//!   image metadata and saved views
//! - **Stores**: Persist datasets on disk or keep them in memory
//! - **Polars Integration**: Export samples as DataFrames and Arrow IPC files
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mind2web_dataset::{
//!     Error, LocalStore, Settings,
//!     mind2web::{ConvertOptions, RecordReader, create_dataset},
//! };
//!
//! fn main() -> Result<(), Error> {
//!     let settings = Settings::load(None)?;
//!     let store = LocalStore::new(&settings.datasets_dir);
//!
//!     let records = RecordReader::new().read("mind2web/test_task")?;
//!     let dataset = create_dataset(
//!         &store,
//!         records,
//!         "mind2web",
//!         &settings.screenshots_dir_for("mind2web"),
//!         &ConvertOptions::default(),
//!         None,
//!     )?;
//!     println!("Created {} with {} samples", dataset.name(), dataset.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Optional Features
//!
//! - `profiling`: Emits `tracing` spans for the conversion entry points

mod arrow;
mod config;
mod dataset;
mod error;
mod store;
mod view;

pub mod mind2web;

pub use crate::{
    arrow::{samples_dataframe, write_arrow},
    config::{Settings, default_config_path},
    dataset::{
        BoundingBox, Classification, Dataset, Detection, Detections, ImageMetadata, SAMPLE_FIELDS,
        Sample,
    },
    error::Error,
    mind2web::{ConvertOptions, Progress, create_dataset},
    store::{DatasetStore, LocalStore, MemoryStore},
    view::{Group, View, ViewStage},
};
