// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! # Mind2Web Support
//!
//! Conversion of Mind2Web web navigation trajectories into visual datasets.
//! Each trajectory step becomes one [`Sample`](crate::Sample): its screenshot
//! is written as JPEG, the target element becomes the ground truth detection
//! and the remaining positive candidates become alternative detections.
//!
//! ## Workflow
//!
//! 1. **Read**: [`RecordReader`] streams records from JSON Lines or Parquet
//! 2. **Enrich**: [`add_prev_actions`] adds the actions preceding each step
//! 3. **Assemble**: [`create_dataset`] writes screenshots, builds samples and
//!    persists the dataset with its `sequences` view
//!
//! ## Example
//!
//! ```rust,no_run
//! use mind2web_dataset::{
//!     DatasetStore, LocalStore,
//!     mind2web::{ConvertOptions, RecordReader, create_dataset},
//! };
//!
//! # fn main() -> Result<(), mind2web_dataset::Error> {
//! let store = LocalStore::new("datasets");
//! let records = RecordReader::new().read("mind2web/test_website")?;
//! let dataset = create_dataset(
//!     &store,
//!     records,
//!     "mind2web-test-website",
//!     "screenshots".as_ref(),
//!     &ConvertOptions::default(),
//!     None,
//! )?;
//!
//! let view = dataset.load_saved_view("sequences")?;
//! for group in view.groups(&dataset) {
//!     println!("{}: {} steps", group.key_str(), group.len());
//! }
//! # Ok(())
//! # }
//! ```

mod builder;
mod convert;
mod reader;
mod types;


pub use types::{Candidate, CandidateAttributes, Record};

pub use reader::{JsonlRecords, ParquetRecords, ReadOptions, RecordReader, Records};

pub use convert::{
    action_type_from_repr, add_prev_actions, clean_action_repr, create_detection, normalize_bbox,
    parse_bounding_box_rect, prepare_records,
};

pub use builder::{ConvertOptions, Progress, SEQUENCES_VIEW, build_sample, create_dataset};
