// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Dataset assembly from Mind2Web records.

use super::{
    convert::{clean_action_repr, create_detection, prepare_records},
    types::{Candidate, Record},
};
use crate::{Classification, Dataset, DatasetStore, Detections, Error, Sample};
use image::{DynamicImage, codecs::jpeg::JpegEncoder};
use log::{debug, info, warn};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::mpsc::Sender,
};

/// Name of the saved view grouping samples into trajectories.
pub const SEQUENCES_VIEW: &str = "sequences";

/// Progress of a conversion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Records processed so far, including skipped ones.
    pub current: usize,
    /// Total number of records, 0 when the source cannot tell.
    pub total: usize,
}

/// Options for [`create_dataset`].
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Replace an existing dataset of the same name.
    pub overwrite: bool,
    /// JPEG quality of the written screenshots (1-100).
    pub jpeg_quality: u8,
    /// Name of the saved trajectory view.
    pub view_name: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            overwrite: true,
            jpeg_quality: 75,
            view_name: SEQUENCES_VIEW.to_owned(),
        }
    }
}

/// Convert Mind2Web records into a persisted dataset named `name`.
///
/// Records are enriched with their previous actions, each screenshot is
/// written to `<screenshots_dir>/<action_uid>.jpg` and turned into one
/// [`Sample`]. Records without a screenshot are logged and skipped. The
/// samples are inserted in bulk, image metadata is computed, and a view
/// grouping samples by `annotation_id` ordered by `target_action_index` is
/// saved before the dataset itself is persisted through `store`.
///
/// The dataset is created, replacing any previous one when
/// [`ConvertOptions::overwrite`] is set, before the first screenshot is
/// written, so screenshots may live inside the store's directories.
///
/// # Errors
///
/// * [`Error::NoValidSamples`] when no record produced a sample
/// * [`Error::DatasetExists`] when the dataset exists and overwrite is off
/// * decode errors for malformed candidates, bounding boxes, action text or
///   target indices; these abort the run
///
/// # Example
///
/// ```rust,no_run
/// use mind2web_dataset::{
///     LocalStore,
///     mind2web::{ConvertOptions, RecordReader, create_dataset},
/// };
///
/// let store = LocalStore::new("/data/datasets");
/// let records = RecordReader::new().read("data/test_task.jsonl")?;
/// let dataset = create_dataset(
///     &store,
///     records,
///     "mind2web",
///     "/data/datasets/mind2web/screenshots".as_ref(),
///     &ConvertOptions::default(),
///     None,
/// )?;
/// println!("{} samples", dataset.len());
/// # Ok::<(), mind2web_dataset::Error>(())
/// ```
#[cfg_attr(
    feature = "profiling",
    tracing::instrument(skip(store, records, options, progress))
)]
pub fn create_dataset<S, I>(
    store: &S,
    records: I,
    name: &str,
    screenshots_dir: &Path,
    options: &ConvertOptions,
    progress: Option<Sender<Progress>>,
) -> Result<Dataset, Error>
where
    S: DatasetStore + ?Sized,
    I: IntoIterator<Item = Result<Record, Error>>,
{
    if !(1..=100).contains(&options.jpeg_quality) {
        return Err(Error::InvalidParameters(format!(
            "jpeg_quality must be within 1-100, got {}",
            options.jpeg_quality
        )));
    }

    let mut dataset = store.create(name, options.overwrite)?;

    let records = prepare_records(records);
    let total = records.size_hint().1.unwrap_or(0);

    let mut samples = Vec::new();
    for (current, record) in records.enumerate() {
        if let Some(sample) = build_sample(record?, screenshots_dir, options.jpeg_quality)? {
            samples.push(sample);
        }

        if let Some(progress) = &progress {
            // Receiver may have gone away; conversion continues regardless
            let _ = progress.send(Progress {
                current: current + 1,
                total,
            });
        }
    }

    if samples.is_empty() {
        return Err(Error::NoValidSamples);
    }

    let count = samples.len();
    dataset.add_samples(samples, true)?;
    dataset.compute_metadata(false)?;

    let view = dataset.group_by("annotation_id", Some("target_action_index"))?;
    dataset.save_view(&options.view_name, &view)?;

    store.save(&mut dataset)?;
    info!("Created dataset {} with {} samples", name, count);

    Ok(dataset)
}

/// Turn one enriched record into a [`Sample`], writing its screenshot.
///
/// Returns `None` for records without a screenshot.
pub fn build_sample(
    record: Record,
    screenshots_dir: &Path,
    jpeg_quality: u8,
) -> Result<Option<Sample>, Error> {
    let Some(screenshot) = &record.screenshot else {
        warn!(
            "Skipping item {} - no screenshot available",
            record.action_uid
        );
        return Ok(None);
    };

    let target_action_index = record.target_index()?;
    let filepath = screenshots_dir.join(format!("{}.jpg", record.action_uid));
    std::fs::create_dir_all(screenshots_dir)?;
    write_jpeg(screenshot, &filepath, jpeg_quality)?;

    let (width, height) = (screenshot.width(), screenshot.height());

    let candidates = record
        .pos_candidates
        .iter()
        .map(|json| Candidate::parse(json))
        .collect::<Result<Vec<_>, _>>()?;

    let ground_truth = match candidates.first() {
        Some(candidate) => Some(create_detection(
            candidate,
            width,
            height,
            Some(&record.target_action_reprs),
        )?),
        None => None,
    };

    let alternatives = candidates
        .iter()
        .skip(1)
        .map(|candidate| create_detection(candidate, width, height, None))
        .collect::<Result<Vec<_>, _>>()?;

    let mut sample = Sample::new(filepath);
    sample.action_uid = record.action_uid;
    sample.annotation_id = record.annotation_id;
    sample.target_action_index = target_action_index;
    sample.ground_truth = ground_truth;
    sample.website = Classification::new(record.website);
    sample.domain = Classification::new(record.domain);
    sample.subdomain = Classification::new(record.subdomain);
    sample.task_description = record.confirmed_task;
    sample.current_action = clean_action_repr(&record.target_action_reprs);
    sample.full_sequence = record.action_reprs;
    sample.previous_actions = record.prev_actions;
    sample.alternative_candidates = Detections::new(alternatives);

    debug!(
        "Converted {} ({}x{}, {} alternatives)",
        sample.action_uid,
        width,
        height,
        sample.alternative_candidates.len()
    );

    Ok(Some(sample))
}

fn write_jpeg(image: &DynamicImage, path: &Path, quality: u8) -> Result<(), Error> {
    let mut writer = BufWriter::new(File::create(path)?);
    let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
    image.to_rgb8().write_with_encoder(encoder)?;
    writer.flush()?;
    Ok(())
}
