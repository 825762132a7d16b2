// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Visual dataset model: samples, detections, classifications and the
//! [`Dataset`] container that holds them together with saved views.

use crate::{Error, view::View};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};
use uuid::Uuid;

/// Fields every [`Sample`] carries, in schema order.
pub const SAMPLE_FIELDS: &[&str] = &[
    "id",
    "filepath",
    "metadata",
    "action_uid",
    "annotation_id",
    "target_action_index",
    "ground_truth",
    "website",
    "domain",
    "subdomain",
    "task_description",
    "full_sequence",
    "previous_actions",
    "current_action",
    "alternative_candidates",
];

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Normalized bounding box `[x, y, w, h]` with a top-left origin.
///
/// All values are fractions of the image width (`x`, `w`) or height (`y`,
/// `h`), so the box stays valid when the image is resized downstream.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

impl BoundingBox {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            x: left,
            y: top,
            w: width,
            h: height,
        }
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn width(&self) -> f64 {
        self.w
    }

    pub fn height(&self) -> f64 {
        self.h
    }

    pub fn cx(&self) -> f64 {
        self.x + self.w / 2.0
    }

    pub fn cy(&self) -> f64 {
        self.y + self.h / 2.0
    }

    /// True when the whole box lies inside the unit square.
    pub fn is_normalized(&self) -> bool {
        let unit = 0.0..=1.0;
        unit.contains(&self.x)
            && unit.contains(&self.y)
            && unit.contains(&self.w)
            && unit.contains(&self.h)
            && self.x + self.w <= 1.0
            && self.y + self.h <= 1.0
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([x, y, w, h]: [f64; 4]) -> Self {
        Self::new(x, y, w, h)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(bbox: BoundingBox) -> Self {
        [bbox.x, bbox.y, bbox.w, bbox.h]
    }
}

/// One UI element located on a screenshot.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Detection {
    pub id: String,
    pub label: String,
    pub bounding_box: BoundingBox,
    /// Action text the detection was derived from, only set on ground truth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_action_reprs: Option<String>,
}

impl Detection {
    pub fn new(label: impl Into<String>, bounding_box: BoundingBox) -> Self {
        Self {
            id: new_id(),
            label: label.into(),
            bounding_box,
            target_action_reprs: None,
        }
    }

    /// Names of the ad hoc attributes set on this detection.
    pub(crate) fn dynamic_attributes(&self) -> impl Iterator<Item = &'static str> {
        self.target_action_reprs
            .as_ref()
            .map(|_| "target_action_reprs")
            .into_iter()
    }
}

/// A list of detections stored in a single sample field.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Detections {
    pub detections: Vec<Detection>,
}

impl Detections {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }
}

/// A single categorical label.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Classification {
    pub id: String,
    pub label: String,
}

impl Classification {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            label: label.into(),
        }
    }
}

/// File level facts about a sample's image, filled by
/// [`Dataset::compute_metadata`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ImageMetadata {
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub width: u32,
    pub height: u32,
}

impl ImageMetadata {
    /// Read metadata from the image file on disk.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let size_bytes = std::fs::metadata(path)?.len();
        let mime_type = infer::get_from_path(path)?.map(|kind| kind.mime_type().to_owned());
        let size = imagesize::size(path)?;

        Ok(ImageMetadata {
            size_bytes,
            mime_type,
            width: size.width as u32,
            height: size.height as u32,
        })
    }
}

/// One navigation step rendered as a dataset row.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Sample {
    pub id: String,
    pub filepath: PathBuf,
    #[serde(default)]
    pub metadata: Option<ImageMetadata>,
    pub action_uid: String,
    pub annotation_id: String,
    pub target_action_index: usize,
    #[serde(default)]
    pub ground_truth: Option<Detection>,
    pub website: Classification,
    pub domain: Classification,
    pub subdomain: Classification,
    pub task_description: String,
    pub full_sequence: Vec<String>,
    pub previous_actions: Vec<String>,
    pub current_action: String,
    #[serde(default)]
    pub alternative_candidates: Detections,
    /// Ad hoc fields beyond the fixed schema.
    #[serde(flatten, default)]
    pub fields: BTreeMap<String, Value>,
}

impl Sample {
    pub fn new(filepath: impl Into<PathBuf>) -> Self {
        Self {
            id: new_id(),
            filepath: filepath.into(),
            ..Default::default()
        }
    }

    /// Set an ad hoc field. Names of schema fields are rejected.
    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) -> Result<(), Error> {
        if SAMPLE_FIELDS.contains(&name) {
            return Err(Error::InvalidParameters(format!(
                "{} is a schema field and cannot be set as an ad hoc field",
                name
            )));
        }
        self.fields.insert(name.to_owned(), value.into());
        Ok(())
    }

    /// Look up a field by name.
    ///
    /// Classification fields resolve to their label. Unknown names fall back
    /// to the ad hoc fields and return `None` when absent there too.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::from(self.id.as_str())),
            "filepath" => Some(Value::from(self.filepath.to_string_lossy().as_ref())),
            "action_uid" => Some(Value::from(self.action_uid.as_str())),
            "annotation_id" => Some(Value::from(self.annotation_id.as_str())),
            "target_action_index" => Some(Value::from(self.target_action_index)),
            "website" => Some(Value::from(self.website.label.as_str())),
            "domain" => Some(Value::from(self.domain.label.as_str())),
            "subdomain" => Some(Value::from(self.subdomain.label.as_str())),
            "task_description" => Some(Value::from(self.task_description.as_str())),
            "current_action" => Some(Value::from(self.current_action.as_str())),
            "full_sequence" => Some(Value::from(self.full_sequence.clone())),
            "previous_actions" => Some(Value::from(self.previous_actions.clone())),
            "ground_truth" => self
                .ground_truth
                .as_ref()
                .and_then(|d| serde_json::to_value(d).ok()),
            "alternative_candidates" => serde_json::to_value(&self.alternative_candidates).ok(),
            "metadata" => self
                .metadata
                .as_ref()
                .and_then(|m| serde_json::to_value(m).ok()),
            _ => self.fields.get(name).cloned(),
        }
    }

    /// Dotted names of every ad hoc field and embedded attribute on this
    /// sample, e.g. `ground_truth.target_action_reprs`.
    fn dynamic_fields(&self) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = self.fields.keys().cloned().collect();

        if let Some(gt) = &self.ground_truth {
            names.extend(gt.dynamic_attributes().map(|a| format!("ground_truth.{}", a)));
        }
        for det in self.alternative_candidates.iter() {
            names.extend(
                det.dynamic_attributes()
                    .map(|a| format!("alternative_candidates.detections.{}", a)),
            );
        }

        names
    }
}

/// A named collection of samples with saved views.
///
/// Datasets are created through a [`DatasetStore`](crate::DatasetStore) and
/// only become durable once the store saves them.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Dataset {
    name: String,
    created_at: DateTime<Utc>,
    last_modified_at: DateTime<Utc>,
    #[serde(default)]
    persistent: bool,
    #[serde(default)]
    dynamic_fields: BTreeSet<String>,
    #[serde(default)]
    saved_views: BTreeMap<String, View>,
    #[serde(default)]
    samples: Vec<Sample>,
}

impl Dataset {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            created_at: now,
            last_modified_at: now,
            persistent: false,
            dynamic_fields: BTreeSet::new(),
            saved_views: BTreeMap::new(),
            samples: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_modified_at(&self) -> DateTime<Utc> {
        self.last_modified_at
    }

    pub fn persistent(&self) -> bool {
        self.persistent
    }

    pub(crate) fn mark_saved(&mut self) {
        self.persistent = true;
        self.last_modified_at = Utc::now();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Declared ad hoc fields and embedded attributes.
    pub fn dynamic_fields(&self) -> &BTreeSet<String> {
        &self.dynamic_fields
    }

    /// Whether `name` is a schema field or a declared top level ad hoc field.
    pub fn has_field(&self, name: &str) -> bool {
        SAMPLE_FIELDS.contains(&name) || self.dynamic_fields.contains(name)
    }

    /// Bulk insert samples, returning their ids.
    ///
    /// With `dynamic` set, ad hoc fields and embedded attributes found on the
    /// samples are declared on the dataset. Without it every sample must only
    /// use fields that are already declared; nothing is inserted otherwise.
    #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, fields(count = samples.len())))]
    pub fn add_samples(&mut self, samples: Vec<Sample>, dynamic: bool) -> Result<Vec<String>, Error> {
        let mut found = BTreeSet::new();
        for sample in &samples {
            found.extend(sample.dynamic_fields());
        }

        if dynamic {
            for name in found {
                if self.dynamic_fields.insert(name.clone()) {
                    debug!("Declared dynamic field {} on dataset {}", name, self.name);
                }
            }
        } else if let Some(unknown) = found.iter().find(|n| !self.dynamic_fields.contains(*n)) {
            return Err(Error::UnknownField(format!(
                "{} (pass dynamic to declare ad hoc fields)",
                unknown
            )));
        }

        let ids = samples.iter().map(|s| s.id.clone()).collect();
        self.samples.extend(samples);
        self.last_modified_at = Utc::now();
        Ok(ids)
    }

    /// Populate [`ImageMetadata`] for every sample from its file on disk.
    ///
    /// Samples that already carry metadata are left alone unless `overwrite`
    /// is set. Returns the number of samples updated.
    #[cfg_attr(feature = "profiling", tracing::instrument(skip(self)))]
    pub fn compute_metadata(&mut self, overwrite: bool) -> Result<usize, Error> {
        let mut updated = 0;
        for sample in self.samples.iter_mut() {
            if sample.metadata.is_some() && !overwrite {
                continue;
            }
            sample.metadata = Some(ImageMetadata::from_path(&sample.filepath)?);
            updated += 1;
        }
        debug!("Computed metadata for {} samples of {}", updated, self.name);
        Ok(updated)
    }

    /// Create a view grouping samples by `field`, ordered inside each group
    /// by `order_by`.
    pub fn group_by(&self, field: &str, order_by: Option<&str>) -> Result<View, Error> {
        for name in std::iter::once(field).chain(order_by) {
            if !self.has_field(name) {
                return Err(Error::UnknownField(name.to_owned()));
            }
        }
        Ok(View::new().group_by(field, order_by, false))
    }

    /// Save a view under `name`, replacing any view saved under it before.
    pub fn save_view(&mut self, name: &str, view: &View) -> Result<(), Error> {
        if name.trim().is_empty() {
            return Err(Error::InvalidParameters(
                "view name must not be empty".to_owned(),
            ));
        }
        self.saved_views.insert(name.to_owned(), view.clone());
        self.last_modified_at = Utc::now();
        Ok(())
    }

    pub fn load_saved_view(&self, name: &str) -> Result<View, Error> {
        self.saved_views
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ViewNotFound(name.to_owned()))
    }

    pub fn has_saved_view(&self, name: &str) -> bool {
        self.saved_views.contains_key(name)
    }

    pub fn list_saved_views(&self) -> Vec<&str> {
        self.saved_views.keys().map(String::as_str).collect()
    }

    pub fn delete_saved_view(&mut self, name: &str) -> Result<(), Error> {
        self.saved_views
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::ViewNotFound(name.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(uid: &str, annotation_id: &str, index: usize) -> Sample {
        let mut sample = Sample::new(format!("/tmp/{}.jpg", uid));
        sample.action_uid = uid.to_string();
        sample.annotation_id = annotation_id.to_string();
        sample.target_action_index = index;
        sample.website = Classification::new("exploretock");
        sample
    }

    #[test]
    fn test_bounding_box_serializes_as_array() {
        let bbox = BoundingBox::new(0.1, 0.2, 0.3, 0.4);
        let json = serde_json::to_string(&bbox).unwrap();
        assert_eq!(json, "[0.1,0.2,0.3,0.4]");

        let restored: BoundingBox = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, bbox);
        assert!((restored.cx() - 0.25).abs() < 1e-12);
        assert!((restored.cy() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_bounding_box_is_normalized() {
        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_normalized());
        assert!(!BoundingBox::new(0.5, 0.0, 0.6, 0.1).is_normalized());
        assert!(!BoundingBox::new(-0.1, 0.0, 0.2, 0.1).is_normalized());
    }

    #[test]
    fn test_sample_field_lookup() {
        let sample = sample("uid-1", "ann-1", 3);
        assert_eq!(sample.field("annotation_id"), Some(Value::from("ann-1")));
        assert_eq!(sample.field("target_action_index"), Some(Value::from(3)));
        assert_eq!(sample.field("website"), Some(Value::from("exploretock")));
        assert_eq!(sample.field("ground_truth"), None);
        assert_eq!(sample.field("nope"), None);
    }

    #[test]
    fn test_set_field_rejects_schema_names() {
        let mut sample = sample("uid-1", "ann-1", 0);
        assert!(sample.set_field("annotation_id", "x").is_err());
        sample.set_field("split", "train").unwrap();
        assert_eq!(sample.field("split"), Some(Value::from("train")));
    }

    #[test]
    fn test_sample_json_keeps_ad_hoc_fields() {
        let mut sample = sample("uid-1", "ann-1", 0);
        sample.set_field("split", "test_task").unwrap();

        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["split"], "test_task");

        let restored: Sample = serde_json::from_value(json).unwrap();
        assert_eq!(restored, sample);
    }

    #[test]
    fn test_add_samples_requires_dynamic_for_ad_hoc_fields() {
        let mut dataset = Dataset::new("test");
        let mut s = sample("uid-1", "ann-1", 0);
        let mut gt = Detection::new("CLICK", BoundingBox::new(0.1, 0.1, 0.2, 0.2));
        gt.target_action_reprs = Some("[button] Go -> CLICK".to_string());
        s.ground_truth = Some(gt);

        let err = dataset.add_samples(vec![s.clone()], false).unwrap_err();
        assert!(matches!(err, Error::UnknownField(_)));
        assert!(dataset.is_empty());

        let ids = dataset.add_samples(vec![s.clone()], true).unwrap();
        assert_eq!(ids, vec![s.id.clone()]);
        assert!(
            dataset
                .dynamic_fields()
                .contains("ground_truth.target_action_reprs")
        );

        // Once declared the attribute is accepted without dynamic
        dataset.add_samples(vec![s], false).unwrap();
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn test_group_by_unknown_field() {
        let dataset = Dataset::new("test");
        assert!(matches!(
            dataset.group_by("episode", None),
            Err(Error::UnknownField(_))
        ));
        assert!(matches!(
            dataset.group_by("annotation_id", Some("step")),
            Err(Error::UnknownField(_))
        ));
        assert!(
            dataset
                .group_by("annotation_id", Some("target_action_index"))
                .is_ok()
        );
    }

    #[test]
    fn test_saved_views() {
        let mut dataset = Dataset::new("test");
        let view = dataset
            .group_by("annotation_id", Some("target_action_index"))
            .unwrap();

        dataset.save_view("sequences", &view).unwrap();
        assert!(dataset.has_saved_view("sequences"));
        assert_eq!(dataset.list_saved_views(), vec!["sequences"]);
        assert_eq!(dataset.load_saved_view("sequences").unwrap(), view);

        assert!(matches!(
            dataset.load_saved_view("missing"),
            Err(Error::ViewNotFound(_))
        ));
        assert!(dataset.save_view(" ", &view).is_err());

        dataset.delete_saved_view("sequences").unwrap();
        assert!(dataset.list_saved_views().is_empty());
    }

    #[test]
    fn test_compute_metadata() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("shot.png");
        image::RgbImage::new(32, 16).save(&path).unwrap();

        let mut dataset = Dataset::new("test");
        let mut s = sample("uid-1", "ann-1", 0);
        s.filepath = path;
        dataset.add_samples(vec![s], false).unwrap();

        assert_eq!(dataset.compute_metadata(false).unwrap(), 1);
        let metadata = dataset.samples()[0].metadata.as_ref().unwrap();
        assert_eq!((metadata.width, metadata.height), (32, 16));
        assert_eq!(metadata.mime_type.as_deref(), Some("image/png"));
        assert!(metadata.size_bytes > 0);

        // Already computed
        assert_eq!(dataset.compute_metadata(false).unwrap(), 0);
        assert_eq!(dataset.compute_metadata(true).unwrap(), 1);
    }

    #[test]
    fn test_compute_metadata_missing_file() {
        let mut dataset = Dataset::new("test");
        dataset
            .add_samples(vec![sample("missing", "ann-1", 0)], false)
            .unwrap();
        assert!(dataset.compute_metadata(false).is_err());
    }
}
