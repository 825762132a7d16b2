// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Tabular export of dataset samples through polars.

use crate::{Dataset, Detection, Error, Sample};
use log::debug;
use polars::prelude::*;
use std::{fs::File, io::BufWriter, path::Path, sync::Arc};

/// Field names used in the `field` column.
const GROUND_TRUTH: &str = "ground_truth";
const ALTERNATIVE: &str = "alternative_candidates";

type Row<'a> = (&'a Sample, Option<(&'static str, &'a Detection)>);

/// Flatten samples into a DataFrame with one row per detection.
///
/// Ground truth rows come before the alternative candidates of the same
/// sample. A sample without any detection still yields a single row with
/// null `field`, `label` and `box2d`. A `target_action_index` beyond the
/// `u32` frame range is an [`Error::InvalidParameters`].
///
/// # Columns
///
/// | Column | Type | Content |
/// |--------|------|---------|
/// | `name` | str | `action_uid` |
/// | `sequence` | str | `annotation_id` |
/// | `frame` | u32 | `target_action_index` |
/// | `field` | str | `ground_truth` or `alternative_candidates` |
/// | `label` | categorical | detection label |
/// | `box2d` | array\<f32, 4\> | `[cx, cy, w, h]`, normalized |
/// | `size` | array\<u32, 2\> | `[width, height]` from the image metadata |
/// | `website`, `domain`, `subdomain` | str | classification labels |
/// | `current_action` | str | cleaned action text |
pub fn samples_dataframe(samples: &[Sample]) -> Result<DataFrame, Error> {
    let rows: Vec<Row> = samples
        .iter()
        .flat_map(|sample| {
            let detections: Vec<Row> = sample
                .ground_truth
                .iter()
                .map(|d| (GROUND_TRUTH, d))
                .chain(sample.alternative_candidates.iter().map(|d| (ALTERNATIVE, d)))
                .map(|d| (sample, Some(d)))
                .collect();

            if detections.is_empty() {
                vec![(sample, None)]
            } else {
                detections
            }
        })
        .collect();

    let mut names = Vec::with_capacity(rows.len());
    let mut sequences = Vec::with_capacity(rows.len());
    let mut frames = Vec::with_capacity(rows.len());
    let mut fields = Vec::with_capacity(rows.len());
    let mut labels = Vec::with_capacity(rows.len());
    let mut boxes2d = Vec::with_capacity(rows.len());
    let mut sizes = Vec::with_capacity(rows.len());
    let mut websites = Vec::with_capacity(rows.len());
    let mut domains = Vec::with_capacity(rows.len());
    let mut subdomains = Vec::with_capacity(rows.len());
    let mut actions = Vec::with_capacity(rows.len());

    for (sample, detection) in rows {
        names.push(sample.action_uid.as_str());
        sequences.push(sample.annotation_id.as_str());
        frames.push(u32::try_from(sample.target_action_index).map_err(|_| {
            Error::InvalidParameters(format!(
                "target_action_index {} of {} does not fit the frame column",
                sample.target_action_index, sample.action_uid
            ))
        })?);
        fields.push(detection.map(|(field, _)| field));
        labels.push(detection.map(|(_, d)| d.label.as_str()));
        boxes2d.push(detection.map(|(_, d)| {
            let b = &d.bounding_box;
            Series::new(
                "box2d".into(),
                [b.cx() as f32, b.cy() as f32, b.width() as f32, b.height() as f32],
            )
        }));
        sizes.push(
            sample
                .metadata
                .as_ref()
                .map(|m| Series::new("size".into(), [m.width, m.height])),
        );
        websites.push(sample.website.label.as_str());
        domains.push(sample.domain.label.as_str());
        subdomains.push(sample.subdomain.label.as_str());
        actions.push(sample.current_action.as_str());
    }

    let labels = Series::new("label".into(), labels)
        .cast(&DataType::Categorical(
            Categories::new("labels".into(), "labels".into(), CategoricalPhysical::U32),
            Arc::new(CategoricalMapping::new(u32::MAX as usize)),
        ))?
        .into();
    let boxes2d = Series::new("box2d".into(), boxes2d)
        .cast(&DataType::Array(Box::new(DataType::Float32), 4))?
        .into();
    let sizes = Series::new("size".into(), sizes)
        .cast(&DataType::Array(Box::new(DataType::UInt32), 2))?
        .into();

    Ok(DataFrame::new(vec![
        Series::new("name".into(), names).into(),
        Series::new("sequence".into(), sequences).into(),
        Series::new("frame".into(), frames).into(),
        Series::new("field".into(), fields).into(),
        labels,
        boxes2d,
        sizes,
        Series::new("website".into(), websites).into(),
        Series::new("domain".into(), domains).into(),
        Series::new("subdomain".into(), subdomains).into(),
        Series::new("current_action".into(), actions).into(),
    ])?)
}

/// Write the samples of `dataset` to an Arrow IPC file, returning the number
/// of rows written.
#[cfg_attr(feature = "profiling", tracing::instrument(skip(dataset), fields(name = dataset.name())))]
pub fn write_arrow(dataset: &Dataset, path: &Path) -> Result<usize, Error> {
    let mut df = samples_dataframe(dataset.samples())?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let writer = BufWriter::new(File::create(path)?);
    IpcWriter::new(writer).finish(&mut df)?;

    debug!("Wrote {} rows of {} to {:?}", df.height(), dataset.name(), path);
    Ok(df.height())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoundingBox, Classification, Detections, ImageMetadata};
    use tempfile::TempDir;

    fn sample(uid: &str, index: usize, alternatives: usize, with_gt: bool) -> Sample {
        let mut sample = Sample::new(format!("/tmp/{}.jpg", uid));
        sample.action_uid = uid.to_string();
        sample.annotation_id = "ann-1".to_string();
        sample.target_action_index = index;
        sample.website = Classification::new("united");
        sample.domain = Classification::new("Travel");
        sample.subdomain = Classification::new("Airlines");
        sample.current_action = "Search -> CLICK".to_string();
        sample.metadata = Some(ImageMetadata {
            size_bytes: 1024,
            mime_type: Some("image/jpeg".to_string()),
            width: 1280,
            height: 720,
        });
        if with_gt {
            sample.ground_truth = Some(Detection::new(
                "CLICK",
                BoundingBox::new(0.1, 0.2, 0.2, 0.4),
            ));
        }
        sample.alternative_candidates = Detections::new(
            (0..alternatives)
                .map(|_| Detection::new("div", BoundingBox::new(0.0, 0.0, 0.5, 0.5)))
                .collect(),
        );
        sample
    }

    #[test]
    fn test_samples_dataframe_rows() {
        let samples = vec![sample("a", 0, 2, true), sample("b", 1, 0, false)];
        let df = samples_dataframe(&samples).unwrap();

        assert_eq!(df.height(), 4);
        assert_eq!(
            df.get_column_names()
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>(),
            vec![
                "name",
                "sequence",
                "frame",
                "field",
                "label",
                "box2d",
                "size",
                "website",
                "domain",
                "subdomain",
                "current_action"
            ]
        );

        let fields: Vec<Option<&str>> = df.column("field").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(
            fields,
            vec![
                Some(GROUND_TRUTH),
                Some(ALTERNATIVE),
                Some(ALTERNATIVE),
                None
            ]
        );

        let frames: Vec<Option<u32>> = df.column("frame").unwrap().u32().unwrap().into_iter().collect();
        assert_eq!(frames, vec![Some(0), Some(0), Some(0), Some(1)]);

        let boxes = df.column("box2d").unwrap();
        assert_eq!(boxes.null_count(), 1);
        let first = boxes.array().unwrap().get_as_series(0).unwrap();
        let first: Vec<f32> = first.f32().unwrap().into_no_null_iter().collect();
        assert!((first[0] - 0.2).abs() < 1e-6);
        assert!((first[1] - 0.4).abs() < 1e-6);
        assert!((first[2] - 0.2).abs() < 1e-6);
        assert!((first[3] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_write_arrow() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out").join("mind2web.arrow");

        let mut dataset = Dataset::new("export");
        dataset
            .add_samples(vec![sample("a", 0, 1, true), sample("b", 1, 0, true)], false)
            .unwrap();

        assert_eq!(write_arrow(&dataset, &path).unwrap(), 3);

        let df = IpcReader::new(File::open(&path).unwrap()).finish().unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.column("size").unwrap().null_count(), 0);
        let names: Vec<Option<&str>> = df.column("name").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(names, vec![Some("a"), Some("a"), Some("b")]);
    }

    #[test]
    fn test_samples_dataframe_many_labels() {
        let mut sample = sample("a", 0, 0, true);
        sample.alternative_candidates = Detections::new(
            (0..300)
                .map(|i| Detection::new(format!("tag{}", i), BoundingBox::new(0.0, 0.0, 0.5, 0.5)))
                .collect(),
        );

        let df = samples_dataframe(&[sample]).unwrap();
        assert_eq!(df.height(), 301);
        let labels = df.column("label").unwrap().cast(&DataType::String).unwrap();
        let labels: Vec<Option<&str>> = labels.str().unwrap().into_iter().collect();
        assert_eq!(labels[0], Some("CLICK"));
        assert_eq!(labels[300], Some("tag299"));
        assert_eq!(df.column("label").unwrap().n_unique().unwrap(), 301);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_samples_dataframe_frame_out_of_range() {
        let samples = vec![sample("a", u32::MAX as usize + 1, 0, true)];
        assert!(matches!(
            samples_dataframe(&samples),
            Err(Error::InvalidParameters(_))
        ));

        let samples = vec![sample("a", u32::MAX as usize, 0, true)];
        let df = samples_dataframe(&samples).unwrap();
        let frames: Vec<Option<u32>> = df.column("frame").unwrap().u32().unwrap().into_iter().collect();
        assert_eq!(frames, vec![Some(u32::MAX)]);
    }
}
