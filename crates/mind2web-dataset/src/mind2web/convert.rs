// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Field level conversions from Mind2Web records to dataset values.
//!
//! ## Coordinate Systems
//!
//! - **Mind2Web**: `bounding_box_rect` in pixels, top-left origin
//! - **Dataset**: [`BoundingBox`] normalized to 0-1, top-left origin

use super::types::{Candidate, Record};
use crate::{BoundingBox, Detection, Error};
use regex::Regex;
use std::sync::LazyLock;

static BRACKET_TAG: LazyLock<Regex> = LazyLock::new(|| {
    // Non-greedy so only the first bracketed run is consumed
    Regex::new(r"\[.*?\]\s*").expect("static regex is valid")
});

// =============================================================================
// Context enrichment
// =============================================================================

/// Fill `prev_actions` with every entry of `action_reprs` before
/// `target_action_index`.
///
/// An index past the end of the sequence yields the whole sequence.
pub fn add_prev_actions(mut record: Record) -> Result<Record, Error> {
    let index = record.target_index()?;
    record.prev_actions = record.action_reprs.iter().take(index).cloned().collect();
    Ok(record)
}

/// Lazily enrich a stream of records with [`add_prev_actions`].
pub fn prepare_records<I>(records: I) -> impl Iterator<Item = Result<Record, Error>>
where
    I: IntoIterator<Item = Result<Record, Error>>,
{
    records
        .into_iter()
        .map(|record| record.and_then(add_prev_actions))
}

// =============================================================================
// Bounding boxes
// =============================================================================

/// Parse `"x,y,width,height"` into pixel values.
///
/// # Example
/// ```
/// use mind2web_dataset::mind2web::parse_bounding_box_rect;
///
/// let rect = parse_bounding_box_rect("110,607.39,224,39").unwrap();
/// assert_eq!(rect, [110.0, 607.39, 224.0, 39.0]);
/// assert!(parse_bounding_box_rect("110,607.39,224").is_err());
/// ```
pub fn parse_bounding_box_rect(rect: &str) -> Result<[f64; 4], Error> {
    let values = rect
        .split(',')
        .map(|token| token.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Error::InvalidBoundingBox(format!("{:?}: {}", rect, e)))?;

    match values[..] {
        [x, y, w, h] => Ok([x, y, w, h]),
        _ => Err(Error::InvalidBoundingBox(format!(
            "{:?}: expected 4 values, found {}",
            rect,
            values.len()
        ))),
    }
}

/// Convert a pixel rectangle `[x, y, w, h]` to a [`BoundingBox`] relative to
/// an image of `image_width` x `image_height` pixels.
pub fn normalize_bbox(
    rect: &[f64; 4],
    image_width: u32,
    image_height: u32,
) -> Result<BoundingBox, Error> {
    if image_width == 0 || image_height == 0 {
        return Err(Error::InvalidParameters(format!(
            "cannot normalize against a {}x{} image",
            image_width, image_height
        )));
    }

    let [x, y, w, h] = *rect;
    let img_w = image_width as f64;
    let img_h = image_height as f64;

    Ok(BoundingBox::new(x / img_w, y / img_h, w / img_w, h / img_h))
}

// =============================================================================
// Action text
// =============================================================================

/// Extract the action type from `<subject> -> TYPE: value`.
///
/// The value part is optional (`-> CLICK` has none).
pub fn action_type_from_repr(action_repr: &str) -> Result<String, Error> {
    let action = action_repr.split("->").nth(1).ok_or_else(|| {
        Error::InvalidActionRepr(format!("{:?} has no '->' separator", action_repr))
    })?;

    let action_type = action.split(':').next().unwrap_or_default().trim();
    if action_type.is_empty() {
        return Err(Error::InvalidActionRepr(format!(
            "{:?} has an empty action type",
            action_repr
        )));
    }

    Ok(action_type.to_owned())
}

/// Strip the leading `[element-type]` tag and the whitespace after it.
///
/// Only the first bracketed run is removed; text without brackets is returned
/// unchanged.
pub fn clean_action_repr(action_repr: &str) -> String {
    BRACKET_TAG.replace(action_repr, "").into_owned()
}

// =============================================================================
// Detections
// =============================================================================

/// Build a [`Detection`] for `candidate` on an image of the given size.
///
/// With `action_repr` the label is its action type and the text itself is
/// kept on the detection; otherwise the candidate's tag is the label.
pub fn create_detection(
    candidate: &Candidate,
    image_width: u32,
    image_height: u32,
    action_repr: Option<&str>,
) -> Result<Detection, Error> {
    let rect = parse_bounding_box_rect(&candidate.attributes.bounding_box_rect)?;
    let bounding_box = normalize_bbox(&rect, image_width, image_height)?;

    let label = match action_repr {
        Some(repr) => action_type_from_repr(repr)?,
        None => candidate.tag.clone(),
    };

    let mut detection = Detection::new(label, bounding_box);
    detection.target_action_reprs = action_repr.map(str::to_owned);
    Ok(detection)
}
