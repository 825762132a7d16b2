// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Mind2Web record and candidate structures.

use crate::Error;
use image::DynamicImage;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One navigation step of a Mind2Web trajectory.
#[derive(Debug, Clone, Default)]
pub struct Record {
    pub action_uid: String,
    pub annotation_id: String,
    /// Position of this step in `action_reprs`, as found in the source
    /// (Mind2Web stores it as a string).
    pub target_action_index: String,
    /// Decoded screenshot, absent for some steps.
    pub screenshot: Option<DynamicImage>,
    /// JSON encoded candidate elements; the first one is the ground truth.
    pub pos_candidates: Vec<String>,
    /// Action taken at this step, e.g. `[button]  Search -> CLICK`.
    pub target_action_reprs: String,
    /// Every action of the trajectory, in order.
    pub action_reprs: Vec<String>,
    pub website: String,
    pub domain: String,
    pub subdomain: String,
    pub confirmed_task: String,
    /// Actions before this step, filled by
    /// [`add_prev_actions`](super::add_prev_actions).
    pub prev_actions: Vec<String>,
}

impl Record {
    /// Integer value of `target_action_index`.
    pub fn target_index(&self) -> Result<usize, Error> {
        self.target_action_index.trim().parse().map_err(|_| {
            Error::InvalidTargetIndex(format!(
                "{:?} for action {}",
                self.target_action_index, self.action_uid
            ))
        })
    }
}

/// A candidate DOM element as serialized in `pos_candidates`.
#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    /// Element tag, e.g. `button`.
    pub tag: String,
    /// Element attributes, a JSON encoded object in the source data.
    #[serde(deserialize_with = "attributes_object")]
    pub attributes: CandidateAttributes,
}

impl Candidate {
    /// Parse one JSON encoded candidate.
    pub fn parse(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateAttributes {
    /// Pixel rectangle `"x,y,width,height"` with a top-left origin.
    pub bounding_box_rect: String,
}

/// Accept the attributes either as a JSON string holding an object (the
/// Mind2Web encoding) or as an already decoded object.
fn attributes_object<'de, D>(deserializer: D) -> Result<CandidateAttributes, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => serde_json::from_str(&s).map_err(serde::de::Error::custom),
        value @ Value::Object(_) => {
            serde_json::from_value(value).map_err(serde::de::Error::custom)
        }
        other => Err(serde::de::Error::custom(format!(
            "attributes must be a JSON object or string, got {}",
            other
        ))),
    }
}
