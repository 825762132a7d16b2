// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Saved view definitions and their evaluation against a dataset.
//!
//! A [`View`] is a list of stages that is stored by value inside the dataset,
//! so it survives a save/load cycle and is evaluated lazily with
//! [`View::groups`].

use crate::{Dataset, Sample};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{cmp::Ordering, collections::HashMap};

/// A single view stage.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ViewStage {
    /// Partition samples by the value of `field`, sorting each partition by
    /// `order_by` when given.
    GroupBy {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order_by: Option<String>,
        #[serde(default)]
        reverse: bool,
    },
}

/// Samples sharing one group key, in view order.
#[derive(Debug, Clone)]
pub struct Group<'a> {
    pub key: Value,
    pub samples: Vec<&'a Sample>,
}

impl Group<'_> {
    /// The group key rendered for display; strings are shown unquoted.
    pub fn key_str(&self) -> String {
        match &self.key {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct View {
    stages: Vec<ViewStage>,
}

impl View {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn group_by(mut self, field: &str, order_by: Option<&str>, reverse: bool) -> Self {
        self.stages.push(ViewStage::GroupBy {
            field: field.to_owned(),
            order_by: order_by.map(str::to_owned),
            reverse,
        });
        self
    }

    pub fn stages(&self) -> &[ViewStage] {
        &self.stages
    }

    /// Evaluate the view against `dataset`.
    ///
    /// Without a group stage every sample lands in a single group keyed by
    /// `null`. Groups appear in the order their first sample appears in the
    /// dataset and the in-group sort is stable.
    pub fn groups<'a>(&self, dataset: &'a Dataset) -> Vec<Group<'a>> {
        let stage = self.stages.iter().rev().find_map(|stage| match stage {
            ViewStage::GroupBy {
                field,
                order_by,
                reverse,
            } => Some((field, order_by, *reverse)),
        });

        let Some((field, order_by, reverse)) = stage else {
            return vec![Group {
                key: Value::Null,
                samples: dataset.samples().iter().collect(),
            }];
        };

        let mut groups: Vec<Group<'a>> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for sample in dataset.samples() {
            let key = sample.field(field).unwrap_or(Value::Null);
            match index.get(&key.to_string()) {
                Some(&i) => groups[i].samples.push(sample),
                None => {
                    index.insert(key.to_string(), groups.len());
                    groups.push(Group {
                        key,
                        samples: vec![sample],
                    });
                }
            }
        }

        if let Some(order_by) = order_by {
            for group in groups.iter_mut() {
                group.samples.sort_by(|a, b| {
                    let ordering = compare_values(
                        &a.field(order_by).unwrap_or(Value::Null),
                        &b.field(order_by).unwrap_or(Value::Null),
                    );
                    if reverse { ordering.reverse() } else { ordering }
                });
            }
        }

        groups
    }
}

/// Total order over field values: nulls, then booleans, numbers, strings and
/// finally anything else compared by its JSON text.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            _ => 4,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ if rank(a) != rank(b) => rank(a).cmp(&rank(b)),
        _ => a.to_string().cmp(&b.to_string()),
    }
}
