// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

/// Error type for every conversion, storage and view operation.
///
/// Decode errors on input records are fatal for the whole run; the only
/// recoverable condition (a record without a screenshot) is not an error and
/// is reported through the log instead.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred during file operations.
    IoError(std::io::Error),
    /// Configuration parsing or loading error.
    ConfigError(config::ConfigError),
    /// JSON serialization or deserialization error.
    JsonError(serde_json::Error),
    /// Image decoding or encoding error.
    ImageError(image::ImageError),
    /// Image header could not be read while computing metadata.
    ImageSizeError(imagesize::ImageError),
    /// Embedded screenshot bytes were not valid base64.
    Base64Error(base64::DecodeError),
    /// Polars dataframe operation error.
    PolarsError(polars::error::PolarsError),
    /// A `bounding_box_rect` string is not four comma separated numbers.
    InvalidBoundingBox(String),
    /// Action text does not follow `<subject> -> TYPE: value`.
    InvalidActionRepr(String),
    /// `target_action_index` is not a non-negative integer.
    InvalidTargetIndex(String),
    /// An input record does not have the expected shape.
    InvalidRecord(String),
    /// A required input field or column is missing or null.
    MissingField(String),
    /// A field is not part of the sample schema.
    UnknownField(String),
    /// Conversion finished without producing a single sample.
    NoValidSamples,
    /// A dataset with this name already exists and overwrite was disabled.
    DatasetExists(String),
    /// No dataset with this name exists in the store.
    DatasetNotFound(String),
    /// The dataset has no saved view with this name.
    ViewNotFound(String),
    /// Invalid parameters provided to an operation.
    InvalidParameters(String),
    /// Unsupported file format.
    UnsupportedFormat(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::ConfigError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonError(err)
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::ImageError(err)
    }
}

impl From<imagesize::ImageError> for Error {
    fn from(err: imagesize::ImageError) -> Self {
        Error::ImageSizeError(err)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Base64Error(err)
    }
}

impl From<polars::error::PolarsError> for Error {
    fn from(err: polars::error::PolarsError) -> Self {
        Error::PolarsError(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::ConfigError(e) => write!(f, "Configuration error: {}", e),
            Error::JsonError(e) => write!(f, "JSON error: {}", e),
            Error::ImageError(e) => write!(f, "Image error: {}", e),
            Error::ImageSizeError(e) => write!(f, "Image size error: {}", e),
            Error::Base64Error(e) => write!(f, "Base64 decode error: {}", e),
            Error::PolarsError(e) => write!(f, "Polars error: {}", e),
            Error::InvalidBoundingBox(s) => write!(f, "Invalid bounding box: {}", s),
            Error::InvalidActionRepr(s) => write!(f, "Invalid action representation: {}", s),
            Error::InvalidTargetIndex(s) => write!(f, "Invalid target action index: {}", s),
            Error::InvalidRecord(s) => write!(f, "Invalid record: {}", s),
            Error::MissingField(s) => write!(f, "Missing field: {}", s),
            Error::UnknownField(s) => write!(f, "Unknown field: {}", s),
            Error::NoValidSamples => write!(f, "No valid samples found in the dataset"),
            Error::DatasetExists(s) => write!(f, "Dataset already exists: {}", s),
            Error::DatasetNotFound(s) => write!(f, "Dataset not found: {}", s),
            Error::ViewNotFound(s) => write!(f, "Saved view not found: {}", s),
            Error::InvalidParameters(s) => write!(f, "Invalid parameters: {}", s),
            Error::UnsupportedFormat(s) => write!(f, "Unsupported format: {}", s),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            Error::ConfigError(e) => Some(e),
            Error::JsonError(e) => Some(e),
            Error::ImageError(e) => Some(e),
            Error::ImageSizeError(e) => Some(e),
            Error::Base64Error(e) => Some(e),
            Error::PolarsError(e) => Some(e),
            _ => None,
        }
    }
}
