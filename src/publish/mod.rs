//! # Publication
//!
//! Exposes the encoder positions to readers outside the polling worker. The
//! only format is one text line, `"<enc1_position> <enc2_position>"`, with
//! space separated decimal integers and no trailing newline.
//!
//! Publication is best effort: if the attribute can not be created the
//! failure is logged and position tracking carries on.

pub mod attribute;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use attribute::AttributePublisher;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    /// File that mirrors the attribute node.
    pub attribute_path: PathBuf,

    /// How often the file and subscribers are refreshed.
    pub refresh_interval_ms: u64,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            attribute_path: PathBuf::from("/run/encodio/enc/dot"),
            refresh_interval_ms: 50,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Failed to create attribute {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write attribute {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove attribute {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Attribute refresh task failed: {0}")]
    TaskError(String),
}
