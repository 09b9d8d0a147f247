//! Error types shared by the detection engine.
//!
//! Configuration problems are fatal and stop a run before it enters the loop.
//! Match problems are transient: the detector logs them and treats the
//! criterion as not satisfied.

use std::path::PathBuf;

use thiserror::Error;

use crate::automation::registry::MatcherKind;

/// Errors caused by how the bot was set up.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no states registered")]
    NoStates,

    #[error("no matcher bound for {0} criteria")]
    MatcherNotBound(MatcherKind),

    #[error("unknown matcher kind: {0:?} (expected template, text or solid_color)")]
    UnknownMatcherKind(String),

    #[error("unknown solid color: {0:?} (expected white or black)")]
    UnknownColor(String),

    #[error("{kind} criterion cannot carry {options} options")]
    OptionsMismatch {
        kind: MatcherKind,
        options: MatcherKind,
    },

    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Reasons a criterion could not be evaluated against a frame.
///
/// These are distinct from a confident "no match": the detector logs them at
/// warn level but still moves on to the next criterion.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("image not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("template {template_w}x{template_h} does not fit in {image_w}x{image_h} search area")]
    TemplateTooLarge {
        template_w: u32,
        template_h: u32,
        image_w: u32,
        image_h: u32,
    },

    #[error("region of interest is empty")]
    EmptyRegion,

    #[error("invalid pattern {0:?}")]
    InvalidPattern(String),

    #[error("text extraction failed: {0:#}")]
    Extraction(anyhow::Error),
}
