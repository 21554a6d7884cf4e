//! skel2vec: thinned line-art skeleton → line and arc vector paths.
//!
//! Traces a one-pixel-wide skeleton bitmap (scanned plans, technical
//! drawings) into a graph of pixel chains, classifies each chain into
//! straight lines and circular arcs, and refines the result by joint
//! gradient descent so neighboring segments meet cleanly at corners.
//!
//! # Example
//!
//! ```no_run
//! use skel2vec::{vectorize_skeleton, BinaryImage, ThresholdMethod};
//! use std::path::Path;
//!
//! let skeleton = BinaryImage::load(Path::new("plan.png"), ThresholdMethod::Otsu, false)?;
//! let vectors = vectorize_skeleton(&skeleton);
//! let svg = skel2vec::svg::to_svg_document(&vectors, &Default::default());
//! # Ok::<(), skel2vec::VectorizeError>(())
//! ```

#![forbid(unsafe_code)]

mod bitmap;
mod config;
mod geom;

pub mod error;
pub mod render;
pub mod svg;
pub mod vector;
pub mod vectorize;

// Re-export kurbo so downstream users get the same version
// used by the output model (kurbo::Point, kurbo::BezPath).
pub use kurbo;

pub use bitmap::{BinaryImage, ThresholdMethod};
pub use config::VectorizeConfig;
pub use error::VectorizeError;
pub use vector::{ArcSegment, LineSegment, Path, Segment, VectorImage};
pub use vectorize::{vectorize_skeleton, vectorize_skeleton_with};
