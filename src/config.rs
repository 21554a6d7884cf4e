use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::VectorizeError;

/// All vectorization parameters in one struct.
/// Serializable so presets can be saved and reloaded; every field has a
/// default, so a preset only needs the values it changes.
///
/// The defaults are empirically tuned for thinned scans of plans and
/// drawings. Changing them recalibrates the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizeConfig {
    // -- Segmenter --
    /// Maximum median residual (px) for a candidate line/arc to be valid.
    pub median_tolerance: f64,
    /// Maximum 90th-percentile residual (px) for a candidate to be valid.
    pub p90_tolerance: f64,
    /// Endpoints closer than this (px) make an edge a closed loop.
    pub closed_loop_gap: f64,
    /// Minimum pixel count for the whole-loop circle attempt.
    pub min_loop_points: usize,
    /// An arc candidate must sweep less than `2π - sweep_margin`.
    pub sweep_margin: f64,
    /// When a line and an arc reach the same index, the arc wins only if
    /// its rms error is below `arc_preference × line rms`.
    pub arc_preference: f64,

    // -- Optimizer --
    /// Gradient-descent steps per inner loop.
    pub max_inner_iterations: usize,
    /// Split-and-reoptimize rounds.
    pub max_outer_rounds: usize,
    /// Central-difference step `h`.
    pub gradient_step: f64,
    /// Gradient-descent learning rate.
    pub learning_rate: f64,
    /// Per-component gradient clamp.
    pub gradient_clamp: f64,
    /// Weight of the squared-residual fidelity cost.
    pub fidelity_weight: f64,
    /// Weight of the axis-alignment penalty on near-straight segments.
    pub alignment_weight: f64,
    /// The alignment penalty applies while |sagitta| is below this (px).
    pub alignment_sagitta: f64,
    /// The inner loop stops once the largest coordinate change is below this.
    pub convergence_tolerance: f64,
    /// Segments whose worst residual exceeds this (px) are split.
    pub split_error: f64,
    /// Only segments with more source pixels than this are split.
    pub min_split_points: usize,
    /// Keep breakpoints at graph junctions fixed during optimization.
    pub pin_junctions: bool,

    // -- Output classification --
    /// |sagitta| below this (px) makes a segment a line.
    pub line_sagitta: f64,
    /// |sagitta| / chord below this makes a segment a line.
    pub line_curvature: f64,
    /// Fitted radii above this (px) are treated as lines.
    pub max_radius: f64,
    /// Endpoint tolerance for marking an output path closed.
    pub closed_epsilon: f64,

    // -- Execution --
    /// Distribute per-edge segmentation and optimization across threads.
    pub parallel: bool,
}

impl Default for VectorizeConfig {
    fn default() -> Self {
        Self {
            median_tolerance: 1.5,
            p90_tolerance: 3.0,
            closed_loop_gap: 2.0,
            min_loop_points: 10,
            sweep_margin: 0.2,
            arc_preference: 0.8,
            max_inner_iterations: 50,
            max_outer_rounds: 5,
            gradient_step: 0.01,
            learning_rate: 0.01,
            gradient_clamp: 1000.0,
            fidelity_weight: 1.0,
            alignment_weight: 1.0,
            alignment_sagitta: 1.0,
            convergence_tolerance: 1e-6,
            split_error: 1.0,
            min_split_points: 4,
            pin_junctions: false,
            line_sagitta: 0.5,
            line_curvature: 0.05,
            max_radius: 1e4,
            closed_epsilon: 1e-4,
            parallel: true,
        }
    }
}

impl VectorizeConfig {
    /// Load a JSON preset. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, VectorizeError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse a JSON preset. Missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, VectorizeError> {
        Ok(serde_json::from_str(text)?)
    }

    /// True when a candidate's residual statistics pass the robust gates.
    pub(crate) fn accepts(&self, median: f64, p90: f64) -> bool {
        median <= self.median_tolerance && p90 <= self.p90_tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_preset_keeps_defaults() {
        let config = VectorizeConfig::from_json(r#"{ "p90_tolerance": 2.5, "parallel": false }"#)
            .expect("valid preset");
        assert_eq!(config.p90_tolerance, 2.5);
        assert!(!config.parallel);
        assert_eq!(config.median_tolerance, 1.5);
        assert_eq!(config.max_inner_iterations, 50);
    }

    #[test]
    fn preset_round_trips_through_a_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("preset.json");
        let config = VectorizeConfig {
            alignment_weight: 0.0,
            ..VectorizeConfig::default()
        };
        std::fs::write(&path, serde_json::to_string_pretty(&config).expect("serialize"))
            .expect("write preset");
        let loaded = VectorizeConfig::from_json_file(&path).expect("load preset");
        assert_eq!(loaded, config);
    }

    #[test]
    fn malformed_preset_is_an_error() {
        assert!(matches!(
            VectorizeConfig::from_json("{ not json"),
            Err(VectorizeError::Json(_))
        ));
    }
}
