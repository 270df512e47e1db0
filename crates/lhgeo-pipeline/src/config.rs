use lhgeo_core::{MatcherConfig, Real, SensorGeometry};
use lhgeo_linear::InitialEstimatorConfig;
use lhgeo_optim::{AlignmentConfig, GeometrySolverConfig};
use serde::{Deserialize, Serialize};

/// How the aligned system is brought to metric scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScalingConfig {
    /// Keep the scale of the solution.
    None,
    /// The first x-axis sample was taken `distance` metres from the origin.
    ReferenceDistance { distance: Real },
    /// Match the sensor spacing seen where the beams hit the deck plane.
    SensorDiagonal,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self::ReferenceDistance { distance: 1.0 }
    }
}

/// Configuration of a full estimation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationConfig {
    pub sensors: SensorGeometry,
    pub matcher: MatcherConfig,
    pub initial: InitialEstimatorConfig,
    pub solver: GeometrySolverConfig,
    pub alignment: AlignmentConfig,
    pub scaling: ScalingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let json = r#"{ "solver": { "max_iters": 25 }, "scaling": "sensor-diagonal" }"#;
        let config: EstimationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.solver.max_iters, 25);
        assert_eq!(config.solver.ftol, 1e-8);
        assert_eq!(config.scaling, ScalingConfig::SensorDiagonal);
        assert_eq!(config.matcher, MatcherConfig::default());
        assert_eq!(config.sensors, SensorGeometry::deck());
    }

    #[test]
    fn reference_distance_round_trip() {
        let config = EstimationConfig {
            scaling: ScalingConfig::ReferenceDistance { distance: 2.5 },
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("reference-distance"));
        let back: EstimationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
