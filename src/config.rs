//! Simulation parameters.
//!
//! The library never reads files itself. A [`SimulationConfig`] can be deserialized from any
//! serde format by the caller, or built in code.
use crate::boundary::BoundaryConditions;
use crate::constitutive::{Constants, SaturationBackend};
use crate::weighting::SpatialWeighting;
use crate::zone::PhysicalZones;
use crate::Real;
use serde::{Deserialize, Serialize};

/// Everything the flow evaluator needs besides the mesh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig<T> {
    pub constants: Constants<T>,
    pub zones: PhysicalZones<T>,
    #[serde(default)]
    pub boundary_conditions: BoundaryConditions<T>,
    #[serde(default)]
    pub spatial_weighting: SpatialWeighting,
    #[serde(default)]
    pub saturation_backend: SaturationBackend,
}

impl<T: Real> SimulationConfig<T> {
    pub fn new(constants: Constants<T>, zones: PhysicalZones<T>) -> Self {
        Self {
            constants,
            zones,
            boundary_conditions: BoundaryConditions::new(),
            spatial_weighting: SpatialWeighting::default(),
            saturation_backend: SaturationBackend::default(),
        }
    }

    pub fn with_boundary_conditions(self, boundary_conditions: BoundaryConditions<T>) -> Self {
        Self {
            boundary_conditions,
            ..self
        }
    }

    pub fn with_spatial_weighting(self, spatial_weighting: SpatialWeighting) -> Self {
        Self {
            spatial_weighting,
            ..self
        }
    }

    pub fn with_saturation_backend(self, saturation_backend: SaturationBackend) -> Self {
        Self {
            saturation_backend,
            ..self
        }
    }

    /// Checks the physical plausibility of all parameters.
    pub fn validate(&self) -> eyre::Result<()> {
        self.constants.validate()?;
        self.zones.validate()?;
        self.boundary_conditions.validate()
    }
}
