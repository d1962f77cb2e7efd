//! Boundary conditions, keyed by the boundary tag of mesh faces.
use crate::Real;
use eyre::{eyre, ensure};
use nalgebra::Vector3;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A boundary value that is either constant or varies in time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoundaryValue<T> {
    Constant(T),
    /// Piecewise linear interpolation between `(time, value)` samples with ascending times.
    /// The first and last samples are held constant outside the sampled interval.
    TimeSeries(Vec<(T, T)>),
}

impl<T: Real> BoundaryValue<T> {
    pub fn at(&self, t: T) -> T {
        match self {
            BoundaryValue::Constant(value) => *value,
            BoundaryValue::TimeSeries(samples) => {
                let (first, last) = match (samples.first(), samples.last()) {
                    (Some(first), Some(last)) => (first, last),
                    _ => return T::zero(),
                };
                if t <= first.0 {
                    return first.1;
                }
                if t >= last.0 {
                    return last.1;
                }
                // The first sample with time > t exists and is not the first one
                let i = samples.partition_point(|&(ti, _)| ti <= t);
                let (t0, v0) = samples[i - 1];
                let (t1, v1) = samples[i];
                v0 + (v1 - v0) * (t - t0) / (t1 - t0)
            }
        }
    }

    fn validate(&self) -> eyre::Result<()> {
        if let BoundaryValue::TimeSeries(samples) = self {
            ensure!(!samples.is_empty(), "time series must contain at least one sample");
            for pair in samples.windows(2) {
                ensure!(
                    pair[0].0 < pair[1].0,
                    "time series sample times must be strictly increasing, but {} is followed by {}",
                    pair[0].0,
                    pair[1].0
                );
            }
        }
        Ok(())
    }
}

impl<T> From<T> for BoundaryValue<T> {
    fn from(value: T) -> Self {
        BoundaryValue::Constant(value)
    }
}

/// Discriminant of a [`BoundaryCondition`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BoundaryKind {
    Dirichlet,
    Hydrostatic,
    PrescribedFlux,
    DirectionalFlux,
    Seepage,
    SeepageShoreline,
}

/// Condition applied on all boundary faces sharing a boundary tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoundaryCondition<T> {
    /// Prescribed head.
    Dirichlet { value: BoundaryValue<T> },
    /// Prescribed head in hydrostatic equilibrium with a water table at `level`.
    Hydrostatic { level: BoundaryValue<T> },
    /// Prescribed volumetric flux per unit area, positive out of the domain.
    PrescribedFlux { value: BoundaryValue<T> },
    /// Flux of magnitude `value` along `direction`, projected onto the face normal.
    DirectionalFlux { value: BoundaryValue<T>, direction: [T; 3] },
    /// Prescribed seepage flux per unit area.
    Seepage { value: BoundaryValue<T> },
    /// Seepage face below a shoreline at `level`. Faces carry no flux.
    SeepageShoreline { level: BoundaryValue<T> },
}

impl<T: Real> BoundaryCondition<T> {
    pub fn dirichlet(value: T) -> Self {
        Self::Dirichlet { value: value.into() }
    }

    pub fn hydrostatic(level: T) -> Self {
        Self::Hydrostatic { level: level.into() }
    }

    pub fn prescribed_flux(value: T) -> Self {
        Self::PrescribedFlux { value: value.into() }
    }

    /// No-flow condition.
    pub fn no_flux() -> Self {
        Self::prescribed_flux(T::zero())
    }

    pub fn kind(&self) -> BoundaryKind {
        match self {
            Self::Dirichlet { .. } => BoundaryKind::Dirichlet,
            Self::Hydrostatic { .. } => BoundaryKind::Hydrostatic,
            Self::PrescribedFlux { .. } => BoundaryKind::PrescribedFlux,
            Self::DirectionalFlux { .. } => BoundaryKind::DirectionalFlux,
            Self::Seepage { .. } => BoundaryKind::Seepage,
            Self::SeepageShoreline { .. } => BoundaryKind::SeepageShoreline,
        }
    }

    /// Whether the condition prescribes the head at boundary nodes.
    pub fn is_dirichlet(&self) -> bool {
        matches!(self, Self::Dirichlet { .. } | Self::Hydrostatic { .. })
    }

    /// The value of the condition at time `t`. For hydrostatic conditions this is the level of
    /// the water table.
    pub fn value(&self, t: T) -> T {
        match self {
            Self::Dirichlet { value }
            | Self::PrescribedFlux { value }
            | Self::DirectionalFlux { value, .. }
            | Self::Seepage { value } => value.at(t),
            Self::Hydrostatic { level } | Self::SeepageShoreline { level } => level.at(t),
        }
    }

    /// Hydrostatic head at the given elevation.
    pub fn hydrostatic_head(&self, t: T, elevation: T) -> T {
        self.value(t) - elevation
    }

    /// Flux per unit area through a face with the given outward unit normal.
    pub fn flux(&self, t: T, normal: &Vector3<T>) -> T {
        match self {
            Self::DirectionalFlux { value, direction } => value.at(t) * Vector3::from(*direction).dot(normal),
            _ => self.value(t),
        }
    }

    /// Head prescribed at a node at the given elevation, if the condition prescribes one.
    pub fn prescribed_head(&self, t: T, elevation: T) -> Option<T> {
        match self {
            Self::Dirichlet { value } => Some(value.at(t)),
            Self::Hydrostatic { .. } => Some(self.hydrostatic_head(t, elevation)),
            _ => None,
        }
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn validate(&self) -> eyre::Result<()> {
        match self {
            Self::Dirichlet { value }
            | Self::PrescribedFlux { value }
            | Self::Seepage { value } => value.validate(),
            Self::Hydrostatic { level } | Self::SeepageShoreline { level } => level.validate(),
            Self::DirectionalFlux { value, direction } => {
                ensure!(
                    Vector3::from(*direction).norm() > 0.0,
                    "directional flux requires a non-zero direction"
                );
                value.validate()
            }
        }
    }
}

/// The boundary conditions of a domain, keyed by boundary tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundaryConditions<T> {
    conditions: BTreeMap<usize, BoundaryCondition<T>>,
}

impl<T> Default for BoundaryConditions<T> {
    fn default() -> Self {
        Self {
            conditions: BTreeMap::new(),
        }
    }
}

impl<T: Real> BoundaryConditions<T> {
    pub fn new() -> Self {
        Self {
            conditions: BTreeMap::new(),
        }
    }

    pub fn with_condition(mut self, tag: usize, condition: BoundaryCondition<T>) -> Self {
        self.insert(tag, condition);
        self
    }

    pub fn insert(&mut self, tag: usize, condition: BoundaryCondition<T>) -> Option<BoundaryCondition<T>> {
        self.conditions.insert(tag, condition)
    }

    pub fn get(&self, tag: usize) -> eyre::Result<&BoundaryCondition<T>> {
        self.conditions
            .get(&tag)
            .ok_or_else(|| eyre!("no boundary condition is configured for boundary tag {}", tag))
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &BoundaryCondition<T>)> {
        self.conditions.iter().map(|(&tag, bc)| (tag, bc))
    }

    pub fn validate(&self) -> eyre::Result<()> {
        for (tag, bc) in self.iter() {
            bc.validate()
                .map_err(|err| eyre!("invalid boundary condition for tag {}: {}", tag, err))?;
        }
        Ok(())
    }
}

impl<T> FromIterator<(usize, BoundaryCondition<T>)> for BoundaryConditions<T> {
    fn from_iter<I: IntoIterator<Item = (usize, BoundaryCondition<T>)>>(iter: I) -> Self {
        Self {
            conditions: iter.into_iter().collect(),
        }
    }
}
