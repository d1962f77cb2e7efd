//! Material properties of the physical zones of the domain.
use crate::constitutive::VanGenuchten;
use crate::Real;
use eyre::{eyre, ensure};
use nalgebra::Vector3;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hydraulic and retention properties of a single physical zone.
///
/// Zones are identified by the physical tag carried by the mesh elements.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicalZone<T> {
    /// Saturated hydraulic conductivity along x.
    pub k_xx: T,
    /// Saturated hydraulic conductivity along y.
    pub k_yy: T,
    /// Saturated hydraulic conductivity along z.
    pub k_zz: T,
    /// Reference porosity.
    pub phi: T,
    /// Compressibility of the porous matrix.
    pub alpha: T,
    pub alpha_vg: T,
    pub n_vg: T,
    pub m_vg: T,
    /// Residual saturation.
    pub s_r: T,
    /// Molecular diffusivity.
    pub dm: T,
}

impl<T: Real> PhysicalZone<T> {
    /// An isotropic, incompressible zone using the Mualem constraint `m = 1 - 1/n`.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn isotropic(k: T, phi: T, alpha_vg: T, n_vg: T, s_r: T) -> Self {
        Self {
            k_xx: k,
            k_yy: k,
            k_zz: k,
            phi,
            alpha: 0.0,
            alpha_vg,
            n_vg,
            m_vg: 1.0 - 1.0 / n_vg,
            s_r,
            dm: 0.0,
        }
    }

    pub fn with_compressibility(self, alpha: T) -> Self {
        Self { alpha, ..self }
    }

    /// Diagonal of the saturated conductivity tensor.
    pub fn conductivity(&self) -> Vector3<T> {
        Vector3::new(self.k_xx, self.k_yy, self.k_zz)
    }

    pub fn van_genuchten(&self) -> VanGenuchten<T> {
        VanGenuchten {
            alpha: self.alpha_vg,
            n: self.n_vg,
            m: self.m_vg,
            s_r: self.s_r,
        }
    }

    /// Checks that the zone describes a physically plausible material.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn validate(&self) -> eyre::Result<()> {
        ensure!(
            self.k_xx > 0.0 && self.k_yy > 0.0 && self.k_zz > 0.0,
            "conductivity must be positive, got ({}, {}, {})",
            self.k_xx,
            self.k_yy,
            self.k_zz
        );
        ensure!(self.phi > 0.0 && self.phi <= 1.0, "porosity must lie in (0, 1], got {}", self.phi);
        ensure!(self.alpha >= 0.0, "matrix compressibility must be non-negative, got {}", self.alpha);
        ensure!(self.dm >= 0.0, "molecular diffusivity must be non-negative, got {}", self.dm);
        self.van_genuchten().validate()
    }
}

/// The zones of a domain, keyed by physical tag.
///
/// Iteration is in ascending tag order, which fixes the order in which zone contributions are
/// accumulated into nodal fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhysicalZones<T> {
    zones: BTreeMap<usize, PhysicalZone<T>>,
}

impl<T> Default for PhysicalZones<T> {
    fn default() -> Self {
        Self { zones: BTreeMap::new() }
    }
}

impl<T: Real> PhysicalZones<T> {
    pub fn new() -> Self {
        Self { zones: BTreeMap::new() }
    }

    pub fn with_zone(mut self, tag: usize, zone: PhysicalZone<T>) -> Self {
        self.insert(tag, zone);
        self
    }

    pub fn insert(&mut self, tag: usize, zone: PhysicalZone<T>) -> Option<PhysicalZone<T>> {
        self.zones.insert(tag, zone)
    }

    pub fn get(&self, tag: usize) -> eyre::Result<&PhysicalZone<T>> {
        self.zones
            .get(&tag)
            .ok_or_else(|| eyre!("no physical zone is configured for tag {}", tag))
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Physical tags in ascending order.
    pub fn tags(&self) -> impl Iterator<Item = usize> + '_ {
        self.zones.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &PhysicalZone<T>)> {
        self.zones.iter().map(|(&tag, zone)| (tag, zone))
    }

    pub fn validate(&self) -> eyre::Result<()> {
        ensure!(!self.zones.is_empty(), "at least one physical zone must be configured");
        for (tag, zone) in self.iter() {
            zone.validate().map_err(|err| eyre!("invalid physical zone {}: {}", tag, err))?;
        }
        Ok(())
    }
}

impl<T> FromIterator<(usize, PhysicalZone<T>)> for PhysicalZones<T> {
    fn from_iter<I: IntoIterator<Item = (usize, PhysicalZone<T>)>>(iter: I) -> Self {
        Self {
            zones: iter.into_iter().collect(),
        }
    }
}
