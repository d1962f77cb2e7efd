//! varsat
//! ======
//!
//! Flux and spatial-weighting kernel for transient flow through variably saturated porous media,
//! discretised with vertex-centred finite volumes on unstructured triangle and tetrahedron meshes.
//!
//! A single evaluation takes nodal pressure head and produces every per-node, per-face and
//! per-edge quantity an outer nonlinear/time solver needs to form its residual:
//!
//! 1. nodal head is interpolated onto control volume faces with precomputed CSR operators
//!    ([`interpolation`]),
//! 2. porosity, saturation and relative permeability are evaluated per physical zone and
//!    accumulated into nodal fields ([`constitutive`], [`aggregate`]),
//! 3. Darcy and mass fluxes are computed across every control volume face, honouring the
//!    boundary conditions ([`flux`], [`boundary`]),
//! 4. the upstream weighting of every edge is updated for the next evaluation ([`weighting`]),
//!    which may require a halo exchange with neighbouring partitions ([`halo`]).
//!
//! The evaluation pipeline is driven by [`physics::FlowEvaluator`].

use nalgebra::RealField;

pub mod aggregate;
pub mod boundary;
pub mod config;
pub mod connectivity;
pub mod constitutive;
pub mod element;
pub mod flux;
pub mod interpolation;
pub mod mesh;
pub mod physics;
pub mod state;
pub mod util;
pub mod weighting;
pub mod zone;

#[cfg(feature = "proptest-support")]
pub mod proptest;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

pub mod halo {
    pub use varsat_halo::*;
}

/// Scalar type used throughout the kernel.
pub trait Real: RealField + Copy {}

impl<T> Real for T where T: RealField + Copy {}
