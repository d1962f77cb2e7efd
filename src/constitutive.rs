//! Constitutive relations: fluid density, porosity and Van Genuchten–Mualem saturation.
//!
//! All relations take nodal pressure head and write their results into caller-provided buffers.
use crate::zone::PhysicalZone;
use crate::Real;
use eyre::ensure;
use itertools::izip;
use log::trace;
use numeric_literals::replace_float_literals;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Physical constants of the fluid.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Constants<T> {
    /// Reference density.
    pub rho_0: T,
    /// Gravitational acceleration.
    pub g: T,
    /// Fluid compressibility.
    pub beta: T,
    /// Dynamic viscosity.
    pub mu: T,
}

impl<T: Real> Constants<T> {
    /// Fresh water at standard gravity.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn water() -> Self {
        Self {
            rho_0: 1000.0,
            g: 9.80665,
            beta: 0.0,
            mu: 1.0e-3,
        }
    }

    pub fn with_compressibility(self, beta: T) -> Self {
        Self { beta, ..self }
    }

    /// The factor `rho_0² g β` relating density to head.
    pub fn density_gradient(&self) -> T {
        self.rho_0 * self.rho_0 * self.g * self.beta
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn validate(&self) -> eyre::Result<()> {
        ensure!(self.rho_0 > 0.0, "reference density must be positive, got {}", self.rho_0);
        ensure!(self.g >= 0.0, "gravitational acceleration must be non-negative, got {}", self.g);
        ensure!(self.beta >= 0.0, "fluid compressibility must be non-negative, got {}", self.beta);
        ensure!(self.mu > 0.0, "viscosity must be positive, got {}", self.mu);
        Ok(())
    }
}

/// Fluid density as a function of head.
///
/// # Panics
/// Panics if `head` and `rho` differ in length.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn density<T: Real>(head: &[T], rho: &mut [T], constants: &Constants<T>) {
    assert_eq!(head.len(), rho.len(), "density buffer must match head length");
    if constants.beta > 0.0 {
        let factor = constants.density_gradient();
        for (r, &h) in izip!(rho, head) {
            *r = constants.rho_0 + factor * h;
        }
    } else {
        rho.fill(constants.rho_0);
    }
}

/// Porosity and its derivative with respect to head.
///
/// # Panics
/// Panics if the buffers differ in length from `head`.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn porosity<T: Real>(head: &[T], phi: &mut [T], dphi: &mut [T], zone: &PhysicalZone<T>, constants: &Constants<T>) {
    assert_eq!(head.len(), phi.len(), "porosity buffer must match head length");
    assert_eq!(head.len(), dphi.len(), "porosity derivative buffer must match head length");
    if zone.alpha == 0.0 {
        phi.fill(zone.phi);
        dphi.fill(0.0);
    } else {
        let factor = (zone.phi - 1.0) * constants.rho_0 * constants.g * zone.alpha;
        for (p, dp, &h) in izip!(phi, dphi, head) {
            *p = 1.0 + factor * h;
            *dp = factor;
        }
    }
}

/// Saturation, its head derivative and the relative permeability at a single point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SaturationPoint<T> {
    pub sw: T,
    pub dsw: T,
    pub krw: T,
}

/// Van Genuchten retention curve with Mualem relative permeability.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VanGenuchten<T> {
    pub alpha: T,
    pub n: T,
    pub m: T,
    pub s_r: T,
}

impl<T: Real> VanGenuchten<T> {
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn validate(&self) -> eyre::Result<()> {
        ensure!(self.alpha > 0.0, "Van Genuchten alpha must be positive, got {}", self.alpha);
        ensure!(self.n > 1.0, "Van Genuchten n must exceed 1, got {}", self.n);
        ensure!(self.m > 0.0, "Van Genuchten m must be positive, got {}", self.m);
        ensure!(
            self.s_r >= 0.0 && self.s_r < 1.0,
            "residual saturation must lie in [0, 1), got {}",
            self.s_r
        );
        Ok(())
    }

    /// Evaluate the retention curve at head `h`.
    ///
    /// Non-negative head is fully saturated. The saturation derivative is formed without
    /// dividing by `h`, so it stays finite as `h` approaches zero from below.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn evaluate(&self, h: T) -> SaturationPoint<T> {
        if h >= 0.0 {
            return SaturationPoint {
                sw: 1.0,
                dsw: 0.0,
                krw: 1.0,
            };
        }

        let suction = -self.alpha * h;
        let a = suction.powf(self.n);
        let b = 1.0 + a;
        let se = b.powf(-self.m);
        let dsw = (1.0 - self.s_r) * (self.n - 1.0) * self.alpha * suction.powf(self.n - 1.0) * se / b;
        let krw = ((a / b).powf(self.m) - 1.0).powi(2) * se.sqrt();

        SaturationPoint {
            sw: self.s_r + (1.0 - self.s_r) * se,
            dsw,
            krw,
        }
    }
}

/// Output buffers of a bulk saturation evaluation.
#[derive(Debug)]
pub struct SaturationBuffers<'a, T> {
    pub sw: &'a mut [T],
    pub dsw: &'a mut [T],
    pub krw: &'a mut [T],
}

impl<'a, T> SaturationBuffers<'a, T> {
    fn assert_len(&self, len: usize) {
        assert_eq!(self.sw.len(), len, "saturation buffer must match head length");
        assert_eq!(self.dsw.len(), len, "saturation derivative buffer must match head length");
        assert_eq!(self.krw.len(), len, "relative permeability buffer must match head length");
    }
}

/// Evaluates the retention curve over a whole vector of heads.
///
/// Implementations must produce results identical to calling [`VanGenuchten::evaluate`] for
/// every entry.
pub trait SaturationEvaluator<T: Real>: Send + Sync {
    /// # Panics
    /// Panics if any buffer differs in length from `head`.
    fn evaluate(&self, model: &VanGenuchten<T>, head: &[T], out: SaturationBuffers<T>);
}

/// Evaluates one entry after the other on the calling thread.
#[derive(Copy, Clone, Debug, Default)]
pub struct SerialSaturation;

impl<T: Real> SaturationEvaluator<T> for SerialSaturation {
    fn evaluate(&self, model: &VanGenuchten<T>, head: &[T], out: SaturationBuffers<T>) {
        out.assert_len(head.len());
        for (&h, sw, dsw, krw) in izip!(head, out.sw, out.dsw, out.krw) {
            let point = model.evaluate(h);
            *sw = point.sw;
            *dsw = point.dsw;
            *krw = point.krw;
        }
    }
}

/// Evaluates entries in parallel on the rayon thread pool.
#[derive(Copy, Clone, Debug)]
pub struct ParallelSaturation {
    min_len: usize,
}

impl Default for ParallelSaturation {
    fn default() -> Self {
        Self { min_len: 256 }
    }
}

impl ParallelSaturation {
    /// Sets the minimum number of entries handled by a single rayon task.
    pub fn with_min_len(min_len: usize) -> Self {
        Self { min_len: min_len.max(1) }
    }
}

impl<T: Real> SaturationEvaluator<T> for ParallelSaturation {
    fn evaluate(&self, model: &VanGenuchten<T>, head: &[T], out: SaturationBuffers<T>) {
        out.assert_len(head.len());
        trace!("Evaluating saturation of {} nodes in parallel", head.len());
        head.par_iter()
            .zip(out.sw.par_iter_mut())
            .zip(out.dsw.par_iter_mut())
            .zip(out.krw.par_iter_mut())
            .with_min_len(self.min_len)
            .for_each(|(((&h, sw), dsw), krw)| {
                let point = model.evaluate(h);
                *sw = point.sw;
                *dsw = point.dsw;
                *krw = point.krw;
            });
    }
}

/// Selects the saturation evaluation path.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaturationBackend {
    #[default]
    Serial,
    Parallel,
}

impl SaturationBackend {
    pub fn evaluator<T: Real>(&self) -> Box<dyn SaturationEvaluator<T>> {
        match self {
            SaturationBackend::Serial => Box::new(SerialSaturation),
            SaturationBackend::Parallel => Box::new(ParallelSaturation::default()),
        }
    }
}
