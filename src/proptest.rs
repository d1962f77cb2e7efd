//! Strategies for property-based testing.
use crate::constitutive::VanGenuchten;
use crate::element::{Tet4Element, Tri3Element};
use crate::zone::PhysicalZone;
use ::proptest::prelude::*;
use nalgebra::{Point2, Point3, Vector3};

pub fn point2() -> impl Strategy<Value = Point2<f64>> {
    // Keep coordinates small, so that element geometry stays well conditioned
    let range = -10.0..10.0;
    [range.clone(), range.clone()].prop_map(|[x, y]| Point2::new(x, y))
}

pub fn point3() -> impl Strategy<Value = Point3<f64>> {
    let range = -10.0..10.0;
    [range.clone(), range.clone(), range.clone()].prop_map(|[x, y, z]| Point3::new(x, y, z))
}

/// Van Genuchten parameters obeying the Mualem constraint `m = 1 - 1/n`.
pub fn van_genuchten() -> impl Strategy<Value = VanGenuchten<f64>> {
    (0.01..10.0, 1.05..5.0, 0.0..0.5).prop_map(|(alpha, n, s_r)| VanGenuchten {
        alpha,
        n,
        m: 1.0 - 1.0 / n,
        s_r,
    })
}

/// Isotropic zones with physically plausible parameters.
pub fn physical_zone() -> impl Strategy<Value = PhysicalZone<f64>> {
    (1e-7..1e-2, 0.05..0.6, van_genuchten())
        .prop_map(|(k, phi, vg)| PhysicalZone::isotropic(k, phi, vg.alpha, vg.n, vg.s_r))
}

/// Head values spanning the unsaturated and the saturated range.
pub fn head(len: usize) -> impl Strategy<Value = Vec<f64>> {
    ::proptest::collection::vec(-50.0..5.0, len)
}

impl Arbitrary for Tri3Element<f64> {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        // Counter-clockwise triangles with a lower bound on the area
        [point2(), point2(), point2()]
            .prop_filter("triangle must not be degenerate", |[a, b, c]| {
                let (ab, ac) = (b - a, c - a);
                ab.x * ac.y - ab.y * ac.x > 1e-1
            })
            .prop_map(Tri3Element::from_vertices)
            .boxed()
    }
}

impl Arbitrary for Tet4Element<f64> {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        [point3(), point3(), point3(), point3()]
            .prop_filter("tetrahedron must not be degenerate", |[a, b, c, d]| {
                let volume: Vector3<f64> = (b - a).cross(&(c - a));
                volume.dot(&(d - a)) > 1.0
            })
            .prop_map(Tet4Element::from_vertices)
            .boxed()
    }
}
