use crate::sandy_loam;
use proptest::prelude::*;
use util::assert_slices_approx_eq;
use varsat::constitutive::{
    density, porosity, Constants, ParallelSaturation, SaturationBackend, SaturationBuffers, SaturationEvaluator,
    SerialSaturation, VanGenuchten,
};
use varsat::proptest::{head, van_genuchten};

fn evaluate_all(evaluator: &dyn SaturationEvaluator<f64>, model: &VanGenuchten<f64>, h: &[f64]) -> [Vec<f64>; 3] {
    let mut sw = vec![0.0; h.len()];
    let mut dsw = vec![0.0; h.len()];
    let mut krw = vec![0.0; h.len()];
    evaluator.evaluate(
        model,
        h,
        SaturationBuffers {
            sw: &mut sw,
            dsw: &mut dsw,
            krw: &mut krw,
        },
    );
    [sw, dsw, krw]
}

#[test]
fn density_is_constant_for_incompressible_fluid() {
    let constants = Constants::water();
    let h = [-3.0, 0.0, 2.5];
    let mut rho = [0.0; 3];
    density(&h, &mut rho, &constants);
    assert_eq!(rho, [1000.0; 3]);
}

#[test]
fn density_grows_linearly_with_head() {
    let constants = Constants::water().with_compressibility(4.4e-10);
    let h = [-3.0, 0.0, 2.5];
    let mut rho = [0.0; 3];
    density(&h, &mut rho, &constants);
    let factor = 1000.0 * 1000.0 * 9.80665 * 4.4e-10;
    let expected: Vec<f64> = h.iter().map(|h| 1000.0 + factor * h).collect();
    assert_slices_approx_eq!(rho, expected, abstol = 1e-12);
}

#[test]
fn porosity_is_constant_for_rigid_matrix() {
    let zone = sandy_loam();
    let h = [-1.0, 0.5];
    let (mut phi, mut dphi) = ([0.0; 2], [1.0; 2]);
    porosity(&h, &mut phi, &mut dphi, &zone, &Constants::water());
    assert_eq!(phi, [zone.phi; 2]);
    assert_eq!(dphi, [0.0; 2]);
}

#[test]
fn porosity_of_compressible_matrix() {
    let zone = sandy_loam().with_compressibility(1e-8);
    let constants = Constants::water();
    let h = [-1.0, 0.5];
    let (mut phi, mut dphi) = ([0.0; 2], [0.0; 2]);
    porosity(&h, &mut phi, &mut dphi, &zone, &constants);

    let factor = (zone.phi - 1.0) * 1000.0 * 9.80665 * 1e-8;
    assert_slices_approx_eq!(phi, [1.0 - factor, 1.0 + 0.5 * factor], abstol = 1e-14);
    assert_slices_approx_eq!(dphi, [factor; 2], abstol = 1e-14);
}

#[test]
fn van_genuchten_matches_closed_form() {
    let model = sandy_loam().van_genuchten();
    let h = -0.4;

    let a = f64::powf(-model.alpha * h, model.n);
    let b = 1.0 + a;
    let se = b.powf(-model.m);
    let sw = model.s_r + (1.0 - model.s_r) * se;
    let dsw = -(1.0 - model.s_r) * (model.n - 1.0) * a * se / (b * h);
    let krw = ((a / b).powf(model.m) - 1.0).powi(2) * se.sqrt();

    let point = model.evaluate(h);
    assert!((point.sw - sw).abs() <= 1e-14);
    assert!((point.dsw - dsw).abs() <= 1e-12 * dsw.abs());
    assert!((point.krw - krw).abs() <= 1e-14);
}

#[test]
fn saturation_derivative_matches_finite_difference() {
    let model = sandy_loam().van_genuchten();
    let eps = 1e-6;
    for h in [-5.0, -1.0, -0.3, -0.01] {
        let fd = (model.evaluate(h + eps).sw - model.evaluate(h - eps).sw) / (2.0 * eps);
        let dsw = model.evaluate(h).dsw;
        assert!((fd - dsw).abs() <= 1e-6 * (1.0 + dsw.abs()), "h = {}: {} vs {}", h, fd, dsw);
    }
}

#[test]
fn saturation_derivative_is_finite_close_to_zero_head() {
    let model = sandy_loam().van_genuchten();
    for h in [-1e-300, -1e-200, -f64::MIN_POSITIVE] {
        let point = model.evaluate(h);
        assert!(point.dsw.is_finite());
        assert!(point.krw.is_finite());
        assert!(point.sw <= 1.0 + 1e-15);
    }
}

#[test]
fn invalid_van_genuchten_parameters_are_rejected() {
    let valid = sandy_loam().van_genuchten();
    assert!(valid.validate().is_ok());
    assert!(VanGenuchten { n: 1.0, ..valid }.validate().is_err());
    assert!(VanGenuchten { alpha: 0.0, ..valid }.validate().is_err());
    assert!(VanGenuchten { s_r: 1.0, ..valid }.validate().is_err());
}

#[test]
fn serial_and_parallel_saturation_are_bit_identical() {
    let model = sandy_loam().van_genuchten();
    let h: Vec<f64> = (0..10_000).map(|i| -20.0 + 0.0021 * i as f64).collect();

    let serial = evaluate_all(&SerialSaturation, &model, &h);
    let parallel = evaluate_all(&ParallelSaturation::with_min_len(16), &model, &h);
    assert_eq!(serial, parallel);

    let from_backend = evaluate_all(SaturationBackend::Parallel.evaluator().as_ref(), &model, &h);
    assert_eq!(serial, from_backend);
}

proptest! {
    #[test]
    fn non_negative_head_is_fully_saturated(model in van_genuchten(), h in 0.0..100.0) {
        let point = model.evaluate(h);
        prop_assert_eq!(point.sw, 1.0);
        prop_assert_eq!(point.dsw, 0.0);
        prop_assert_eq!(point.krw, 1.0);
    }

    #[test]
    fn saturation_stays_within_bounds(model in van_genuchten(), h in head(64)) {
        let [sw, dsw, krw] = evaluate_all(&SerialSaturation, &model, &h);
        for ((&sw, &dsw), &krw) in sw.iter().zip(&dsw).zip(&krw) {
            prop_assert!(sw >= model.s_r && sw <= 1.0 + 1e-15);
            prop_assert!(dsw.is_finite() && dsw >= 0.0);
            prop_assert!(krw >= 0.0 && krw <= 1.0);
        }
    }
}
