use crate::{no_flux_everywhere, sandy_loam, single_zone_config};
use util::assert_slices_approx_eq;
use varsat::boundary::{BoundaryCondition, BoundaryValue};
use varsat::config::SimulationConfig;
use varsat::constitutive::{Constants, SaturationBackend};
use varsat::halo::SerialExchange;
use varsat::mesh::procedural::{create_box_tet_mesh, create_rectangular_tri_mesh};
use varsat::mesh::{ControlVolumeMesh, DualMesh};
use varsat::physics::FlowEvaluator;
use varsat::weighting::SpatialWeighting;
use varsat::zone::PhysicalZones;

fn rectangle() -> DualMesh<f64> {
    DualMesh::from_simplex_mesh(&create_rectangular_tri_mesh::<f64>(2.0, 1.0, 6, 4)).unwrap()
}

#[test]
fn uniform_head_is_driven_by_gravity_only() {
    let mesh = rectangle();
    let config = single_zone_config(4);
    let mut exchange = SerialExchange::new(mesh.num_nodes());
    let evaluator = FlowEvaluator::new(&mesh, &config, &mut exchange).unwrap();
    let mut state = evaluator.create_state();

    let h0 = -0.5;
    let head = vec![h0; mesh.num_nodes()];
    evaluator
        .evaluate(0.0, &head, &mut state, &mut exchange)
        .unwrap();

    let zone = sandy_loam();
    let point = zone.van_genuchten().evaluate(h0);
    let n = mesh.num_nodes();
    let n_interior = mesh.num_interior_cv_faces();
    assert_slices_approx_eq!(state.nodes.sw, vec![point.sw; n], abstol = 1e-14);
    assert_slices_approx_eq!(state.nodes.rho, vec![1000.0; n], abstol = 0.0);
    assert_slices_approx_eq!(state.nodes.phi, vec![zone.phi; n], abstol = 1e-14);
    assert_slices_approx_eq!(state.nodes.theta, vec![zone.phi * point.sw; n], abstol = 1e-14);
    let expected_ahh = 1000.0 * zone.phi * point.dsw;
    assert_slices_approx_eq!(state.nodes.ahh, vec![expected_ahh; n], abstol = 1e-10);

    assert_slices_approx_eq!(state.faces.h[..n_interior], vec![h0; n_interior], abstol = 1e-14);
    for g in &state.faces.grad_h {
        assert_slices_approx_eq!(g[..n_interior], vec![0.0; n_interior], abstol = 1e-12);
    }
    assert_slices_approx_eq!(state.faces.rho[..n_interior], vec![1000.0; n_interior], abstol = 0.0);

    for f in mesh.interior_cv_faces() {
        let normal = mesh.cv_face(f).normal;
        let expected = -zone.k_yy * normal.y * point.krw;
        assert!((state.faces.qdotn[f] - expected).abs() <= 1e-18);
        assert!((state.faces.mass_flux[f] - 1000.0 * state.faces.qdotn[f]).abs() <= 1e-15);
    }
    for f in mesh.boundary_cv_faces() {
        assert_eq!(state.faces.qdotn[f], 0.0);
        assert_eq!(state.faces.mass_flux[f], 0.0);
    }

    // Water moves downwards, so the upper node of every vertical edge is upstream
    for e in 0..mesh.num_edges() {
        let nodes = mesh.edge_nodes(e);
        let (back, front) = (mesh.node_position(nodes.back), mesh.node_position(nodes.front));
        if back.x == front.x {
            assert!(front.y > back.y);
            assert_eq!(state.edges.up[e], nodes.front);
            assert_eq!((state.edges.weight_back[e], state.edges.weight_front[e]), (0.0, 1.0));
        }
    }
}

#[test]
fn gravity_points_along_z_in_3d() {
    let mesh = DualMesh::from_simplex_mesh(&create_box_tet_mesh::<f64>([1.0, 1.0, 1.0], [2, 2, 2])).unwrap();
    let config = single_zone_config(6).with_saturation_backend(SaturationBackend::Parallel);
    let mut exchange = SerialExchange::new(mesh.num_nodes());
    let evaluator = FlowEvaluator::new(&mesh, &config, &mut exchange).unwrap();
    assert_eq!(evaluator.dim(), 3);
    let mut state = evaluator.create_state();

    let h0 = -2.0;
    let head = vec![h0; mesh.num_nodes()];
    evaluator
        .evaluate(0.0, &head, &mut state, &mut exchange)
        .unwrap();

    let zone = sandy_loam();
    let krw = zone.van_genuchten().evaluate(h0).krw;
    for f in mesh.interior_cv_faces() {
        let normal = mesh.cv_face(f).normal;
        let expected = -zone.k_zz * normal.z * krw;
        assert!((state.faces.qdotn[f] - expected).abs() <= 1e-18);
    }
}

#[test]
fn hydrostatic_head_has_no_flux() {
    // h = level - z makes the total head uniform
    let mesh = rectangle();
    let config = single_zone_config(4).with_spatial_weighting(SpatialWeighting::Averaging);
    let mut exchange = SerialExchange::new(mesh.num_nodes());
    let evaluator = FlowEvaluator::new(&mesh, &config, &mut exchange).unwrap();
    let mut state = evaluator.create_state();

    let head: Vec<f64> = (0..mesh.num_nodes())
        .map(|n| 0.2 - mesh.node_position(n).y)
        .collect();
    evaluator
        .evaluate(0.0, &head, &mut state, &mut exchange)
        .unwrap();
    for &q in &state.faces.qdotn {
        assert!(q.abs() <= 1e-17);
    }
}

#[test]
fn boundary_fluxes_follow_conditions() {
    let mesh = rectangle();
    let inflow = -1e-5;
    let conditions = no_flux_everywhere(4)
        .with_condition(3, BoundaryCondition::prescribed_flux(inflow))
        .with_condition(
            2,
            BoundaryCondition::DirectionalFlux {
                value: BoundaryValue::Constant(4e-6),
                direction: [1.0, 0.0, 0.0],
            },
        );
    let config = single_zone_config(4).with_boundary_conditions(conditions);
    let mut exchange = SerialExchange::new(mesh.num_nodes());
    let evaluator = FlowEvaluator::new(&mesh, &config, &mut exchange).unwrap();
    let mut state = evaluator.create_state();
    let head = vec![-1.0; mesh.num_nodes()];
    evaluator
        .evaluate(0.0, &head, &mut state, &mut exchange)
        .unwrap();

    for f in mesh.boundary_cv_faces() {
        let face = mesh.cv_face(f);
        let (q, m) = (state.faces.qdotn[f], state.faces.mass_flux[f]);
        match face.boundary_tag.unwrap() {
            3 => {
                assert!((q - inflow * face.area).abs() <= 1e-20);
                // Inflow carries the density of the node
                assert_eq!(m, state.nodes.rho[face.back] * q);
            }
            2 => {
                assert!((q - 4e-6 * face.area).abs() <= 1e-20);
                // Outflow carries the reference density
                assert_eq!(m, 1000.0 * q);
            }
            _ => assert_eq!(q, 0.0),
        }
    }

    // Top width 2, right height 1
    let expected = 1000.0 * (2.0 * inflow + 1.0 * 4e-6);
    assert!((evaluator.boundary_mass_flux(&state) - expected).abs() <= 1e-12);
}

#[test]
fn dirichlet_nodes_and_initial_head() {
    let mesh = rectangle();
    let conditions = no_flux_everywhere(4)
        .with_condition(1, BoundaryCondition::hydrostatic(0.75))
        .with_condition(4, BoundaryCondition::dirichlet(-0.25));
    let config = single_zone_config(4).with_boundary_conditions(conditions);
    let mut exchange = SerialExchange::new(mesh.num_nodes());
    let evaluator = FlowEvaluator::new(&mesh, &config, &mut exchange).unwrap();

    let dirichlet = evaluator.dirichlet_nodes();
    for node in 0..mesh.num_nodes() {
        let p = mesh.node_position(node);
        let expected_tag = if p.y == 0.0 {
            Some(1)
        } else if p.x == 0.0 {
            Some(4)
        } else {
            None
        };
        let actual_tag = dirichlet
            .iter()
            .find(|&&(n, _)| n == node)
            .map(|&(_, tag)| tag);
        assert_eq!(actual_tag, expected_tag);
    }

    // Bottom nodes sit at elevation zero
    assert_eq!(evaluator.dirichlet_head(0.0, 0), Some(0.75));
    let top_left = 4 * 7;
    assert_eq!(mesh.node_position(top_left).y, 1.0);
    assert_eq!(evaluator.dirichlet_head(0.0, top_left), Some(-0.25));
    assert_eq!(evaluator.dirichlet_head(0.0, 8), None);

    let initial = evaluator.initial_head(0.0, |p| -p.y);
    for node in 0..mesh.num_nodes() {
        let expected = evaluator
            .dirichlet_head(0.0, node)
            .unwrap_or(-mesh.node_position(node).y);
        assert_eq!(initial[node], expected);
    }
}

#[test]
fn time_dependent_dirichlet_head() {
    let mesh = rectangle();
    let conditions = no_flux_everywhere(4).with_condition(
        3,
        BoundaryCondition::Dirichlet {
            value: BoundaryValue::TimeSeries(vec![(0.0, -1.0), (10.0, 0.0)]),
        },
    );
    let config = single_zone_config(4).with_boundary_conditions(conditions);
    let mut exchange = SerialExchange::new(mesh.num_nodes());
    let evaluator = FlowEvaluator::new(&mesh, &config, &mut exchange).unwrap();
    let top_node = mesh.num_nodes() - 1;
    assert_eq!(evaluator.dirichlet_head(0.0, top_node), Some(-1.0));
    assert_eq!(evaluator.dirichlet_head(5.0, top_node), Some(-0.5));
    assert_eq!(evaluator.dirichlet_head(20.0, top_node), Some(0.0));
}

#[test]
fn fluid_mass_and_accumulation() {
    let mesh = rectangle();
    let config = SimulationConfig::new(
        Constants::water().with_compressibility(4.4e-10),
        PhysicalZones::new().with_zone(1, sandy_loam().with_compressibility(1e-8)),
    )
    .with_boundary_conditions(no_flux_everywhere(4));
    let mut exchange = SerialExchange::new(mesh.num_nodes());
    let evaluator = FlowEvaluator::new(&mesh, &config, &mut exchange).unwrap();
    let mut state = evaluator.create_state();

    let head = vec![-0.3; mesh.num_nodes()];
    evaluator
        .evaluate(0.0, &head, &mut state, &mut exchange)
        .unwrap();

    let (rho, theta) = (state.nodes.rho[0], state.nodes.theta[0]);
    let expected_mass = 2.0 * rho * theta;
    assert!((evaluator.fluid_mass(&state) - expected_mass).abs() <= 1e-10 * expected_mass);

    let nodes = &state.nodes;
    let c = 1000.0 * 1000.0 * 9.80665 * 4.4e-10;
    for i in 0..mesh.num_nodes() {
        let expected = nodes.rho[i] * nodes.phi[i] * nodes.dsw[i]
            + nodes.rho[i] * nodes.sw[i] * nodes.dphi[i]
            + c * nodes.phi[i] * nodes.sw[i];
        assert!((nodes.ahh[i] - expected).abs() <= 1e-12 * expected.abs());
    }

    let head_dot = vec![2.0; mesh.num_nodes()];
    let accumulation = evaluator.accumulation(&state, &head_dot);
    let expected: Vec<f64> = nodes.ahh.iter().map(|a| 2.0 * a).collect();
    assert_slices_approx_eq!(accumulation, expected, abstol = 0.0);
}

#[test]
fn edge_weights_carry_over_between_evaluations() {
    let mesh = rectangle();
    let config = single_zone_config(4);
    let mut exchange = SerialExchange::new(mesh.num_nodes());
    let evaluator = FlowEvaluator::new(&mesh, &config, &mut exchange).unwrap();
    let mut state = evaluator.create_state();
    assert!(state.edges.weight_back.iter().all(|&w| w == 0.5));

    let head: Vec<f64> = (0..mesh.num_nodes())
        .map(|n| -0.1 - 0.8 * mesh.node_position(n).x)
        .collect();
    evaluator
        .evaluate(0.0, &head, &mut state, &mut exchange)
        .unwrap();
    let first_krw = state.faces.krw_lim.clone();
    let weights = state.edges.weight_back.clone();
    assert!(weights.iter().all(|&w| w == 0.0 || w == 1.0));

    evaluator
        .evaluate(0.0, &head, &mut state, &mut exchange)
        .unwrap();
    // Upwinded relative permeability differs from the even blend of the first evaluation
    assert_ne!(state.faces.krw_lim, first_krw);
    assert_eq!(state.edges.weight_back, weights);
}

#[test]
fn setup_and_evaluation_errors() {
    let mesh = rectangle();
    let mut exchange = SerialExchange::new(mesh.num_nodes());

    // Tag 4 has no boundary condition
    let missing_condition = single_zone_config(4).with_boundary_conditions(no_flux_everywhere(3));
    assert!(FlowEvaluator::new(&mesh, &missing_condition, &mut exchange).is_err());

    let missing_zone = SimulationConfig::new(Constants::water(), PhysicalZones::new().with_zone(2, sandy_loam()))
        .with_boundary_conditions(no_flux_everywhere(4));
    assert!(FlowEvaluator::new(&mesh, &missing_zone, &mut exchange).is_err());

    let mut wrong_size = SerialExchange::new(mesh.num_nodes() + 1);
    assert!(FlowEvaluator::new(&mesh, &single_zone_config(4), &mut wrong_size).is_err());

    let evaluator = FlowEvaluator::new(&mesh, &single_zone_config(4), &mut exchange).unwrap();
    let mut state = evaluator.create_state();
    let short_head = vec![-1.0; mesh.num_nodes() - 1];
    assert!(evaluator
        .evaluate(0.0, &short_head, &mut state, &mut exchange)
        .is_err());
}

#[test]
#[should_panic]
fn mismatched_state_panics() {
    let mesh = rectangle();
    let mut exchange = SerialExchange::new(mesh.num_nodes());
    let evaluator = FlowEvaluator::new(&mesh, &single_zone_config(4), &mut exchange).unwrap();
    let other = DualMesh::from_simplex_mesh(&create_rectangular_tri_mesh::<f64>(1.0, 1.0, 2, 2)).unwrap();
    let mut state = varsat::state::FlowState::new(&other);
    let head = vec![-1.0; mesh.num_nodes()];
    let _ = evaluator.evaluate(0.0, &head, &mut state, &mut exchange);
}
