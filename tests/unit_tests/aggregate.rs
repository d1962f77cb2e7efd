use crate::{clay, sandy_loam};
use varsat::aggregate::{ZoneAggregator, ZoneTables};
use varsat::constitutive::{Constants, SerialSaturation};
use varsat::mesh::procedural::create_rectangular_tri_mesh;
use varsat::mesh::{ControlVolumeMesh, DualMesh};
use varsat::state::{EdgeFields, NodalFields};
use varsat::zone::PhysicalZones;

/// A 2 x 1 rectangle with sandy loam to the left of `x = 1` and clay to the right.
fn layered_mesh() -> DualMesh<f64> {
    let mut mesh = create_rectangular_tri_mesh::<f64>(2.0, 1.0, 4, 2);
    mesh.tag_cells(|c| if c.x < 1.0 { 1 } else { 2 });
    DualMesh::from_simplex_mesh(&mesh).unwrap()
}

fn layered_zones() -> PhysicalZones<f64> {
    PhysicalZones::new()
        .with_zone(1, sandy_loam())
        .with_zone(2, clay())
}

#[test]
fn zone_weights_sum_to_one() {
    let mesh = layered_mesh();
    let tables = ZoneTables::build(&mesh, &layered_zones()).unwrap();
    assert_eq!(tables.len(), 2);
    assert_eq!(tables.tables()[0].tag, 1);
    assert_eq!(tables.tables()[1].tag, 2);

    for sum in tables.node_weight_sums(mesh.num_nodes()) {
        assert!((sum - 1.0).abs() <= 1e-14);
    }

    // Nodes on the interface x = 1 belong to both zones with equal weight
    for table in tables.tables() {
        assert!(table.nodes.windows(2).all(|w| w[0] < w[1]));
        for (&node, &w) in table.nodes.iter().zip(&table.weights) {
            if mesh.node_position(node).x == 1.0 {
                assert!(w > 0.0 && w < 1.0);
            } else {
                assert_eq!(w, 1.0);
            }
        }
    }
}

#[test]
fn face_tables_cover_interior_faces_of_their_zone() {
    let mesh = layered_mesh();
    let tables = ZoneTables::build(&mesh, &layered_zones()).unwrap();
    let total: usize = tables.tables().iter().map(|t| t.front.len()).sum();
    assert_eq!(total, mesh.num_interior_cv_faces());

    for table in tables.tables() {
        assert_eq!(table.front.len(), table.back.len());
        for (&zone_node, &face) in table.front.zone_node.iter().zip(&table.front.face) {
            assert_eq!(table.nodes[zone_node], mesh.cv_face(face).front);
        }
        for (&zone_node, &face) in table.back.zone_node.iter().zip(&table.back.face) {
            assert_eq!(table.nodes[zone_node], mesh.cv_face(face).back);
        }
    }
}

#[test]
fn missing_zone_is_an_error() {
    let mesh = layered_mesh();
    let zones = PhysicalZones::new().with_zone(1, sandy_loam());
    assert!(ZoneTables::build(&mesh, &zones).is_err());
}

#[test]
fn aggregation_blends_zones_by_volume_fraction() {
    let mesh = layered_mesh();
    let tables = ZoneTables::build(&mesh, &layered_zones()).unwrap();
    let aggregator = ZoneAggregator::new(tables.clone(), Constants::water(), Box::new(SerialSaturation));

    let h0 = -0.8;
    let head = vec![h0; mesh.num_nodes()];
    let edges = EdgeFields::new(mesh.num_edges());
    let mut nodal = NodalFields::new(mesh.num_nodes());
    nodal.sw.fill(42.0);
    let mut krw_faces = vec![0.0; mesh.num_interior_cv_faces()];
    aggregator.aggregate(&head, &edges, &mut nodal, &mut krw_faces);

    let sand = sandy_loam().van_genuchten().evaluate(h0);
    let clay = clay().van_genuchten().evaluate(h0);
    let mut sand_weight = vec![0.0; mesh.num_nodes()];
    for (&node, &w) in tables.tables()[0].nodes.iter().zip(&tables.tables()[0].weights) {
        sand_weight[node] = w;
    }

    for node in 0..mesh.num_nodes() {
        let w = sand_weight[node];
        let expected_sw = w * sand.sw + (1.0 - w) * clay.sw;
        let expected_phi = w * sandy_loam().phi + (1.0 - w) * crate::clay().phi;
        assert!((nodal.sw[node] - expected_sw).abs() <= 1e-14);
        assert!((nodal.dsw[node] - (w * sand.dsw + (1.0 - w) * clay.dsw)).abs() <= 1e-12);
        assert!((nodal.phi[node] - expected_phi).abs() <= 1e-14);
        assert_eq!(nodal.dphi[node], 0.0);
        let expected_theta = w * sand.sw * sandy_loam().phi + (1.0 - w) * clay.sw * crate::clay().phi;
        assert!((nodal.theta[node] - expected_theta).abs() <= 1e-14);
    }

    // With even edge weights, each face receives the relative permeability of its zone
    for table in tables.tables() {
        let krw = if table.tag == 1 { sand.krw } else { clay.krw };
        for &face in &table.front.face {
            assert!((krw_faces[face] - krw).abs() <= 1e-14);
        }
    }
}

#[test]
fn relative_permeability_follows_edge_weights() {
    let mesh = layered_mesh();
    let tables = ZoneTables::build(&mesh, &layered_zones()).unwrap();
    let aggregator = ZoneAggregator::new(tables, Constants::water(), Box::new(SerialSaturation));

    // Head varies with x, so the two end nodes of most edges differ
    let head: Vec<f64> = (0..mesh.num_nodes())
        .map(|n| -0.2 - mesh.node_position(n).x)
        .collect();
    let mut edges = EdgeFields::new(mesh.num_edges());
    edges.weight_back.fill(1.0);
    edges.weight_front.fill(0.0);
    let mut nodal = NodalFields::new(mesh.num_nodes());
    let mut krw_faces = vec![0.0; mesh.num_interior_cv_faces()];
    aggregator.aggregate(&head, &edges, &mut nodal, &mut krw_faces);

    for face_idx in mesh.interior_cv_faces() {
        let face = mesh.cv_face(face_idx);
        let zone = if mesh.element_physical_tag(face.element) == 1 {
            sandy_loam()
        } else {
            clay()
        };
        let expected = zone.van_genuchten().evaluate(head[face.back]).krw;
        assert!((krw_faces[face_idx] - expected).abs() <= 1e-14);
    }
}
