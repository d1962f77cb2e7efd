use nalgebra::{Point3, Vector3};
use util::assert_slices_approx_eq;
use varsat::mesh::procedural::{create_box_tet_mesh, create_rectangular_tri_mesh, create_unit_square_tri_mesh};
use varsat::mesh::{partition_by_node_owner, ControlVolumeMesh, DualMesh};

/// Sum of the outward area vectors of every CV face bounding the control volume of each node.
fn closure_defects(mesh: &DualMesh<f64>) -> Vec<f64> {
    let mut sums = vec![Vector3::zeros(); mesh.num_nodes()];
    for f in mesh.interior_cv_faces() {
        let face = mesh.cv_face(f);
        sums[face.back] += face.normal * face.area;
        sums[face.front] -= face.normal * face.area;
    }
    for f in mesh.boundary_cv_faces() {
        let face = mesh.cv_face(f);
        sums[face.back] += face.normal * face.area;
    }
    sums.iter().map(|s| s.norm()).collect()
}

#[test]
fn dual_volumes_sum_to_domain_measure() {
    let tri = DualMesh::from_simplex_mesh(&create_rectangular_tri_mesh::<f64>(2.0, 1.0, 5, 3)).unwrap();
    let area: f64 = (0..tri.num_nodes()).map(|n| tri.cv_volume(n)).sum();
    assert!((area - 2.0).abs() <= 1e-12);

    let tet = DualMesh::from_simplex_mesh(&create_box_tet_mesh::<f64>([1.0, 2.0, 0.5], [2, 3, 2])).unwrap();
    let volume: f64 = (0..tet.num_nodes()).map(|n| tet.cv_volume(n)).sum();
    assert!((volume - 1.0).abs() <= 1e-12);
}

#[test]
fn dual_mesh_counts() {
    let mesh = DualMesh::from_simplex_mesh(&create_unit_square_tri_mesh::<f64>(2)).unwrap();
    assert_eq!(mesh.dim(), 2);
    assert_eq!(mesh.num_nodes(), 9);
    assert_eq!(mesh.num_local_nodes(), 9);
    assert_eq!(mesh.num_elements(), 8);
    // Vertices + faces - edges = 1 for a triangulated disk
    assert_eq!(mesh.num_edges(), 16);
    // One CV face per element edge, two per boundary segment
    assert_eq!(mesh.num_interior_cv_faces(), 24);
    assert_eq!(mesh.num_cv_faces(), 24 + 2 * 8);
}

#[test]
fn interior_normals_point_from_back_to_front() {
    let mesh = DualMesh::<f64>::from_simplex_mesh(&create_box_tet_mesh::<f64>([1.0, 1.0, 1.0], [2, 2, 2])).unwrap();
    for f in mesh.interior_cv_faces() {
        let face = mesh.cv_face(f);
        assert!((face.normal.norm() - 1.0).abs() <= 1e-12);
        let axis = mesh.node_position(face.front) - mesh.node_position(face.back);
        assert!(axis.dot(&face.normal) > 0.0);
        assert!(!face.is_boundary());
        let edge = face.edge.unwrap();
        assert!(mesh.edge_nodes(edge).contains(face.back));
        assert!(mesh.edge_nodes(edge).contains(face.front));
        assert!(mesh.edge_cv_faces(edge).contains(&f));
    }
}

#[test]
fn control_volumes_are_closed() {
    let tri = DualMesh::from_simplex_mesh(&create_rectangular_tri_mesh::<f64>(3.0, 2.0, 6, 4)).unwrap();
    assert!(closure_defects(&tri).iter().all(|&d| d <= 1e-12));

    let tet = DualMesh::from_simplex_mesh(&create_box_tet_mesh::<f64>([1.0, 1.0, 2.0], [2, 2, 3])).unwrap();
    assert!(closure_defects(&tet).iter().all(|&d| d <= 1e-12));
}

#[test]
fn boundary_faces_carry_tags_and_outward_normals() {
    let width = 3.0;
    let height = 2.0;
    let mesh = DualMesh::from_simplex_mesh(&create_rectangular_tri_mesh::<f64>(width, height, 6, 4)).unwrap();

    let mut tag_areas = [0.0; 5];
    for f in mesh.boundary_cv_faces() {
        let face = mesh.cv_face(f);
        let tag = face.boundary_tag.unwrap();
        assert!(face.is_boundary());
        assert_eq!(face.back, face.front);
        assert!(mesh.node_boundary_tags(face.back).contains(&tag));
        tag_areas[tag] += face.area;

        let expected_normal = match tag {
            1 => Vector3::new(0.0, -1.0, 0.0),
            2 => Vector3::new(1.0, 0.0, 0.0),
            3 => Vector3::new(0.0, 1.0, 0.0),
            4 => Vector3::new(-1.0, 0.0, 0.0),
            _ => panic!("unexpected boundary tag {}", tag),
        };
        assert!((face.normal - expected_normal).norm() <= 1e-12);
    }
    assert_slices_approx_eq!(tag_areas, [0.0, width, height, width, height], abstol = 1e-12);

    // The corner at the origin lies on the bottom and the left boundary
    assert_eq!(mesh.node_boundary_tags(0), &[1, 4]);
    // Vertex (1, 1) of the grid
    let interior_node = 8;
    assert!(mesh.node_boundary_tags(interior_node).is_empty());
}

#[test]
fn node_scvs_add_up_to_cv_volume() {
    let mesh = DualMesh::from_simplex_mesh(&create_box_tet_mesh::<f64>([1.0, 1.0, 1.0], [1, 2, 1])).unwrap();
    for node in 0..mesh.num_nodes() {
        let total: f64 = mesh.node_scvs(node).iter().map(|scv| scv.volume).sum();
        assert!((total - mesh.cv_volume(node)).abs() <= 1e-14);
        for scv in mesh.node_scvs(node) {
            assert!(mesh.element_nodes(scv.element).contains(&node));
        }
    }
}

#[test]
fn cell_tags_are_assigned_from_centroids() {
    let mut mesh = create_unit_square_tri_mesh::<f64>(4);
    mesh.tag_cells(|c| if c.y < 0.5 { 2 } else { 1 });
    let dual = DualMesh::from_simplex_mesh(&mesh).unwrap();
    for element in 0..dual.num_elements() {
        let nodes = dual.element_nodes(element);
        let centroid_y: f64 = nodes.iter().map(|&n| dual.node_position(n).y).sum::<f64>() / 3.0;
        let expected = if centroid_y < 0.5 { 2 } else { 1 };
        assert_eq!(dual.element_physical_tag(element), expected);
    }
    assert!(mesh.clone().with_cell_tags(vec![1; 3]).is_err());
}

#[test]
fn untagged_boundary_faces_produce_no_boundary_cv_faces() {
    let mut mesh = create_unit_square_tri_mesh::<f64>(2);
    mesh.tag_boundary_faces(|c| (c.y == 0.0).then(|| 7));
    let dual = DualMesh::from_simplex_mesh(&mesh).unwrap();
    assert_eq!(dual.num_cv_faces() - dual.num_interior_cv_faces(), 4);
    assert!(dual
        .boundary_cv_faces()
        .all(|f| dual.cv_face(f).boundary_tag == Some(7)));
}

#[test]
fn partitions_cover_mesh_and_agree_on_halo() {
    let mesh = create_rectangular_tri_mesh::<f64>(2.0, 1.0, 6, 3);
    let owner: Vec<usize> = mesh
        .vertices()
        .iter()
        .map(|v| if v.x < 1.0 { 0 } else { 1 })
        .collect();
    let partitions = partition_by_node_owner(&mesh, &owner, 2).unwrap();
    assert_eq!(partitions.len(), 2);

    let global = DualMesh::from_simplex_mesh(&mesh).unwrap();
    let total_owned: usize = partitions.iter().map(|p| p.num_local_nodes).sum();
    assert_eq!(total_owned, mesh.vertices().len());

    for partition in &partitions {
        let local = partition.dual_mesh().unwrap();
        assert_eq!(local.num_local_nodes(), partition.num_local_nodes);
        assert_eq!(partition.pattern.num_local(), partition.num_local_nodes);
        assert_eq!(partition.pattern.num_nodes(), partition.global_nodes.len());

        for (local_node, &global_node) in partition.global_nodes.iter().enumerate() {
            assert_eq!(local.node_position(local_node), global.node_position(global_node));
            let owned = local_node < partition.num_local_nodes;
            assert_eq!(owned, owner[global_node] == partition.rank);
            // Every cell touching an owned node is present, so owned control volumes are complete
            if owned {
                assert!((local.cv_volume(local_node) - global.cv_volume(global_node)).abs() <= 1e-14);
                assert_eq!(local.node_boundary_tags(local_node), global.node_boundary_tags(global_node));
            }
        }
    }

    let [p0, p1] = [&partitions[0], &partitions[1]];
    let link01 = p0.pattern.neighbour(1).unwrap();
    let link10 = p1.pattern.neighbour(0).unwrap();
    let sent: Vec<usize> = link01.send_indices.iter().map(|&i| p0.global_nodes[i]).collect();
    let received: Vec<usize> = link10.receive_indices.iter().map(|&i| p1.global_nodes[i]).collect();
    assert_eq!(sent, received);
}

#[test]
fn partitioning_rejects_invalid_owners() {
    let mesh = create_unit_square_tri_mesh::<f64>(2);
    assert!(partition_by_node_owner(&mesh, &[0; 3], 2).is_err());
    assert!(partition_by_node_owner(&mesh, &[2; 9], 2).is_err());
}

#[test]
fn degenerate_cells_are_rejected() {
    use varsat::connectivity::Tri3Connectivity;
    use varsat::mesh::TriangleMesh;
    let vertices = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)];
    let mesh = TriangleMesh::from_vertices_and_connectivity(vertices, vec![Tri3Connectivity([0, 1, 2])]);
    assert!(DualMesh::from_simplex_mesh(&mesh).is_err());
}
