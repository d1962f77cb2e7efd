//! Basic procedural mesh generation routines.
//!
//! Generated meshes have every cell tagged with physical tag 1 and carry tagged boundary faces:
//!
//! | tag | rectangle        | box            |
//! |-----|------------------|----------------|
//! | 1   | bottom (y = 0)   | bottom (z = 0) |
//! | 2   | right (x = w)    | x = l_x        |
//! | 3   | top (y = h)      | top (z = l_z)  |
//! | 4   | left (x = 0)     | x = 0          |
//! | 5   |                  | y = 0          |
//! | 6   |                  | y = l_y        |
use crate::connectivity::{Tet4Connectivity, Tri3Connectivity};
use crate::mesh::{TetMesh, TriangleMesh};
use crate::Real;
use nalgebra::Point3;
use numeric_literals::replace_float_literals;

pub fn create_unit_square_tri_mesh<T: Real>(cells_per_dim: usize) -> TriangleMesh<T> {
    create_rectangular_tri_mesh(T::one(), T::one(), cells_per_dim, cells_per_dim)
}

pub fn create_unit_cube_tet_mesh<T: Real>(cells_per_dim: usize) -> TetMesh<T> {
    create_box_tet_mesh([T::one(), T::one(), T::one()], [cells_per_dim; 3])
}

fn to_t<T: Real>(i: usize) -> T {
    T::from_usize(i).expect("Must be able to fit usize in T")
}

/// Generates a uniform triangle mesh of the rectangle `[0, width] x [0, height]`, with each of
/// the `cells_x * cells_y` rectangular cells split into two triangles.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn create_rectangular_tri_mesh<T: Real>(width: T, height: T, cells_x: usize, cells_y: usize) -> TriangleMesh<T> {
    if cells_x == 0 || cells_y == 0 {
        return TriangleMesh::from_vertices_and_connectivity(Vec::new(), Vec::new());
    }

    let dx = width / to_t(cells_x);
    let dy = height / to_t(cells_y);
    let vertex_index = |i: usize, j: usize| (cells_x + 1) * j + i;

    let mut vertices = Vec::with_capacity((cells_x + 1) * (cells_y + 1));
    for j in 0..=cells_y {
        for i in 0..=cells_x {
            vertices.push(Point3::new(to_t::<T>(i) * dx, to_t::<T>(j) * dy, 0.0));
        }
    }

    let mut cells = Vec::with_capacity(2 * cells_x * cells_y);
    for j in 0..cells_y {
        for i in 0..cells_x {
            let v00 = vertex_index(i, j);
            let v10 = vertex_index(i + 1, j);
            let v11 = vertex_index(i + 1, j + 1);
            let v01 = vertex_index(i, j + 1);
            cells.push(Tri3Connectivity([v00, v10, v11]));
            cells.push(Tri3Connectivity([v00, v11, v01]));
        }
    }

    let mut mesh = TriangleMesh::from_vertices_and_connectivity(vertices, cells);
    let tol = 1e-9 * width.max(height);
    mesh.tag_boundary_faces(|c| {
        if c.y.abs() <= tol {
            Some(1)
        } else if (c.x - width).abs() <= tol {
            Some(2)
        } else if (c.y - height).abs() <= tol {
            Some(3)
        } else if c.x.abs() <= tol {
            Some(4)
        } else {
            None
        }
    });
    mesh
}

/// Generates a uniform tetrahedral mesh of the box `[0, l_x] x [0, l_y] x [0, l_z]`.
///
/// Every hexahedral cell is split into six tetrahedra sharing the main diagonal of the cell,
/// which yields a conforming mesh.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn create_box_tet_mesh<T: Real>(extents: [T; 3], cells: [usize; 3]) -> TetMesh<T> {
    let [nx, ny, nz] = cells;
    if nx == 0 || ny == 0 || nz == 0 {
        return TetMesh::from_vertices_and_connectivity(Vec::new(), Vec::new());
    }

    let [lx, ly, lz] = extents;
    let h = [lx / to_t(nx), ly / to_t(ny), lz / to_t(nz)];
    let vertex_index = |i: usize, j: usize, k: usize| ((ny + 1) * k + j) * (nx + 1) + i;

    let mut vertices = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                vertices.push(Point3::new(
                    to_t::<T>(i) * h[0],
                    to_t::<T>(j) * h[1],
                    to_t::<T>(k) * h[2],
                ));
            }
        }
    }

    // Axis orderings, each describing a monotone path from the lowest to the highest corner
    const PATHS: [[usize; 3]; 6] = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];

    let mut connectivity = Vec::with_capacity(6 * nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let corner = |offset: [usize; 3]| vertex_index(i + offset[0], j + offset[1], k + offset[2]);
                for path in PATHS {
                    let mut offset = [0; 3];
                    let mut tet = [0; 4];
                    tet[0] = corner(offset);
                    for (step, &axis) in path.iter().enumerate() {
                        offset[axis] = 1;
                        tet[step + 1] = corner(offset);
                    }
                    connectivity.push(Tet4Connectivity(tet));
                }
            }
        }
    }

    let mut mesh = TetMesh::from_vertices_and_connectivity(vertices, connectivity);
    let tol = 1e-9 * lx.max(ly).max(lz);
    mesh.tag_boundary_faces(|c| {
        if c.z.abs() <= tol {
            Some(1)
        } else if (c.x - lx).abs() <= tol {
            Some(2)
        } else if (c.z - lz).abs() <= tol {
            Some(3)
        } else if c.x.abs() <= tol {
            Some(4)
        } else if c.y.abs() <= tol {
            Some(5)
        } else if (c.y - ly).abs() <= tol {
            Some(6)
        } else {
            None
        }
    });
    mesh
}
