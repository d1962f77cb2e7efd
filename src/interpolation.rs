//! Sparse operators mapping nodal quantities onto control volume faces, and face quantities
//! onto edges.
use crate::element::linear_element_from_vertices;
use crate::mesh::ControlVolumeMesh;
use crate::util::prefix_sum;
use crate::Real;
use eyre::{ensure, eyre};
use itertools::Itertools;
use log::debug;
use nalgebra::{Point3, Vector3};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use rayon::prelude::*;
use std::iter::once;

/// Computes `y = A x`, with rows of `A` processed in parallel.
///
/// Each entry of `y` is accumulated in the column order of its row, so the result does not
/// depend on the number of threads.
///
/// # Panics
/// Panics if the dimensions of `x` or `y` do not match the matrix.
pub fn spmv_into<T: Real>(matrix: &CsrMatrix<T>, x: &[T], y: &mut [T]) {
    assert_eq!(x.len(), matrix.ncols(), "input length must match number of matrix columns");
    assert_eq!(y.len(), matrix.nrows(), "output length must match number of matrix rows");
    y.par_iter_mut()
        .enumerate()
        .with_min_len(256)
        .for_each(|(i, y_i)| {
            let row = matrix.row(i);
            *y_i = row
                .col_indices()
                .iter()
                .zip(row.values())
                .fold(T::zero(), |acc, (&j, &a_ij)| acc + a_ij * x[j]);
        });
}

/// Interpolation of nodal values and gradients at the centroids of interior CV faces.
///
/// Each row belongs to an interior CV face and holds the linear shape functions of the element
/// containing the face, so that affine nodal fields are reproduced exactly.
#[derive(Clone, Debug, PartialEq)]
pub struct InterpolationOperator<T> {
    value: CsrMatrix<T>,
    gradient: [CsrMatrix<T>; 3],
}

impl<T: Real> InterpolationOperator<T> {
    /// Assembles the operator for the interior CV faces of a mesh.
    ///
    /// Fails if the element of a face is out of bounds, has no nodes, or is degenerate.
    pub fn build(mesh: &impl ControlVolumeMesh<T>) -> eyre::Result<Self> {
        let num_faces = mesh.num_interior_cv_faces();
        let mut counts = Vec::with_capacity(num_faces);
        let mut column_indices = Vec::new();
        let mut values = Vec::new();
        let mut gradients: [Vec<T>; 3] = Default::default();

        for face_idx in mesh.interior_cv_faces() {
            let face = mesh.cv_face(face_idx);
            ensure!(
                face.element < mesh.num_elements(),
                "CV face {} refers to element {}, but the mesh has {} elements",
                face_idx,
                face.element,
                mesh.num_elements()
            );
            let nodes = mesh.element_nodes(face.element);
            ensure!(
                !nodes.is_empty(),
                "element {} containing CV face {} has no nodes",
                face.element,
                face_idx
            );

            let positions: Vec<Point3<T>> = nodes.iter().map(|&n| mesh.node_position(n)).collect();
            let element = linear_element_from_vertices(&positions)?;
            let basis = element.basis_values_at(&face.centroid)?;
            let basis_gradients = element.physical_gradients()?;

            // Sort by node and merge repeated nodes
            let entries: Vec<(usize, T, Vector3<T>)> = nodes
                .iter()
                .copied()
                .zip(basis)
                .zip(basis_gradients)
                .map(|((n, phi), grad)| (n, phi, grad))
                .sorted_by_key(|&(n, _, _)| n)
                .coalesce(|a, b| {
                    if a.0 == b.0 {
                        Ok((a.0, a.1 + b.1, a.2 + b.2))
                    } else {
                        Err((a, b))
                    }
                })
                .collect();

            counts.push(entries.len());
            for (node, phi, grad) in entries {
                column_indices.push(node);
                values.push(phi);
                for (d, g) in gradients.iter_mut().enumerate() {
                    g.push(grad[d]);
                }
            }
        }

        let offsets = prefix_sum(counts.into_iter().chain(once(0)), 0).collect();
        let pattern = SparsityPattern::try_from_offsets_and_indices(num_faces, mesh.num_nodes(), offsets, column_indices)
            .map_err(|err| eyre!("invalid interpolation sparsity pattern: {}", err))?;
        let to_csr = |values: Vec<T>| {
            CsrMatrix::try_from_pattern_and_values(pattern.clone(), values)
                .map_err(|err| eyre!("invalid interpolation operator: {}", err))
        };
        let [gx, gy, gz] = gradients;
        let operator = Self {
            value: to_csr(values)?,
            gradient: [to_csr(gx)?, to_csr(gy)?, to_csr(gz)?],
        };
        debug!(
            "Built interpolation operator with {} rows and {} non-zeros",
            operator.value.nrows(),
            operator.value.nnz()
        );
        Ok(operator)
    }

    pub fn num_faces(&self) -> usize {
        self.value.nrows()
    }

    pub fn num_nodes(&self) -> usize {
        self.value.ncols()
    }

    /// The operator producing face values.
    pub fn value_operator(&self) -> &CsrMatrix<T> {
        &self.value
    }

    /// The operator producing the given component of face gradients.
    pub fn gradient_operator(&self, component: usize) -> &CsrMatrix<T> {
        &self.gradient[component]
    }

    /// Interpolates nodal values onto faces.
    pub fn interpolate_values(&self, nodal: &[T], faces: &mut [T]) {
        spmv_into(&self.value, nodal, faces);
    }

    /// Interpolates nodal values onto faces and computes their gradient at the faces.
    ///
    /// # Panics
    /// Panics if any buffer has the wrong length.
    pub fn interpolate(&self, nodal: &[T], values: &mut [T], gradient: [&mut [T]; 3]) {
        self.interpolate_values(nodal, values);
        for (operator, component) in self.gradient.iter().zip(gradient) {
            spmv_into(operator, nodal, component);
        }
    }
}

/// Averages face fluxes over the CV faces attached to each edge.
///
/// Row `e` holds `1 / A_e` for every interior CV face of edge `e`, where `A_e` is the total
/// area of those faces. Columns range over all CV faces of the mesh.
#[derive(Clone, Debug, PartialEq)]
pub struct FluxAveragingOperator<T> {
    matrix: CsrMatrix<T>,
}

impl<T: Real> FluxAveragingOperator<T> {
    /// Fails if an edge has no attached face area.
    pub fn build(mesh: &impl ControlVolumeMesh<T>) -> eyre::Result<Self> {
        let num_edges = mesh.num_edges();
        let mut counts = Vec::with_capacity(num_edges);
        let mut column_indices = Vec::new();
        let mut values = Vec::new();

        for edge in 0..num_edges {
            let faces: Vec<usize> = mesh.edge_cv_faces(edge).iter().copied().sorted().dedup().collect();
            let total_area = faces
                .iter()
                .fold(T::zero(), |area, &f| area + mesh.cv_face(f).area);
            ensure!(
                total_area > T::zero(),
                "edge {} has no attached CV face area",
                edge
            );
            let weight = T::one() / total_area;
            counts.push(faces.len());
            values.extend(faces.iter().map(|_| weight));
            column_indices.extend(faces);
        }

        let offsets = prefix_sum(counts.into_iter().chain(once(0)), 0).collect();
        let pattern = SparsityPattern::try_from_offsets_and_indices(num_edges, mesh.num_cv_faces(), offsets, column_indices)
            .map_err(|err| eyre!("invalid flux averaging sparsity pattern: {}", err))?;
        let matrix = CsrMatrix::try_from_pattern_and_values(pattern, values)
            .map_err(|err| eyre!("invalid flux averaging operator: {}", err))?;
        Ok(Self { matrix })
    }

    pub fn matrix(&self) -> &CsrMatrix<T> {
        &self.matrix
    }

    /// Computes the area-averaged flux of every edge from per-face fluxes.
    pub fn apply(&self, face_flux: &[T], edge_flux: &mut [T]) {
        spmv_into(&self.matrix, face_flux, edge_flux);
    }
}
