//! Linear simplex elements providing the shape functions of the primal mesh.
//!
//! Both elements are affine maps from a reference simplex with vertices in `[-1, 1]^d`.
//! Physical gradients are constant per element and obtained from the inverse transpose of the
//! reference Jacobian.
use crate::Real;
use eyre::eyre;
use nalgebra::{Matrix1x3, Matrix1x4, Matrix2, Matrix2x3, Matrix3, Matrix3x4, Point2, Point3, Vector2, Vector3};
use numeric_literals::replace_float_literals;

/// Shape functions of a linear element, evaluated in physical coordinates.
pub trait LinearElement<T: Real> {
    fn num_nodes(&self) -> usize;

    /// Values of the nodal basis functions at a physical point.
    ///
    /// Fails if the element is degenerate.
    fn basis_values_at(&self, x: &Point3<T>) -> eyre::Result<Vec<T>>;

    /// Physical gradients of the nodal basis functions. Components beyond the element dimension
    /// are zero.
    ///
    /// Fails if the element is degenerate.
    fn physical_gradients(&self) -> eyre::Result<Vec<Vector3<T>>>;
}

fn singular_jacobian() -> eyre::Report {
    eyre!("Singular element Jacobian encountered")
}

/// Linear triangle in two dimensions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Tri3Element<T: Real> {
    vertices: [Point2<T>; 3],
}

impl<T: Real> Tri3Element<T> {
    pub fn from_vertices(vertices: [Point2<T>; 3]) -> Self {
        Self { vertices }
    }

    pub fn vertices(&self) -> &[Point2<T>; 3] {
        &self.vertices
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn reference() -> Self {
        Self::from_vertices([Point2::new(-1.0, -1.0), Point2::new(1.0, -1.0), Point2::new(-1.0, 1.0)])
    }

    #[rustfmt::skip]
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn evaluate_basis(&self, xi: &Point2<T>) -> Matrix1x3<T> {
        Matrix1x3::from_row_slice(&[
            -0.5 * xi.x - 0.5 * xi.y,
            0.5 * xi.x + 0.5,
            0.5 * xi.y + 0.5
        ])
    }

    /// Gradients of the basis functions with respect to reference coordinates.
    #[rustfmt::skip]
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn reference_gradients(&self) -> Matrix2x3<T> {
        Matrix2x3::from_columns(&[
            Vector2::new(-0.5, -0.5),
            Vector2::new(0.5, 0.0),
            Vector2::new(0.0, 0.5)
        ])
    }

    #[allow(non_snake_case)]
    pub fn reference_jacobian(&self) -> Matrix2<T> {
        let X: Matrix2x3<T> = Matrix2x3::from_fn(|i, j| self.vertices[j][i]);
        let G = self.reference_gradients();
        X * G.transpose()
    }

    /// Maps a physical point to reference coordinates.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn map_physical_coords(&self, x: &Point2<T>) -> eyre::Result<Point2<T>> {
        let j_inv = self
            .reference_jacobian()
            .try_inverse()
            .ok_or_else(singular_jacobian)?;
        Ok(Point2::from(j_inv * (x - self.vertices[0]) + Vector2::new(-1.0, -1.0)))
    }
}

impl<T: Real> LinearElement<T> for Tri3Element<T> {
    fn num_nodes(&self) -> usize {
        3
    }

    fn basis_values_at(&self, x: &Point3<T>) -> eyre::Result<Vec<T>> {
        let xi = self.map_physical_coords(&x.xy())?;
        Ok(self.evaluate_basis(&xi).iter().copied().collect())
    }

    fn physical_gradients(&self) -> eyre::Result<Vec<Vector3<T>>> {
        let j_inv_t = self
            .reference_jacobian()
            .try_inverse()
            .ok_or_else(singular_jacobian)?
            .transpose();
        let gradients = j_inv_t * self.reference_gradients();
        Ok(gradients
            .column_iter()
            .map(|g| Vector3::new(g[0], g[1], T::zero()))
            .collect())
    }
}

/// Linear tetrahedron.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Tet4Element<T: Real> {
    vertices: [Point3<T>; 4],
}

impl<T: Real> Tet4Element<T> {
    pub fn from_vertices(vertices: [Point3<T>; 4]) -> Self {
        Self { vertices }
    }

    pub fn vertices(&self) -> &[Point3<T>; 4] {
        &self.vertices
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn reference() -> Self {
        Self::from_vertices([
            Point3::new(-1.0, -1.0, -1.0),
            Point3::new(1.0, -1.0, -1.0),
            Point3::new(-1.0, 1.0, -1.0),
            Point3::new(-1.0, -1.0, 1.0),
        ])
    }

    #[rustfmt::skip]
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn evaluate_basis(&self, xi: &Point3<T>) -> Matrix1x4<T> {
        Matrix1x4::from_row_slice(&[
            -0.5 * xi.x - 0.5 * xi.y - 0.5 * xi.z - 0.5,
            0.5 * xi.x + 0.5,
            0.5 * xi.y + 0.5,
            0.5 * xi.z + 0.5
        ])
    }

    #[rustfmt::skip]
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn reference_gradients(&self) -> Matrix3x4<T> {
        Matrix3x4::from_columns(&[
            Vector3::new(-0.5, -0.5, -0.5),
            Vector3::new(0.5, 0.0, 0.0),
            Vector3::new(0.0, 0.5, 0.0),
            Vector3::new(0.0, 0.0, 0.5)
        ])
    }

    #[allow(non_snake_case)]
    pub fn reference_jacobian(&self) -> Matrix3<T> {
        let X = Matrix3x4::from_fn(|i, j| self.vertices[j][i]);
        let G = self.reference_gradients();
        X * G.transpose()
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn map_physical_coords(&self, x: &Point3<T>) -> eyre::Result<Point3<T>> {
        let j_inv = self
            .reference_jacobian()
            .try_inverse()
            .ok_or_else(singular_jacobian)?;
        Ok(Point3::from(j_inv * (x - self.vertices[0]) + Vector3::new(-1.0, -1.0, -1.0)))
    }
}

impl<T: Real> LinearElement<T> for Tet4Element<T> {
    fn num_nodes(&self) -> usize {
        4
    }

    fn basis_values_at(&self, x: &Point3<T>) -> eyre::Result<Vec<T>> {
        let xi = self.map_physical_coords(x)?;
        Ok(self.evaluate_basis(&xi).iter().copied().collect())
    }

    fn physical_gradients(&self) -> eyre::Result<Vec<Vector3<T>>> {
        let j_inv_t = self
            .reference_jacobian()
            .try_inverse()
            .ok_or_else(singular_jacobian)?
            .transpose();
        let gradients = j_inv_t * self.reference_gradients();
        Ok(gradients.column_iter().map(|g| g.into_owned()).collect())
    }
}

/// Builds the linear element spanned by the given vertices: a triangle in the xy-plane for
/// three vertices, a tetrahedron for four.
pub fn linear_element_from_vertices<T: Real>(vertices: &[Point3<T>]) -> eyre::Result<Box<dyn LinearElement<T>>> {
    match vertices {
        [a, b, c] => Ok(Box::new(Tri3Element::from_vertices([a.xy(), b.xy(), c.xy()]))),
        [a, b, c, d] => Ok(Box::new(Tet4Element::from_vertices([*a, *b, *c, *d]))),
        _ => Err(eyre!("no linear element has {} vertices", vertices.len())),
    }
}
