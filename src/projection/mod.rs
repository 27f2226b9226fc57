//! Linear projection state: the attrs x view-dims matrix `P` that maps data
//! rows into view coordinates, plus the screen-space transform a renderer
//! needs to place the result in a window.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use nshare::{IntoNalgebra, IntoNdarray2};
use rand::Rng;

use crate::error::{PursuitError, Result};
use crate::matrix;

/// The projection matrix `P` (numeric attributes x view dimensions). The
/// view is always `V = D . P`; pursuit nudges `P`, never `V` directly.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    matrix: Array2<f64>,
}

impl Projection {
    pub fn from_matrix(matrix: Array2<f64>) -> Self {
        Projection { matrix }
    }

    /// The starting projection: the first `dims` numeric attributes map one
    /// to one onto the view axes, everything else contributes nothing.
    pub fn identity_linear(attrs: usize, dims: usize) -> Self {
        let mut m = Array2::zeros((attrs, dims));
        for d in 0..dims.min(attrs) {
            m[[d, d]] = 1.0;
        }
        Projection { matrix: m }
    }

    /// Principal component projection of `data`: columns are the `dims`
    /// leading eigenvectors of the covariance matrix, in descending
    /// eigenvalue order. When `dims` exceeds the attribute count the extra
    /// view columns stay zero.
    pub fn pca(data: ArrayView2<f64>, dims: usize) -> Result<Self> {
        let (rows, attrs) = data.dim();
        if rows == 0 || attrs == 0 {
            return Err(PursuitError::DegenerateInput(format!(
                "cannot fit principal components to a {rows}x{attrs} matrix"
            )));
        }

        let mean = data
            .mean_axis(Axis(0))
            .ok_or_else(|| PursuitError::DegenerateInput("empty data".to_string()))?;
        let mut centered = data.to_owned();
        for mut row in centered.axis_iter_mut(Axis(0)) {
            row -= &mean;
        }
        let denom = rows.saturating_sub(1).max(1) as f64;
        let cov = centered.t().dot(&centered) / denom;

        let eigen = nalgebra::SymmetricEigen::new(cov.into_nalgebra());
        let mut order: Vec<usize> = (0..attrs).collect();
        order.sort_by(|&a, &b| {
            eigen.eigenvalues[b]
                .partial_cmp(&eigen.eigenvalues[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let vectors = eigen.eigenvectors.into_ndarray2().into_owned();

        let mut m = Array2::zeros((attrs, dims));
        for (d, &idx) in order.iter().take(dims.min(attrs)).enumerate() {
            m.column_mut(d).assign(&vectors.column(idx));
        }
        Ok(Projection { matrix: m })
    }

    /// Random projection with unit-norm view columns.
    pub fn random(attrs: usize, dims: usize) -> Self {
        Self::random_with(attrs, dims, &mut rand::rng())
    }

    pub fn random_with<R: Rng>(attrs: usize, dims: usize, rng: &mut R) -> Self {
        Projection {
            matrix: matrix::random_unit_columns(attrs, dims, rng),
        }
    }

    pub fn attribute_count(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn view_dims(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn matrix(&self) -> ArrayView2<f64> {
        self.matrix.view()
    }

    pub(crate) fn matrix_mut(&mut self) -> &mut Array2<f64> {
        &mut self.matrix
    }

    /// Projects a single data-space point into the view.
    pub fn project(&self, point: ArrayView1<f64>) -> Array1<f64> {
        point.dot(&self.matrix)
    }

    /// `V = D . P` with an explicit shape check.
    pub fn project_matrix(&self, data: ArrayView2<f64>) -> Result<Array2<f64>> {
        matrix::checked_mul(data, self.matrix.view())
    }

    /// Per-attribute contribution to the view: the L2 norm of the
    /// attribute's projection row. Renderers use it to scale and rank axes.
    pub fn significance(&self) -> Array1<f64> {
        Array1::from_iter(
            self.matrix
                .axis_iter(Axis(0))
                .map(|row| row.iter().map(|v| v * v).sum::<f64>().sqrt()),
        )
    }
}

/// Uniform scale + offset that places view coordinates inside a
/// `width` x `height` rectangle with a margin, preserving aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotTransform {
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl PlotTransform {
    pub fn identity() -> Self {
        PlotTransform {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    /// Fits the first two view dimensions into the target rectangle. A view
    /// with no rows, fewer than two dimensions, or zero extent in both
    /// directions yields a transform that centres without scaling.
    pub fn fit(view: ArrayView2<f64>, width: f64, height: f64, margin: f64) -> Self {
        if view.nrows() == 0 || view.ncols() < 2 {
            return PlotTransform {
                scale: 1.0,
                offset_x: width / 2.0,
                offset_y: height / 2.0,
            };
        }
        let min = matrix::column_min(view);
        let max = matrix::column_max(view);
        let extent_x = max[0] - min[0];
        let extent_y = max[1] - min[1];
        let avail_w = (width - 2.0 * margin).max(0.0);
        let avail_h = (height - 2.0 * margin).max(0.0);

        let scale_x = if extent_x > 0.0 { avail_w / extent_x } else { f64::INFINITY };
        let scale_y = if extent_y > 0.0 { avail_h / extent_y } else { f64::INFINITY };
        let scale = match scale_x.min(scale_y) {
            s if s.is_finite() && s > 0.0 => s,
            _ => 1.0,
        };

        let centre_x = (min[0] + max[0]) / 2.0;
        let centre_y = (min[1] + max[1]) / 2.0;
        PlotTransform {
            scale,
            offset_x: width / 2.0 - scale * centre_x,
            offset_y: height / 2.0 - scale * centre_y,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (self.scale * x + self.offset_x, self.scale * y + self.offset_y)
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_identity_linear() {
        let p = Projection::identity_linear(4, 2);
        assert_eq!(p.matrix().dim(), (4, 2));
        assert_relative_eq!(p.matrix()[[0, 0]], 1.0);
        assert_relative_eq!(p.matrix()[[1, 1]], 1.0);
        assert_relative_eq!(p.matrix()[[2, 0]], 0.0);
        assert_relative_eq!(p.matrix()[[3, 1]], 0.0);

        // More view dims than attributes leaves the extras zero
        let wide = Projection::identity_linear(1, 3);
        assert_relative_eq!(wide.matrix()[[0, 0]], 1.0);
        assert_relative_eq!(wide.matrix()[[0, 1]], 0.0);
        assert_relative_eq!(wide.matrix()[[0, 2]], 0.0);
    }

    #[test]
    fn test_pca_finds_dominant_direction() {
        // Points spread along (1, 1) with small off-axis noise
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut rows = Vec::new();
        for _ in 0..200 {
            let t: f64 = rng.random_range(-10.0..10.0);
            let noise: f64 = rng.random_range(-0.1..0.1);
            rows.push([t + noise, t - noise]);
        }
        let data = Array2::from_shape_fn((200, 2), |(i, j)| rows[i][j]);

        let p = Projection::pca(data.view(), 2).unwrap();
        let first = p.matrix().column(0).to_owned();
        let unit = 1.0 / 2.0_f64.sqrt();
        // Sign of an eigenvector is arbitrary
        let alignment = (first[0] * unit + first[1] * unit).abs();
        assert_relative_eq!(alignment, 1.0, epsilon = 1e-2);
    }

    #[test]
    fn test_pca_zero_pads_excess_dims() {
        let data = array![[1.0], [2.0], [3.0]];
        let p = Projection::pca(data.view(), 2).unwrap();
        assert_eq!(p.matrix().dim(), (1, 2));
        assert_relative_eq!(p.matrix()[[0, 0]].abs(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.matrix()[[0, 1]], 0.0);
    }

    #[test]
    fn test_pca_rejects_empty() {
        let empty = Array2::<f64>::zeros((0, 3));
        assert!(Projection::pca(empty.view(), 2).is_err());
        let no_attrs = Array2::<f64>::zeros((3, 0));
        assert!(Projection::pca(no_attrs.view(), 2).is_err());
    }

    #[test]
    fn test_pca_beats_random_on_captured_variance() {
        // Two loud attributes, three near-silent ones. A random projection
        // spends most of its column mass on directions with no spread.
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let data = Array2::from_shape_fn((200, 5), |(_, j)| {
            if j < 2 {
                rng.random_range(-10.0..10.0)
            } else {
                rng.random_range(-0.1..0.1)
            }
        });

        let total_view_variance = |p: &Projection| {
            let view = p.project_matrix(data.view()).unwrap();
            let rows = view.nrows() as f64;
            view.axis_iter(Axis(1))
                .map(|col| {
                    let mean = col.sum() / rows;
                    col.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / rows
                })
                .sum::<f64>()
        };

        let pca = Projection::pca(data.view(), 2).unwrap();
        let random = Projection::random_with(5, 2, &mut ChaCha8Rng::seed_from_u64(22));
        assert!(total_view_variance(&pca) > total_view_variance(&random));
    }

    #[test]
    fn test_project_point_matches_matrix() {
        let data = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let p = Projection::identity_linear(3, 2);
        let view = p.project_matrix(data.view()).unwrap();
        let point = p.project(data.row(0));
        assert_relative_eq!(view[[0, 0]], point[0]);
        assert_relative_eq!(view[[0, 1]], point[1]);
    }

    #[test]
    fn test_project_matrix_shape_mismatch() {
        let p = Projection::identity_linear(3, 2);
        let data = array![[1.0, 2.0]];
        assert!(p.project_matrix(data.view()).is_err());
    }

    #[test]
    fn test_random_is_deterministic_with_seed() {
        let mut a = ChaCha8Rng::seed_from_u64(9);
        let mut b = ChaCha8Rng::seed_from_u64(9);
        let pa = Projection::random_with(5, 2, &mut a);
        let pb = Projection::random_with(5, 2, &mut b);
        assert_eq!(pa, pb);
    }

    #[test]
    fn test_significance() {
        let p = Projection::from_matrix(array![[1.0, 0.0], [0.0, 2.0], [0.0, 0.0]]);
        let s = p.significance();
        assert_relative_eq!(s[0], 1.0);
        assert_relative_eq!(s[1], 2.0);
        assert_relative_eq!(s[2], 0.0);
    }

    #[test]
    fn test_plot_transform_fits_rectangle() {
        let view = array![[0.0, 0.0], [10.0, 5.0]];
        let t = PlotTransform::fit(view.view(), 100.0, 100.0, 10.0);
        assert_relative_eq!(t.scale(), 8.0);
        let (x0, y0) = t.apply(0.0, 0.0);
        let (x1, y1) = t.apply(10.0, 5.0);
        assert_relative_eq!(x0, 10.0);
        assert_relative_eq!(x1, 90.0);
        // Y is centred because X constrains the scale
        assert_relative_eq!(y0, 30.0);
        assert_relative_eq!(y1, 70.0);
    }

    #[test]
    fn test_plot_transform_degenerate_view() {
        let empty = Array2::<f64>::zeros((0, 2));
        let t = PlotTransform::fit(empty.view(), 200.0, 100.0, 5.0);
        assert_relative_eq!(t.scale(), 1.0);
        assert_relative_eq!(t.apply(0.0, 0.0).0, 100.0);

        // Single point: zero extent in both directions
        let point = array![[3.0, 4.0]];
        let t = PlotTransform::fit(point.view(), 100.0, 100.0, 10.0);
        let (x, y) = t.apply(3.0, 4.0);
        assert_relative_eq!(x, 50.0);
        assert_relative_eq!(y, 50.0);
    }
}
