//! Dense matrix helpers shared by the projection and pursuit code. Everything
//! here works on `ndarray` types; column statistics switch to rayon once the
//! matrix is large enough to pay for the fork.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use num_traits::Float;
use rand::Rng;
use rayon::prelude::*;

use crate::error::{PursuitError, Result};

/// Element count above which matrix traversals run in parallel.
pub(crate) const PARALLEL_THRESHOLD: usize = 16_384;

/// Per-column minimum. Empty input yields an empty vector.
pub fn column_min<F: Float + Send + Sync>(m: ArrayView2<F>) -> Array1<F> {
    column_fold(m, |acc, v| if v < acc { v } else { acc })
}

/// Per-column maximum. Empty input yields an empty vector.
pub fn column_max<F: Float + Send + Sync>(m: ArrayView2<F>) -> Array1<F> {
    column_fold(m, |acc, v| if v > acc { v } else { acc })
}

fn column_fold<F, G>(m: ArrayView2<F>, fold: G) -> Array1<F>
where
    F: Float + Send + Sync,
    G: Fn(F, F) -> F + Send + Sync,
{
    if m.nrows() == 0 || m.ncols() == 0 {
        return Array1::from_vec(Vec::new());
    }
    let reduce_column = |col: ndarray::ArrayView1<F>| {
        let mut acc = col[0];
        for &v in col.iter().skip(1) {
            acc = fold(acc, v);
        }
        acc
    };
    if m.len() >= PARALLEL_THRESHOLD {
        let folded: Vec<F> = m
            .axis_iter(Axis(1))
            .into_par_iter()
            .map(reduce_column)
            .collect();
        Array1::from_vec(folded)
    } else {
        Array1::from_iter(m.axis_iter(Axis(1)).map(reduce_column))
    }
}

/// Mean of each column over the given row subset. An empty subset yields
/// zeros so callers can treat "nothing selected" as a neutral centroid.
pub fn column_mean_rows(m: ArrayView2<f64>, rows: &[usize]) -> Array1<f64> {
    let mut mean = Array1::zeros(m.ncols());
    if rows.is_empty() {
        return mean;
    }
    for &r in rows {
        mean += &m.row(r);
    }
    mean / rows.len() as f64
}

/// Matrix product with an explicit error instead of ndarray's panic when the
/// inner dimensions disagree.
pub fn checked_mul(a: ArrayView2<f64>, b: ArrayView2<f64>) -> Result<Array2<f64>> {
    if a.ncols() != b.nrows() {
        return Err(PursuitError::shape((a.nrows(), a.ncols()), (b.nrows(), b.ncols())));
    }
    Ok(a.dot(&b))
}

pub fn ensure_same_shape(a: ArrayView2<f64>, b: ArrayView2<f64>) -> Result<()> {
    if a.dim() != b.dim() {
        return Err(PursuitError::shape(a.dim(), b.dim()));
    }
    Ok(())
}

/// Mean of squared element-wise differences. Callers guarantee equal shape
/// (see [`ensure_same_shape`]); an empty pair scores 0.
pub fn mean_squared_residual(a: ArrayView2<f64>, b: ArrayView2<f64>) -> f64 {
    let n = a.len();
    if n == 0 {
        return 0.0;
    }
    let mut sum = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let d = x - y;
        sum += d * d;
    }
    sum / n as f64
}

pub fn frobenius_norm_sq(m: ArrayView2<f64>) -> f64 {
    m.iter().map(|v| v * v).sum()
}

/// Rescales in place any column whose L2 norm exceeds `cap`. Keeps a drifting
/// projection well conditioned without touching columns that are already
/// within bounds.
pub fn cap_column_norms(m: &mut Array2<f64>, cap: f64) {
    for mut col in m.axis_iter_mut(Axis(1)) {
        let norm = col.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > cap {
            let scale = cap / norm;
            col.mapv_inplace(|v| v * scale);
        }
    }
}

/// Random matrix whose columns all have unit L2 norm. A column that draws
/// all zeros (vanishingly unlikely, but possible on tiny inputs) is replaced
/// by a basis vector.
pub fn random_unit_columns<R: Rng>(rows: usize, cols: usize, rng: &mut R) -> Array2<f64> {
    let mut m = Array2::zeros((rows, cols));
    for (j, mut col) in m.axis_iter_mut(Axis(1)).enumerate() {
        for v in col.iter_mut() {
            *v = rng.random_range(-1.0..1.0);
        }
        let norm = col.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            col.mapv_inplace(|v| v / norm);
        } else if rows > 0 {
            col[j % rows] = 1.0;
        }
    }
    m
}

/// Adds uniform noise in `(-amount / 2, amount / 2)` to every element.
pub fn add_jitter<R: Rng>(m: &mut Array2<f64>, amount: f64, rng: &mut R) {
    for v in m.iter_mut() {
        *v += (rng.random_range(0.0..1.0) - 0.5) * amount;
    }
}
