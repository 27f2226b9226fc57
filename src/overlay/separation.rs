//! Class structure in the view: colour weights for axes derived from the
//! current selection, and a target that pushes class groups apart so a
//! pursuit can search for a separating projection.

use ndarray::{Array1, Array2, ArrayView2};

use crate::dataset::{AttributeKind, Dataset};
use crate::error::{PursuitError, Result};
use crate::matrix;

/// Per-attribute colour weight in [0, 1]: where the selection's mean sits
/// within the attribute's range. An empty selection means "all rows";
/// attributes with no spread sit at the neutral 0.5.
pub fn axis_colors(data: ArrayView2<f64>, selection: &[usize]) -> Array1<f64> {
    let attrs = data.ncols();
    if data.nrows() == 0 {
        return Array1::from_elem(attrs, 0.5);
    }
    let all: Vec<usize>;
    let rows = if selection.is_empty() {
        all = (0..data.nrows()).collect();
        &all
    } else {
        selection
    };
    let mean = matrix::column_mean_rows(data, rows);
    let min = matrix::column_min(data);
    let max = matrix::column_max(data);

    Array1::from_shape_fn(attrs, |j| {
        let range = max[j] - min[j];
        if range > 0.0 {
            ((mean[j] - min[j]) / range).clamp(0.0, 1.0)
        } else {
            0.5
        }
    })
}

/// Target that repels class groups from the view centroid.
///
/// For a nominal class attribute every category is pushed one unit along
/// the direction from the overall view centroid to the category's view
/// mean, so opposing groups move apart. A numeric or ordered attribute
/// pushes each row along a single axis by its signed, range-normalised
/// deviation from the attribute mean; a near-constant attribute produces a
/// vanishing push and leaves the view where it is. String attributes have
/// no class structure to separate.
pub fn separation_target(
    dataset: &Dataset,
    view: ArrayView2<f64>,
    class_attribute: &str,
) -> Result<Array2<f64>> {
    if view.nrows() != dataset.rows() {
        return Err(PursuitError::shape((dataset.rows(), view.ncols()), view.dim()));
    }
    match dataset.kind(class_attribute)? {
        AttributeKind::Nominal => nominal_separation(dataset, view, class_attribute),
        AttributeKind::Numeric | AttributeKind::Ordered => {
            numeric_separation(dataset, view, class_attribute)
        }
        AttributeKind::String => Err(PursuitError::InvalidAttribute {
            name: class_attribute.to_string(),
            expected: "nominal, numeric or ordered".to_string(),
        }),
    }
}

fn nominal_separation(
    dataset: &Dataset,
    view: ArrayView2<f64>,
    class_attribute: &str,
) -> Result<Array2<f64>> {
    let codes = dataset.nominal_values(class_attribute)?;
    let categories = dataset.categories(class_attribute)?.len();
    let all: Vec<usize> = (0..view.nrows()).collect();
    let centroid = matrix::column_mean_rows(view, &all);

    let mut target = view.to_owned();
    for category in 0..categories {
        let members: Vec<usize> = codes
            .iter()
            .enumerate()
            .filter(|(_, &c)| c as usize == category)
            .map(|(row, _)| row)
            .collect();
        if members.is_empty() {
            continue;
        }
        let mean = matrix::column_mean_rows(view, &members);
        let offset = &mean - &centroid;
        let norm = offset.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm == 0.0 {
            continue;
        }
        let push = offset / norm;
        for &row in &members {
            let mut t = target.row_mut(row);
            t += &push;
        }
    }
    Ok(target)
}

fn numeric_separation(
    dataset: &Dataset,
    view: ArrayView2<f64>,
    class_attribute: &str,
) -> Result<Array2<f64>> {
    let values = dataset.numeric_values(class_attribute)?;
    let n = values.len();
    if n == 0 {
        return Ok(view.to_owned());
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let max_dev = values
        .iter()
        .map(|v| (v - mean).abs())
        .fold(0.0f64, f64::max);
    if max_dev == 0.0 {
        return Ok(view.to_owned());
    }

    let all: Vec<usize> = (0..view.nrows()).collect();
    let centroid = matrix::column_mean_rows(view, &all);
    let high: Vec<usize> = (0..n).filter(|&i| values[i] > mean).collect();
    let axis = if high.is_empty() {
        Array1::zeros(view.ncols())
    } else {
        let high_mean = matrix::column_mean_rows(view, &high);
        let offset = &high_mean - &centroid;
        let norm = offset.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            offset / norm
        } else {
            // High-valued rows sit on the centroid; spread along the first
            // view axis instead
            let mut fallback = Array1::zeros(view.ncols());
            if view.ncols() > 0 {
                fallback[0] = 1.0;
            }
            fallback
        }
    };

    let mut target = view.to_owned();
    for row in 0..n {
        let push = (values[row] - mean) / max_dev;
        let mut t = target.row_mut(row);
        for d in 0..t.len() {
            t[d] += push * axis[d];
        }
    }
    Ok(target)
}
