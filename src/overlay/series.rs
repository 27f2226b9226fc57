//! Ordered-series overlay: rows partitioned into sequences by a nominal id
//! attribute and ordered within each sequence by a numeric or ordered index
//! attribute. Series produce the two smoothing targets, a straight-line
//! layout per series and a pull toward sequence neighbours.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, ArrayView2};

use crate::dataset::{AttributeKind, Dataset};
use crate::error::{PursuitError, Result};

/// How far beyond its current first-to-last span a series line is stretched.
/// A little extra keeps neighbouring series from collapsing onto each other.
pub const SERIES_EXPANSION: f64 = 1.2;

#[derive(Debug, Clone)]
pub struct Series {
    label: String,
    rows: Vec<usize>,
}

impl Series {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Row indices in series order (ascending index value).
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The full partition of a dataset into series, with O(1) neighbour lookup.
#[derive(Debug, Clone)]
pub struct SeriesSet {
    index_attribute: String,
    id_attribute: Option<String>,
    series: Vec<Series>,
    // row -> (series, position within series)
    membership: Vec<Option<(usize, usize)>>,
}

impl SeriesSet {
    /// Partitions `dataset` into series. `index_attribute` must be numeric
    /// or ordered; `id_attribute`, when given, must be nominal and yields
    /// one series per category. Without an id every row joins a single
    /// series.
    pub fn new(
        dataset: &Dataset,
        index_attribute: &str,
        id_attribute: Option<&str>,
    ) -> Result<SeriesSet> {
        let index_kind = dataset.kind(index_attribute)?;
        if !matches!(index_kind, AttributeKind::Numeric | AttributeKind::Ordered) {
            return Err(PursuitError::InvalidAttribute {
                name: index_attribute.to_string(),
                expected: "numeric or ordered".to_string(),
            });
        }
        let index_values = dataset.numeric_values(index_attribute)?;

        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        match id_attribute {
            Some(id) => {
                let codes = dataset.nominal_values(id)?;
                let categories = dataset.categories(id)?;
                for (row, &code) in codes.iter().enumerate() {
                    groups
                        .entry(categories[code as usize].clone())
                        .or_default()
                        .push(row);
                }
            }
            None => {
                groups.insert("all".to_string(), (0..dataset.rows()).collect());
            }
        }

        let mut series = Vec::with_capacity(groups.len());
        let mut membership = vec![None; dataset.rows()];
        for (label, mut rows) in groups {
            // Stable sort: rows with equal index values keep dataset order
            rows.sort_by(|&a, &b| index_values[a].total_cmp(&index_values[b]));
            for (pos, &row) in rows.iter().enumerate() {
                membership[row] = Some((series.len(), pos));
            }
            series.push(Series { label, rows });
        }

        Ok(SeriesSet {
            index_attribute: index_attribute.to_string(),
            id_attribute: id_attribute.map(str::to_string),
            series,
            membership,
        })
    }

    pub fn index_attribute(&self) -> &str {
        &self.index_attribute
    }

    pub fn id_attribute(&self) -> Option<&str> {
        self.id_attribute.as_deref()
    }

    pub fn series(&self) -> &[Series] {
        &self.series
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// (series, position) of a row, if it belongs to one.
    pub fn position(&self, row: usize) -> Option<(usize, usize)> {
        self.membership.get(row).copied().flatten()
    }

    /// The row after `row` in its series.
    pub fn next(&self, row: usize) -> Option<usize> {
        let (s, pos) = self.position(row)?;
        self.series[s].rows.get(pos + 1).copied()
    }

    /// The row before `row` in its series.
    pub fn previous(&self, row: usize) -> Option<usize> {
        let (s, pos) = self.position(row)?;
        if pos == 0 {
            return None;
        }
        Some(self.series[s].rows[pos - 1])
    }

    /// True when the overlay was built on the named attribute and must be
    /// discarded if that attribute goes away.
    pub fn uses_attribute(&self, name: &str) -> bool {
        self.index_attribute == name || self.id_attribute.as_deref() == Some(name)
    }

    /// Straight-line target: each series is laid along the line from its
    /// first point toward its last, stretched by [`SERIES_EXPANSION`] and
    /// evenly spaced by series position. Rows outside any series and
    /// single-point series keep their view position.
    pub fn smooth_target(&self, view: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check_rows(view)?;
        let mut target = view.to_owned();
        for series in &self.series {
            let n = series.rows.len();
            if n < 2 {
                continue;
            }
            let first = view.row(series.rows[0]).to_owned();
            let last = view.row(series.rows[n - 1]);
            let direction: Array1<f64> = &last - &first;
            for (pos, &row) in series.rows.iter().enumerate() {
                let span = SERIES_EXPANSION * pos as f64 / n as f64;
                let mut t = target.row_mut(row);
                for d in 0..t.len() {
                    t[d] = first[d] + span * direction[d];
                }
            }
        }
        Ok(target)
    }

    /// Neighbour-pull target: each row moves to the mean of its own view
    /// position and those of its series neighbours. Isolated rows stay put.
    pub fn neighbour_mean_target(&self, view: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check_rows(view)?;
        let mut target = view.to_owned();
        for row in 0..view.nrows() {
            let mut total = view.row(row).to_owned();
            let mut count = 1.0;
            if let Some(prev) = self.previous(row) {
                total += &view.row(prev);
                count += 1.0;
            }
            if let Some(next) = self.next(row) {
                total += &view.row(next);
                count += 1.0;
            }
            target.row_mut(row).assign(&(total / count));
        }
        Ok(target)
    }

    fn check_rows(&self, view: ArrayView2<f64>) -> Result<()> {
        if view.nrows() != self.membership.len() {
            return Err(PursuitError::shape(
                (self.membership.len(), view.ncols()),
                view.dim(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Attribute;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn day_dataset() -> Dataset {
        Dataset::new(vec![
            Attribute::ordered("day", vec![10.0, 30.0, 20.0]),
            Attribute::nominal(
                "subject",
                vec!["a".to_string(), "b".to_string()],
                vec![0, 0, 0],
            )
            .unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_single_series_orders_by_index() {
        let ds = day_dataset();
        let set = SeriesSet::new(&ds, "day", None).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.series()[0].rows(), &[0, 2, 1]);

        assert_eq!(set.next(0), Some(2));
        assert_eq!(set.next(2), Some(1));
        assert_eq!(set.next(1), None);
        assert_eq!(set.previous(0), None);
        assert_eq!(set.previous(2), Some(0));
        assert_eq!(set.previous(1), Some(2));
    }

    #[test]
    fn test_id_attribute_partitions() {
        let ds = Dataset::new(vec![
            Attribute::numeric("t", vec![1.0, 2.0, 1.0, 2.0]),
            Attribute::nominal(
                "who",
                vec!["a".to_string(), "b".to_string()],
                vec![0, 1, 1, 0],
            )
            .unwrap(),
        ])
        .unwrap();
        let set = SeriesSet::new(&ds, "t", Some("who")).unwrap();
        assert_eq!(set.len(), 2);
        // BTreeMap grouping: labels come out sorted
        assert_eq!(set.series()[0].label(), "a");
        assert_eq!(set.series()[0].rows(), &[0, 3]);
        assert_eq!(set.series()[1].rows(), &[2, 1]);

        // Neighbours never cross series
        assert_eq!(set.next(0), Some(3));
        assert_eq!(set.next(3), None);
        assert_eq!(set.previous(2), None);
    }

    #[test]
    fn test_kind_validation() {
        let ds = day_dataset();
        assert!(matches!(
            SeriesSet::new(&ds, "subject", None),
            Err(PursuitError::InvalidAttribute { .. })
        ));
        assert!(matches!(
            SeriesSet::new(&ds, "day", Some("day")),
            Err(PursuitError::InvalidAttribute { .. })
        ));
        assert!(matches!(
            SeriesSet::new(&ds, "missing", None),
            Err(PursuitError::UnknownAttribute(_))
        ));
    }

    #[test]
    fn test_smooth_target_lays_series_on_line() {
        let ds = Dataset::new(vec![Attribute::numeric("t", vec![0.0, 1.0, 2.0])]).unwrap();
        let set = SeriesSet::new(&ds, "t", None).unwrap();

        // Middle point far off the first-to-last line
        let view = array![[0.0, 0.0], [5.0, 5.0], [2.0, 0.0]];
        let target = set.smooth_target(view.view()).unwrap();

        assert_relative_eq!(target[[0, 0]], 0.0);
        assert_relative_eq!(target[[0, 1]], 0.0);
        // Positions 1 and 2 of 3, stretched by 1.2: spans 0.4 and 0.8
        assert_relative_eq!(target[[1, 0]], 0.8);
        assert_relative_eq!(target[[1, 1]], 0.0);
        assert_relative_eq!(target[[2, 0]], 1.6);
        assert_relative_eq!(target[[2, 1]], 0.0);
    }

    #[test]
    fn test_smooth_target_keeps_singletons() {
        let ds = Dataset::new(vec![
            Attribute::numeric("t", vec![0.0, 0.0]),
            Attribute::nominal(
                "who",
                vec!["a".to_string(), "b".to_string()],
                vec![0, 1],
            )
            .unwrap(),
        ])
        .unwrap();
        let set = SeriesSet::new(&ds, "t", Some("who")).unwrap();
        let view = array![[3.0, 4.0], [-1.0, 2.0]];
        let target = set.smooth_target(view.view()).unwrap();
        assert_eq!(target, view);
    }

    #[test]
    fn test_neighbour_mean_target() {
        let ds = Dataset::new(vec![Attribute::numeric("t", vec![0.0, 1.0, 2.0])]).unwrap();
        let set = SeriesSet::new(&ds, "t", None).unwrap();
        let view = array![[0.0, 0.0], [3.0, 0.0], [6.0, 0.0]];
        let target = set.neighbour_mean_target(view.view()).unwrap();

        // Ends average with their single neighbour, the middle with both
        assert_relative_eq!(target[[0, 0]], 1.5);
        assert_relative_eq!(target[[1, 0]], 3.0);
        assert_relative_eq!(target[[2, 0]], 4.5);
    }

    #[test]
    fn test_target_shape_validation() {
        let ds = day_dataset();
        let set = SeriesSet::new(&ds, "day", None).unwrap();
        let short = array![[0.0, 0.0]];
        assert!(set.smooth_target(short.view()).is_err());
        assert!(set.neighbour_mean_target(short.view()).is_err());
    }

    #[test]
    fn test_uses_attribute() {
        let ds = day_dataset();
        let set = SeriesSet::new(&ds, "day", Some("subject")).unwrap();
        assert!(set.uses_attribute("day"));
        assert!(set.uses_attribute("subject"));
        assert!(!set.uses_attribute("other"));
    }
}
