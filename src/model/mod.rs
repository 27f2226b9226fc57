//! The projection model: one stateful façade binding the dataset, the
//! numeric data `D`, the projection `P`, the view `V = D . P`, the pursuit
//! engine, overlays and decoration state. Every mutating operation validates
//! first, mutates second, and notifies observers once the model is
//! consistent again.

use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;

use crate::classify::{self, Classifier};
use crate::dataset::{AttributeKind, Dataset};
use crate::error::{PursuitError, Result};
use crate::event::{EventBus, ListenerId, ModelEvent};
use crate::history::{Snapshot, UndoOutcome, UndoStack};
use crate::matrix;
use crate::overlay::cluster::{ClusterTree, AUTO_CLUSTER_MAX};
use crate::overlay::graph::RowGraph;
use crate::overlay::separation;
use crate::overlay::series::SeriesSet;
use crate::projection::{PlotTransform, Projection};
use crate::pursuit::{Pursuit, PursuitConfig, StepStatus};

/// Marker radius as a fraction of the plot, before any size attribute
/// scaling. Matches a mid-range position of a 0..1000 size slider.
pub const MARKER_DEFAULT: f64 = 0.01;

/// Fraction of the smaller plot edge kept free around the points.
const PLOT_MARGIN: f64 = 0.05;

/// Which dataset column drives each visual channel. The model only stores
/// the binding and cached bounds; drawing is the renderer's business.
#[derive(Debug, Clone, Default)]
pub struct RetinalBindings {
    size_attribute: Option<String>,
    color_attribute: Option<String>,
    shape_attribute: Option<String>,
    fill_attribute: Option<String>,
    size_bounds: Option<(f64, f64)>,
}

impl RetinalBindings {
    pub fn size_attribute(&self) -> Option<&str> {
        self.size_attribute.as_deref()
    }

    pub fn color_attribute(&self) -> Option<&str> {
        self.color_attribute.as_deref()
    }

    pub fn shape_attribute(&self) -> Option<&str> {
        self.shape_attribute.as_deref()
    }

    pub fn fill_attribute(&self) -> Option<&str> {
        self.fill_attribute.as_deref()
    }

    /// (min, max) of the bound size attribute, cached when it was bound.
    pub fn size_bounds(&self) -> Option<(f64, f64)> {
        self.size_bounds
    }
}

pub struct ProjectionModel {
    dataset: Dataset,
    data: Array2<f64>,
    numeric_names: Vec<String>,
    projection: Projection,
    view: Array2<f64>,
    view_dims: usize,
    target: Option<Array2<f64>>,
    pursuit: Pursuit,
    series: Option<SeriesSet>,
    cluster_tree: Option<ClusterTree>,
    graph: Option<RowGraph>,
    selection: Vec<bool>,
    holdout: Option<Vec<bool>>,
    undo: UndoStack,
    events: EventBus,
    retinal: RetinalBindings,
    marker_size: f64,
    plot_size: Option<(f64, f64)>,
    transform: PlotTransform,
}

impl ProjectionModel {
    /// Builds a model over `dataset` with `view_dims` view dimensions
    /// (scatter plots use 2). The dataset needs at least one numeric or
    /// ordered attribute to project.
    pub fn new(dataset: Dataset, view_dims: usize) -> Result<Self> {
        if view_dims == 0 {
            return Err(PursuitError::DegenerateInput(
                "view needs at least one dimension".to_string(),
            ));
        }
        let mut model = ProjectionModel {
            dataset: Dataset::new(Vec::new())?,
            data: Array2::zeros((0, 0)),
            numeric_names: Vec::new(),
            projection: Projection::identity_linear(0, view_dims),
            view: Array2::zeros((0, view_dims)),
            view_dims,
            target: None,
            pursuit: Pursuit::default(),
            series: None,
            cluster_tree: None,
            graph: None,
            selection: Vec::new(),
            holdout: None,
            undo: UndoStack::new(),
            events: EventBus::new(),
            retinal: RetinalBindings::default(),
            marker_size: MARKER_DEFAULT,
            plot_size: None,
            transform: PlotTransform::identity(),
        };
        model.set_instances(dataset)?;
        Ok(model)
    }

    /// Replaces the dataset and resets everything derived from it: the
    /// projection returns to its initial axis-aligned state, target,
    /// overlays, selection, holdout and history are cleared.
    pub fn set_instances(&mut self, dataset: Dataset) -> Result<()> {
        let data = dataset.numeric_matrix();
        if data.ncols() == 0 {
            return Err(PursuitError::DegenerateInput(
                "dataset has no numeric attributes to project".to_string(),
            ));
        }

        self.numeric_names = dataset
            .numeric_attribute_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        self.projection = Projection::identity_linear(data.ncols(), self.view_dims);
        self.view = self.projection.project_matrix(data.view())?;
        self.selection = vec![false; dataset.rows()];
        self.dataset = dataset;
        self.data = data;
        self.target = None;
        self.pursuit.reset();
        self.series = None;
        self.cluster_tree = None;
        self.graph = None;
        self.holdout = None;
        self.undo.clear();
        self.retinal = RetinalBindings::default();
        self.marker_size = MARKER_DEFAULT;
        self.refit_transform();

        info!(
            "loaded dataset: {} rows, {} numeric of {} attributes",
            self.dataset.rows(),
            self.numeric_names.len(),
            self.dataset.attribute_count()
        );
        self.events.emit(ModelEvent::DataSetChanged);
        Ok(())
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn rows(&self) -> usize {
        self.dataset.rows()
    }

    pub fn view_dims(&self) -> usize {
        self.view_dims
    }

    /// The numeric data matrix `D` the projection applies to.
    pub fn data(&self) -> ArrayView2<f64> {
        self.data.view()
    }

    /// Names of the columns of `D`, in column order.
    pub fn numeric_attribute_names(&self) -> &[String] {
        &self.numeric_names
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// The current view `V = D . P`.
    pub fn view(&self) -> ArrayView2<f64> {
        self.view.view()
    }

    pub fn add_listener(&mut self, listener: impl FnMut(ModelEvent) + 'static) -> ListenerId {
        self.events.subscribe(listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    // ----- projection -----

    /// Replaces the projection with the principal components of `D`.
    pub fn pca(&mut self) -> Result<()> {
        let projection = Projection::pca(self.data.view(), self.view_dims)?;
        self.projection = projection;
        self.after_projection_change()
    }

    pub fn random_projection(&mut self) -> Result<()> {
        self.random_projection_with(&mut rand::rng())
    }

    pub fn random_projection_with<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        self.projection = Projection::random_with(self.data.ncols(), self.view_dims, rng);
        self.after_projection_change()
    }

    /// Installs an externally built projection; its shape must match the
    /// numeric attribute count and view dimensions.
    pub fn set_projection(&mut self, projection: Projection) -> Result<()> {
        let expected = (self.data.ncols(), self.view_dims);
        let found = (projection.attribute_count(), projection.view_dims());
        if expected != found {
            return Err(PursuitError::shape(expected, found));
        }
        self.projection = projection;
        self.after_projection_change()
    }

    fn after_projection_change(&mut self) -> Result<()> {
        self.view = self.projection.project_matrix(self.data.view())?;
        self.pursuit.reset();
        self.refit_transform();
        self.events.emit(ModelEvent::ViewChanged);
        Ok(())
    }

    // ----- target and pursuit -----

    /// Sets the target view the next pursuit will chase. Must have the
    /// shape of the current view.
    pub fn set_target(&mut self, target: Array2<f64>) -> Result<()> {
        matrix::ensure_same_shape(self.view.view(), target.view())?;
        self.target = Some(target);
        self.pursuit.reset();
        Ok(())
    }

    pub fn target(&self) -> Option<ArrayView2<f64>> {
        self.target.as_ref().map(Array2::view)
    }

    pub fn clear_target(&mut self) {
        self.target = None;
        self.pursuit.reset();
    }

    pub fn pursuit_config(&self) -> &PursuitConfig {
        self.pursuit.config()
    }

    pub fn set_pursuit_config(&mut self, config: PursuitConfig) {
        self.pursuit = Pursuit::new(config);
    }

    /// Runs the pursuit to termination against the current target.
    pub fn pursue_target(&mut self) -> Result<StepStatus> {
        let target = match self.target.as_ref() {
            Some(t) => t,
            None => {
                return Err(PursuitError::DegenerateInput(
                    "no target set".to_string(),
                ))
            }
        };
        let status = self.pursuit.run(
            self.data.view(),
            &mut self.projection,
            target.view(),
            self.holdout.as_deref(),
        )?;
        self.after_pursuit()?;
        Ok(status)
    }

    /// One pursuit iteration, for callers animating the projection between
    /// steps. Fires a view change per call.
    pub fn step(&mut self) -> Result<StepStatus> {
        let target = match self.target.as_ref() {
            Some(t) => t,
            None => {
                return Err(PursuitError::DegenerateInput(
                    "no target set".to_string(),
                ))
            }
        };
        let status = self.pursuit.step(
            self.data.view(),
            &mut self.projection,
            target.view(),
            self.holdout.as_deref(),
        )?;
        self.after_pursuit()?;
        Ok(status)
    }

    /// Abandons the current run but keeps the projection wherever the last
    /// step left it.
    pub fn cancel_pursuit(&mut self) {
        self.pursuit.reset();
    }

    fn after_pursuit(&mut self) -> Result<()> {
        // The pursuit mutated P in place; V follows by recomputation
        self.view = self.projection.project_matrix(self.data.view())?;
        self.refit_transform();
        self.events.emit(ModelEvent::ViewChanged);
        Ok(())
    }

    // ----- selection -----

    /// Replaces the selection with the given rows.
    pub fn select_rows(&mut self, rows: &[usize]) -> Result<()> {
        for &row in rows {
            if row >= self.rows() {
                return Err(PursuitError::DegenerateInput(format!(
                    "row {row} out of range for {} rows",
                    self.rows()
                )));
            }
        }
        self.selection.iter_mut().for_each(|s| *s = false);
        for &row in rows {
            self.selection[row] = true;
        }
        self.events.emit(ModelEvent::SelectionChanged);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        if self.selection.iter().any(|&s| s) {
            self.selection.iter_mut().for_each(|s| *s = false);
            self.events.emit(ModelEvent::SelectionChanged);
        }
    }

    pub fn selected_rows(&self) -> Vec<usize> {
        self.selection
            .iter()
            .enumerate()
            .filter(|(_, &s)| s)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn is_selected(&self, row: usize) -> bool {
        self.selection.get(row).copied().unwrap_or(false)
    }

    // ----- series -----

    /// Builds the series overlay from an index attribute and an optional
    /// nominal id attribute (one series per category).
    pub fn create_series(
        &mut self,
        index_attribute: &str,
        id_attribute: Option<&str>,
    ) -> Result<()> {
        let series = SeriesSet::new(&self.dataset, index_attribute, id_attribute)?;
        debug!(
            "series overlay: {} series over '{}'",
            series.len(),
            index_attribute
        );
        self.series = Some(series);
        self.events.emit(ModelEvent::DecorationChanged);
        Ok(())
    }

    pub fn remove_series(&mut self) {
        if self.series.take().is_some() {
            self.events.emit(ModelEvent::DecorationChanged);
        }
    }

    pub fn series(&self) -> Option<&SeriesSet> {
        self.series.as_ref()
    }

    pub fn next_in_series(&self, row: usize) -> Option<usize> {
        self.series.as_ref().and_then(|s| s.next(row))
    }

    pub fn previous_in_series(&self, row: usize) -> Option<usize> {
        self.series.as_ref().and_then(|s| s.previous(row))
    }

    /// Pursues a view in which every series lies along a straight line.
    pub fn pursue_series_smoothing(&mut self) -> Result<StepStatus> {
        let target = match self.series.as_ref() {
            Some(series) => series.smooth_target(self.view.view())?,
            None => {
                return Err(PursuitError::DegenerateInput(
                    "no series defined".to_string(),
                ))
            }
        };
        self.set_target(target)?;
        self.pursue_target()
    }

    /// Pursues a view pulling every point toward its series neighbours.
    pub fn pursue_series_neighbours(&mut self) -> Result<StepStatus> {
        let target = match self.series.as_ref() {
            Some(series) => series.neighbour_mean_target(self.view.view())?,
            None => {
                return Err(PursuitError::DegenerateInput(
                    "no series defined".to_string(),
                ))
            }
        };
        self.set_target(target)?;
        self.pursue_target()
    }

    // ----- clustering -----

    /// Clusters the numeric data into `k` groups (`None` picks a count
    /// automatically) and stores the assignment as a new nominal attribute,
    /// whose name is returned. The underlying tree is built once and reused
    /// across calls until the data changes.
    pub fn cluster(&mut self, k: Option<usize>) -> Result<String> {
        if k == Some(0) {
            return Err(PursuitError::DegenerateInput(
                "cannot cut into zero clusters".to_string(),
            ));
        }
        if self.cluster_tree.is_none() {
            self.cluster_tree = Some(ClusterTree::build(self.data.view())?);
        }
        let tree = match self.cluster_tree.as_ref() {
            Some(t) => t,
            None => {
                return Err(PursuitError::DegenerateInput(
                    "cluster tree unavailable".to_string(),
                ))
            }
        };
        let k = match k {
            Some(k) => k,
            None => tree.auto_k(self.data.view(), AUTO_CLUSTER_MAX),
        };
        let assignment = tree.cut(k);
        let clusters = assignment.iter().copied().max().map_or(0, |m| m as usize + 1);
        let categories = (1..=clusters).map(|i| format!("c{i}")).collect();
        let name = self
            .dataset
            .add_nominal_attribute("cluster", categories, assignment)?;
        info!("clustered {} rows into {clusters} groups as '{name}'", self.rows());
        self.events.emit(ModelEvent::DataStructureChanged);
        Ok(name)
    }

    pub fn cluster_tree(&self) -> Option<&ClusterTree> {
        self.cluster_tree.as_ref()
    }

    // ----- row graph -----

    /// Connects two rows in the graph overlay, creating the graph on first
    /// use.
    pub fn connect_rows(&mut self, a: usize, b: usize) -> Result<()> {
        let rows = self.rows();
        if a >= rows || b >= rows {
            return Err(PursuitError::DegenerateInput(format!(
                "row pair ({a}, {b}) out of range for {rows} rows"
            )));
        }
        let graph = self.graph.get_or_insert_with(|| RowGraph::new(rows));
        graph.connect(a, b)?;
        self.events.emit(ModelEvent::DecorationChanged);
        Ok(())
    }

    /// Rebuilds the graph overlay as one path per series.
    pub fn build_series_graph(&mut self) -> Result<()> {
        let graph = match self.series.as_ref() {
            Some(series) => RowGraph::from_series(self.rows(), series)?,
            None => {
                return Err(PursuitError::DegenerateInput(
                    "no series defined".to_string(),
                ))
            }
        };
        self.graph = Some(graph);
        self.events.emit(ModelEvent::DecorationChanged);
        Ok(())
    }

    pub fn clear_graph(&mut self) {
        if self.graph.take().is_some() {
            self.events.emit(ModelEvent::DecorationChanged);
        }
    }

    pub fn graph(&self) -> Option<&RowGraph> {
        self.graph.as_ref()
    }

    /// Pursues a view pulling every connected row toward its graph
    /// neighbourhood.
    pub fn pursue_graph_smoothing(&mut self) -> Result<StepStatus> {
        let target = match self.graph.as_ref() {
            Some(graph) => graph.neighbour_mean_target(self.view.view())?,
            None => {
                return Err(PursuitError::DegenerateInput(
                    "no graph defined".to_string(),
                ))
            }
        };
        self.set_target(target)?;
        self.pursue_target()
    }

    // ----- separation and colouring -----

    /// Colour weight per numeric attribute for the current selection.
    pub fn axis_colors(&self) -> Array1<f64> {
        separation::axis_colors(self.data.view(), &self.selected_rows())
    }

    /// Pursues a view separating the groups of `class_attribute`.
    pub fn pursue_separation(&mut self, class_attribute: &str) -> Result<StepStatus> {
        let target =
            separation::separation_target(&self.dataset, self.view.view(), class_attribute)?;
        self.set_target(target)?;
        self.pursue_target()
    }

    // ----- test set -----

    /// Draws a random holdout of roughly `fraction` of the rows. Held-out
    /// rows keep riding in the view but no longer steer the pursuit.
    pub fn create_test_set(&mut self, fraction: f64) -> Result<()> {
        self.create_test_set_with(fraction, &mut rand::rng())
    }

    pub fn create_test_set_with<R: Rng>(&mut self, fraction: f64, rng: &mut R) -> Result<()> {
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(PursuitError::DegenerateInput(format!(
                "test fraction {fraction} outside (0, 1)"
            )));
        }
        let rows = self.rows();
        let k = ((rows as f64) * fraction).round() as usize;
        if k == 0 || k >= rows {
            return Err(PursuitError::DegenerateInput(format!(
                "test set of {k} rows out of {rows}"
            )));
        }
        let mut mask = vec![false; rows];
        for i in rand::seq::index::sample(rng, rows, k) {
            mask[i] = true;
        }
        self.holdout = Some(mask);
        info!("held out {k} of {rows} rows as a test set");
        self.events.emit(ModelEvent::DataSetChanged);
        Ok(())
    }

    pub fn remove_test_set(&mut self) {
        if self.holdout.take().is_some() {
            self.events.emit(ModelEvent::DataSetChanged);
        }
    }

    pub fn holdout_mask(&self) -> Option<&[bool]> {
        self.holdout.as_deref()
    }

    pub fn test_rows(&self) -> Vec<usize> {
        match &self.holdout {
            Some(mask) => mask
                .iter()
                .enumerate()
                .filter(|(_, &m)| m)
                .map(|(i, _)| i)
                .collect(),
            None => Vec::new(),
        }
    }

    // ----- classification -----

    /// Cross-validates an external classifier against a nominal class
    /// attribute and stores the results as two new nominal attributes:
    /// the predicted class and a correct/error flag. Returns their names.
    pub fn cross_validate<C: Classifier>(
        &mut self,
        classifier: &mut C,
        class_attribute: &str,
        folds: usize,
    ) -> Result<(String, String)> {
        self.cross_validate_with(classifier, class_attribute, folds, &mut rand::rng())
    }

    pub fn cross_validate_with<C: Classifier, R: Rng>(
        &mut self,
        classifier: &mut C,
        class_attribute: &str,
        folds: usize,
        rng: &mut R,
    ) -> Result<(String, String)> {
        let cv = classify::cross_validate(classifier, &self.dataset, class_attribute, folds, rng)?;
        let class_categories = self.dataset.categories(class_attribute)?.to_vec();
        let predicted_name = self.dataset.add_nominal_attribute(
            &format!("{class_attribute}_predicted"),
            class_categories,
            cv.predicted,
        )?;
        let error_codes: Vec<u32> = cv.errors.iter().map(|&e| u32::from(e)).collect();
        let error_name = self.dataset.add_nominal_attribute(
            &format!("{class_attribute}_error"),
            vec!["correct".to_string(), "error".to_string()],
            error_codes,
        )?;
        info!(
            "cross-validation over '{class_attribute}': accuracy {:.3}",
            cv.accuracy
        );
        self.events.emit(ModelEvent::DataStructureChanged);
        Ok((predicted_name, error_name))
    }

    // ----- destructive edits and undo -----

    /// Removes attributes from the dataset, saving an undo snapshot first.
    /// Numeric removals shrink `D` and drop the matching projection rows,
    /// so the surviving attributes keep their view contributions. Fails
    /// without touching anything if a name is unknown or no numeric
    /// attribute would remain.
    pub fn remove_attributes(&mut self, names: &[&str]) -> Result<()> {
        let mut distinct: Vec<&str> = names.to_vec();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.is_empty() {
            return Ok(());
        }
        let mut removing_numeric = 0;
        for name in &distinct {
            if self.dataset.attribute(name)?.is_numeric() {
                removing_numeric += 1;
            }
        }
        if removing_numeric > 0 && self.numeric_names.len() <= removing_numeric {
            return Err(PursuitError::DegenerateInput(
                "removing every numeric attribute".to_string(),
            ));
        }

        self.push_undo();
        self.dataset.remove_attributes(&distinct)?;

        if removing_numeric > 0 {
            let survivors = self.dataset.numeric_attribute_names();
            let mut kept = Array2::zeros((survivors.len(), self.view_dims));
            for (new_row, name) in survivors.iter().enumerate() {
                if let Some(old_row) = self.numeric_names.iter().position(|n| n == name) {
                    kept.row_mut(new_row)
                        .assign(&self.projection.matrix().row(old_row));
                }
            }
            self.numeric_names = survivors.into_iter().map(str::to_string).collect();
            self.data = self.dataset.numeric_matrix();
            self.projection = Projection::from_matrix(kept);
            self.view = self.projection.project_matrix(self.data.view())?;
            self.cluster_tree = None;
            self.target = None;
            self.pursuit.reset();
            self.refit_transform();
        }
        if let Some(series) = &self.series {
            if names.iter().any(|n| series.uses_attribute(n)) {
                self.series = None;
            }
        }
        self.unbind_missing_retinal();
        self.events.emit(ModelEvent::DataStructureChanged);
        Ok(())
    }

    /// Rescales every numeric attribute to [0, 1], saving an undo snapshot
    /// first. Series survive (the rescale is monotone within each column);
    /// the cluster tree does not, distances change.
    pub fn normalize_unit(&mut self) -> Result<()> {
        self.push_undo();
        self.dataset.normalize_unit();
        self.data = self.dataset.numeric_matrix();
        self.view = self.projection.project_matrix(self.data.view())?;
        self.cluster_tree = None;
        self.recache_size_bounds();
        self.refit_transform();
        self.events.emit(ModelEvent::DataSetChanged);
        Ok(())
    }

    /// Restores the dataset and projection saved by the last destructive
    /// edit. Overlays are rebuilt from scratch by the caller when needed.
    pub fn undo(&mut self) -> Result<UndoOutcome> {
        let snapshot = match self.undo.pop() {
            Some(s) => s,
            None => return Ok(UndoOutcome::NothingToUndo),
        };
        self.dataset = snapshot.dataset;
        self.data = self.dataset.numeric_matrix();
        self.numeric_names = self
            .dataset
            .numeric_attribute_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        self.projection = Projection::from_matrix(snapshot.projection);
        self.view = self.projection.project_matrix(self.data.view())?;
        self.target = None;
        self.pursuit.reset();
        self.series = None;
        self.cluster_tree = None;
        self.graph = None;
        self.unbind_missing_retinal();
        self.recache_size_bounds();
        self.refit_transform();
        self.events.emit(ModelEvent::DataSetChanged);
        Ok(UndoOutcome::Restored)
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    fn push_undo(&mut self) {
        self.undo.push(Snapshot {
            dataset: self.dataset.clone(),
            projection: self.projection.matrix().to_owned(),
        });
    }

    // ----- retinal bindings -----

    /// Binds the marker-size channel to a numeric or ordered attribute and
    /// caches its bounds, or unbinds it with `None`.
    pub fn set_size_attribute(&mut self, name: Option<&str>) -> Result<()> {
        match name {
            Some(n) => {
                let values = self.dataset.numeric_values(n)?;
                let bounds = numeric_bounds(values);
                self.retinal.size_attribute = Some(n.to_string());
                self.retinal.size_bounds = bounds;
            }
            None => {
                self.retinal.size_attribute = None;
                self.retinal.size_bounds = None;
            }
        }
        self.events.emit(ModelEvent::DecorationChanged);
        Ok(())
    }

    /// Binds the colour channel; any attribute kind but string qualifies.
    pub fn set_color_attribute(&mut self, name: Option<&str>) -> Result<()> {
        if let Some(n) = name {
            if self.dataset.kind(n)? == AttributeKind::String {
                return Err(PursuitError::InvalidAttribute {
                    name: n.to_string(),
                    expected: "nominal, numeric or ordered".to_string(),
                });
            }
        }
        self.retinal.color_attribute = name.map(str::to_string);
        self.events.emit(ModelEvent::DecorationChanged);
        Ok(())
    }

    /// Binds the marker-shape channel to a nominal attribute.
    pub fn set_shape_attribute(&mut self, name: Option<&str>) -> Result<()> {
        if let Some(n) = name {
            if self.dataset.kind(n)? != AttributeKind::Nominal {
                return Err(PursuitError::InvalidAttribute {
                    name: n.to_string(),
                    expected: "nominal".to_string(),
                });
            }
        }
        self.retinal.shape_attribute = name.map(str::to_string);
        self.events.emit(ModelEvent::DecorationChanged);
        Ok(())
    }

    /// Binds the marker-fill channel to a nominal attribute. A synthetic
    /// column works too, so cluster labels or cross-validation errors can
    /// fill the markers they describe.
    pub fn set_fill_attribute(&mut self, name: Option<&str>) -> Result<()> {
        if let Some(n) = name {
            if self.dataset.kind(n)? != AttributeKind::Nominal {
                return Err(PursuitError::InvalidAttribute {
                    name: n.to_string(),
                    expected: "nominal".to_string(),
                });
            }
        }
        self.retinal.fill_attribute = name.map(str::to_string);
        self.events.emit(ModelEvent::DecorationChanged);
        Ok(())
    }

    pub fn retinal(&self) -> &RetinalBindings {
        &self.retinal
    }

    /// Sets the marker size from integer slider units (thousandths).
    pub fn set_marker_size_millis(&mut self, millis: u32) {
        self.marker_size = f64::from(millis) / 1000.0;
        self.events.emit(ModelEvent::DecorationChanged);
    }

    pub fn marker_size(&self) -> f64 {
        self.marker_size
    }

    fn unbind_missing_retinal(&mut self) {
        if let Some(n) = &self.retinal.size_attribute {
            if self.dataset.attribute_index(n).is_err() {
                self.retinal.size_attribute = None;
                self.retinal.size_bounds = None;
            }
        }
        if let Some(n) = &self.retinal.color_attribute {
            if self.dataset.attribute_index(n).is_err() {
                self.retinal.color_attribute = None;
            }
        }
        if let Some(n) = &self.retinal.shape_attribute {
            if self.dataset.attribute_index(n).is_err() {
                self.retinal.shape_attribute = None;
            }
        }
        if let Some(n) = &self.retinal.fill_attribute {
            if self.dataset.attribute_index(n).is_err() {
                self.retinal.fill_attribute = None;
            }
        }
    }

    fn recache_size_bounds(&mut self) {
        if let Some(n) = self.retinal.size_attribute.clone() {
            if let Ok(values) = self.dataset.numeric_values(&n) {
                self.retinal.size_bounds = numeric_bounds(values);
            }
        }
    }

    // ----- view helpers -----

    /// Tells the model the plot rectangle so it can keep a screen transform
    /// current across pursuits.
    pub fn resize_plot(&mut self, width: f64, height: f64) -> Result<()> {
        if !(width > 0.0 && height > 0.0) {
            return Err(PursuitError::DegenerateInput(format!(
                "plot size {width}x{height}"
            )));
        }
        self.plot_size = Some((width, height));
        self.refit_transform();
        self.events.emit(ModelEvent::ViewChanged);
        Ok(())
    }

    pub fn transform(&self) -> &PlotTransform {
        &self.transform
    }

    /// Scatters the view by uniform noise, a presentational nudge for
    /// crowded plots. The next projection change recomputes a clean view.
    pub fn jitter(&mut self, amount: f64) -> Result<()> {
        self.jitter_with(amount, &mut rand::rng())
    }

    pub fn jitter_with<R: Rng>(&mut self, amount: f64, rng: &mut R) -> Result<()> {
        if !(amount.is_finite() && amount >= 0.0) {
            return Err(PursuitError::DegenerateInput(format!(
                "jitter amount {amount}"
            )));
        }
        matrix::add_jitter(&mut self.view, amount, rng);
        self.events.emit(ModelEvent::ViewChanged);
        Ok(())
    }

    /// The row whose view position is closest to the given view point,
    /// using the first two view dimensions.
    pub fn nearest_row(&self, x: f64, y: f64) -> Option<usize> {
        nearest_in(self.view.view(), x, y)
    }

    /// The numeric attribute whose axis endpoint (the image of its unit
    /// vector) is closest to the given view point.
    pub fn nearest_axis(&self, x: f64, y: f64) -> Option<&str> {
        nearest_in(self.projection.matrix(), x, y).map(|i| self.numeric_names[i].as_str())
    }

    pub fn row_description(&self, row: usize) -> Option<String> {
        if row >= self.rows() {
            return None;
        }
        Some(self.dataset.row_description(row))
    }

    fn refit_transform(&mut self) {
        if let Some((width, height)) = self.plot_size {
            let margin = PLOT_MARGIN * width.min(height);
            self.transform = PlotTransform::fit(self.view.view(), width, height, margin);
        }
    }
}

fn numeric_bounds(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in values {
        min = min.min(v);
        max = max.max(v);
    }
    Some((min, max))
}

fn nearest_in(points: ArrayView2<f64>, x: f64, y: f64) -> Option<usize> {
    let mut best: Option<(f64, usize)> = None;
    for (i, row) in points.axis_iter(Axis(0)).enumerate() {
        let px = row.get(0).copied().unwrap_or(0.0);
        let py = row.get(1).copied().unwrap_or(0.0);
        let d = (px - x) * (px - x) + (py - y) * (py - y);
        match best {
            Some((bd, _)) if bd <= d => {}
            _ => best = Some((d, i)),
        }
    }
    best.map(|(_, i)| i)
}
