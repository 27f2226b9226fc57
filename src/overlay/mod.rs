//! Overlays interpret the dataset on top of the raw numeric block (ordered
//! series, cluster trees, class structure, row graphs) and turn that
//! structure into target views for the pursuit engine.

pub mod cluster;
pub mod graph;
pub mod separation;
pub mod series;

pub use cluster::{ClusterNode, ClusterTree};
pub use graph::RowGraph;
pub use series::{Series, SeriesSet};
