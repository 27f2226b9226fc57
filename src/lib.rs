pub mod classify;
pub mod dataset;
pub mod error;
pub mod event;
pub mod history;
pub mod model;
pub mod overlay;
pub mod projection;
pub mod pursuit;
mod matrix;

pub use dataset::Dataset;
pub use error::PursuitError;
pub use error::Result;
pub use model::ProjectionModel;
pub use projection::Projection;
pub use pursuit::PursuitConfig;
pub use pursuit::StepStatus;
