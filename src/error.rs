use thiserror::Error;

/// Hard failures surfaced by the crate. Soft outcomes (a pursuit hitting its
/// iteration cap, an undo on an empty stack) are reported through status
/// enums instead, so callers only match on this type when something is
/// actually wrong.
#[derive(Error, Debug)]
pub enum PursuitError {
    #[error("shape mismatch: expected {expected_rows}x{expected_cols}, found {found_rows}x{found_cols}")]
    ShapeMismatch {
        expected_rows: usize,
        expected_cols: usize,
        found_rows: usize,
        found_cols: usize,
    },

    #[error("attribute '{name}' has the wrong kind: expected {expected}")]
    InvalidAttribute { name: String, expected: String },

    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),

    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    #[error("classifier failure: {0}")]
    Classifier(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PursuitError>;

impl PursuitError {
    pub(crate) fn shape(expected: (usize, usize), found: (usize, usize)) -> Self {
        PursuitError::ShapeMismatch {
            expected_rows: expected.0,
            expected_cols: expected.1,
            found_rows: found.0,
            found_cols: found.1,
        }
    }
}
