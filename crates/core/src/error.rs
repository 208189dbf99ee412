#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A submitted feature record lacks one of the eight schema keys.
    #[error("Missing required feature: {0}")]
    MissingFeature(&'static str),

    /// The serving model is not loaded or otherwise cannot answer.
    #[error("Unavailable: {0}")]
    Unavailable(String),
}
