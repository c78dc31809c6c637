use thiserror::Error;

#[derive(Debug, Error)]
pub enum RankingError {
    /// A scheduling precondition was violated; no side effect took place.
    #[error("Validation error: {0}")]
    Validation(String),
}
