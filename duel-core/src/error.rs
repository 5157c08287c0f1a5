use duel_types::GameError;

/// Failure of an engine operation.
///
/// `Game` carries the expected, typed outcomes a transport maps to responses.
/// The remaining variants wrap unexpected lower-layer failures unchanged.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Game(#[from] GameError),
    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),
    #[error("dictionary failure: {0:#}")]
    Dictionary(anyhow::Error),
    #[error("lock provider failure: {0:#}")]
    Lock(anyhow::Error),
}

impl EngineError {
    pub fn game(&self) -> Option<&GameError> {
        match self {
            EngineError::Game(err) => Some(err),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Game(err) => err.code(),
            EngineError::Storage(_) => "STORAGE_FAILURE",
            EngineError::Dictionary(_) => "DICTIONARY_FAILURE",
            EngineError::Lock(_) => "LOCK_FAILURE",
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.game().is_some_and(GameError::is_retryable)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
