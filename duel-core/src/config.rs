use std::time::Duration;

/// Tunables shared by every room of an engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub word_length: usize,
    pub max_attempts: u32,
    pub lock_timeout: Duration,
    /// Also take a row lock on the room while mutating it
    pub exclusive_row_lock: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            word_length: 5,
            max_attempts: 6,
            lock_timeout: Duration::from_millis(3000),
            exclusive_row_lock: false,
        }
    }
}
