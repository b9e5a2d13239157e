use thiserror::Error;

/// Failures reported by the persistence collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Table not found: {0}")]
    MissingTable(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure recorded on a slot when its fetch or evaluation does not produce a value.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Upstream not ready: {0}")]
    NotReady(String),

    #[error("Fetch worker failed: {0}")]
    Worker(String),
}

impl From<tokio::task::JoinError> for LoadError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            LoadError::Worker("fetch panicked".to_string())
        } else {
            LoadError::Worker("fetch cancelled".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display_passes_through() {
        let err: LoadError = StoreError::MissingTable("category".to_string()).into();
        assert_eq!(err.to_string(), "Table not found: category");
    }

    #[test]
    fn test_not_ready_display() {
        let err = LoadError::NotReady("Data(Category)".to_string());
        assert_eq!(err.to_string(), "Upstream not ready: Data(Category)");
    }
}
