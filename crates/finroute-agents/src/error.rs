use thiserror::Error;

/// Failures inside an agent invocation. Never crosses `execute`: every
/// variant is flattened into the result's `errors` list.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("{0}")]
    DataUnavailable(String),

    #[error("{0}")]
    Computation(String),

    #[error("Orchestration error: {0}")]
    Orchestration(String),

    #[error("Data source error: {0}")]
    Data(#[from] finroute_data::DataError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Messages for a result's `errors` list. Validation failures contribute
    /// one entry per missing requirement.
    pub fn into_messages(self) -> Vec<String> {
        match self {
            AgentError::Validation(errors) => errors,
            other => vec![other.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_expands_to_each_message() {
        let err = AgentError::Validation(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "Validation failed: a, b");
        assert_eq!(err.into_messages(), vec!["a", "b"]);
    }

    #[test]
    fn data_unavailable_is_verbatim() {
        let err = AgentError::DataUnavailable("Failed to load data".to_string());
        assert_eq!(err.into_messages(), vec!["Failed to load data"]);
    }
}
