//! Error types for the confinement core.

use super::subject::SubjectId;
use thiserror::Error;

/// Errors raised synchronously by the transition protocol and the registry.
///
/// These represent precondition violations, not transient failures: the
/// protocol performs no retries and leaves no partial mutation behind when
/// one of them is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CustodyError {
    #[error("A holding area is required when {action}")]
    AreaRequired { action: &'static str },

    #[error("Subject data is required when {action}")]
    SubjectRequired { action: &'static str },

    #[error("{name} ({id}) is already confined")]
    AlreadyConfined { name: String, id: SubjectId },

    #[error("{operation} may only run on the main context")]
    WrongExecutionContext { operation: &'static str },

    #[error("Cell {cell} in area {area} is missing or occupied")]
    CellUnavailable { area: String, cell: String },

    #[error("No free cell in area {area}")]
    NoFreeCell { area: String },

    #[error("Holding area {name} still holds {count} subject(s)")]
    AreaNotEmpty { name: String, count: usize },

    #[error("Cell {name} is occupied")]
    CellNotEmpty { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display() {
        let err = CustodyError::AreaRequired {
            action: "confining a subject",
        };
        assert!(err.to_string().contains("confining a subject"));
    }

    #[test]
    fn test_already_confined_carries_identity() {
        let id = Uuid::new_v4();
        let err = CustodyError::AlreadyConfined {
            name: "vex".into(),
            id,
        };
        assert!(err.to_string().contains("vex"));
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_wrong_execution_context_names_operation() {
        let err = CustodyError::WrongExecutionContext {
            operation: "releasing a subject",
        };
        assert!(err.to_string().contains("main context"));
    }
}
