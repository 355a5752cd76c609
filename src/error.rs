use uuid::Uuid;

pub type Result<T> = std::result::Result<T, TicketError>;

/// Failures of ticket operations.
///
/// The first three are caller mistakes and are reported back as client
/// errors. `Storage` wraps anything the document store raised.
#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("{0}")]
    Validation(String),

    #[error("Ticket not found: {0}")]
    NotFound(Uuid),

    #[error("{0}")]
    InvalidTransition(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
