use crate::model::{Day, DocId};
use crate::store::StoreError;

/// Input rejected before anything is sent to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyName,
    EndBeforeStart { start: Day, end: Day },
    NonFiniteAmount(f64),
    NonFinitePrice(f64),
    TooLong(&'static str),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EmptyName => write!(f, "apartment name is empty"),
            ValidationError::EndBeforeStart { start, end } => {
                write!(f, "end day {end} is before start day {start}")
            }
            ValidationError::NonFiniteAmount(v) => write!(f, "amount is not a finite number: {v}"),
            ValidationError::NonFinitePrice(v) => write!(f, "price is not a finite number: {v}"),
            ValidationError::TooLong(field) => write!(f, "{field} too long"),
        }
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    Validation(ValidationError),
    /// The apartment is not in the session's mirror.
    UnknownApartment(DocId),
    /// The store rejected the write. Not retried; the mirror is unchanged.
    Remote(StoreError),
    Closed,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Validation(e) => write!(f, "invalid input: {e}"),
            SessionError::UnknownApartment(id) => write!(f, "unknown apartment: {id}"),
            SessionError::Remote(e) => write!(f, "remote operation failed: {e}"),
            SessionError::Closed => write!(f, "session is closed"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Validation(e) => Some(e),
            SessionError::Remote(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValidationError> for SessionError {
    fn from(e: ValidationError) -> Self {
        SessionError::Validation(e)
    }
}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        SessionError::Remote(e)
    }
}
