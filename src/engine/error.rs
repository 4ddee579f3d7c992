use super::conflict::Conflict;

/// What a `NotFound` refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    Booking(u64),
    WaitingBatch(u64),
    Reservation(u64),
    Technician(String),
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityRef::Booking(id) => write!(f, "booking {id}"),
            EntityRef::WaitingBatch(id) => write!(f, "waiting batch {id}"),
            EntityRef::Reservation(id) => write!(f, "reservation {id}"),
            EntityRef::Technician(name) => write!(f, "technician {name}"),
        }
    }
}

#[derive(Debug)]
pub enum EngineError {
    UnknownService(String),
    NotFound(EntityRef),
    SchedulingConflict(Conflict),
    InvalidInput(&'static str),
    LimitExceeded(&'static str),
    Store(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::UnknownService(name) => write!(f, "unknown service: {name}"),
            EngineError::NotFound(what) => write!(f, "not found: {what}"),
            EngineError::SchedulingConflict(c) => write!(f, "scheduling conflict: {c}"),
            EngineError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
