pub mod auth;
pub mod clock;
pub mod days;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod snapshot;
pub mod sql;
pub mod ticker;
pub mod tls;
pub mod wire;
