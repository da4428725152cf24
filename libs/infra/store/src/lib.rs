//! The Store Gateway: a narrow, transactional abstraction over the
//! authoritative relational store (§4.1), a Postgres implementation, and an
//! in-memory double for tests.

pub mod errors;
pub mod gateway;
pub mod memory;
pub mod postgres;
pub mod types;

pub use errors::StoreError;
pub use gateway::StoreGateway;
pub use memory::InMemoryStoreGateway;
pub use postgres::PostgresStoreGateway;
pub use types::{
    NewResourceLock, NewRouteAssignment, NewRouteEvent, Notification, NotificationOperation, PairedUpdateResult, SubsidiaryKind,
};
