//! Opaque string identifiers.
//!
//! The source system keys every entity by an opaque string handed out by the
//! store (no numeric surrogate keys are assumed). Type aliases are used
//! instead of newtypes so call sites read the way the stored-procedure
//! surface they ultimately pass through does.

pub type SignalId = String;
pub type SegmentId = String;
pub type CircuitId = String;
pub type MachineId = String;
pub type RouteId = String;
pub type OperatorId = String;
pub type CorrelationId = String;
