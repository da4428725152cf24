//! Blocking conditions raised by the route lifecycle manager (§4.7).

use signalbox_model::RouteState;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RouteError {
    #[error("signal {0} not found")]
    SignalNotFound(String),
    #[error("track circuit {0} not found")]
    CircuitNotFound(String),
    #[error("track circuit {0} is occupied")]
    CircuitOccupied(String),
    #[error("circuit {0} overlaps the assigned circuits of an active route")]
    CircuitOverlapsActiveRoute(String),
    #[error("route {0} not found")]
    RouteNotFound(String),
    #[error("route is not in RESERVED state")]
    RouteNotReserved,
    #[error("source signal cannot be cleared: {0}")]
    SourceSignalNotClearable(String),
    #[error("assigned circuit {0} is occupied")]
    AssignedCircuitOccupied(String),
    #[error("source signal cannot be restored to RED: {0}")]
    SourceSignalNotRestorable(String),
    #[error("resource {resource_id} is held by a conflicting lock")]
    ResourceConflict { resource_id: String },
    #[error("unknown lock type, blocking safely")]
    UnknownLockType,
    #[error("deleting a non-terminal route requires force_delete")]
    ForceDeleteRequired,
    #[error("route state machine forbids {from} -> {to}")]
    InvalidStateTransition { from: RouteState, to: RouteState },
}

impl RouteError {
    pub const fn rule_id(&self) -> &'static str {
        match self {
            Self::SignalNotFound(_) => "SIGNAL_NOT_FOUND",
            Self::CircuitNotFound(_) => "CIRCUIT_NOT_FOUND",
            Self::CircuitOccupied(_) => "CIRCUIT_OCCUPIED",
            Self::CircuitOverlapsActiveRoute(_) => "CIRCUIT_OVERLAPS_ACTIVE_ROUTE",
            Self::RouteNotFound(_) => "ROUTE_NOT_FOUND",
            Self::RouteNotReserved => "ROUTE_NOT_RESERVED",
            Self::SourceSignalNotClearable(_) => "SOURCE_SIGNAL_NOT_CLEARABLE",
            Self::AssignedCircuitOccupied(_) => "ASSIGNED_CIRCUIT_OCCUPIED",
            Self::SourceSignalNotRestorable(_) => "SOURCE_SIGNAL_NOT_RESTORABLE",
            Self::ResourceConflict { .. } => "RESOURCE_CONFLICT",
            Self::UnknownLockType => "UNKNOWN_LOCK_TYPE",
            Self::ForceDeleteRequired => "FORCE_DELETE_REQUIRED",
            Self::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
        }
    }
}
