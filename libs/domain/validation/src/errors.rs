//! Failure modes of §4.4/§4.5, surfaced only through `Outcome::Blocked`
//! (§7: "validation branches never throw through the service boundary").
//! This enum exists to give each blocking condition a stable name and
//! `rule_id`; callers match on `rule_id()`, not on the variant.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("signal {0} not found")]
    SignalNotFound(String),
    #[error("signal {0} is inactive")]
    SignalInactive(String),
    #[error("point machine {0} not found")]
    PointMachineNotFound(String),
    #[error("invalid transition")]
    InvalidTransition,
    #[error("aspect not in possible_aspects")]
    AspectNotSupported,
    #[error("protected circuit occupied")]
    ProtectedCircuitOccupied,
    #[error("track-circuit protection sources disagree")]
    TrackCircuitProtectionInconsistent,
    #[error("a controlling signal restricts this transition")]
    ControllerRestriction,
    #[error("rule engine unavailable: {0}")]
    RuleEngineUnavailable(String),
    #[error("operating status is not AVAILABLE")]
    OperatingStatusNotAvailable,
    #[error("point machine is locked")]
    PointMachineLocked,
    #[error("time lock active")]
    TimeLockActive,
    #[error("detection-locking circuit occupied")]
    DetectionLockOccupied,
    #[error("a protecting signal is not RED")]
    ProtectingSignalsNotRed,
    #[error("affected track segment occupied")]
    AffectedSegmentOccupied,
    #[error("conflicting point machine is not NORMAL")]
    ConflictingMachineNotNormal,
    #[error("move conflicts with an active or reserved route")]
    RouteConflict,
}

impl ValidationError {
    pub const fn rule_id(&self) -> &'static str {
        match self {
            Self::SignalNotFound(_) => "SIGNAL_NOT_FOUND",
            Self::SignalInactive(_) => "SIGNAL_INACTIVE",
            Self::PointMachineNotFound(_) => "POINT_MACHINE_NOT_FOUND",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::AspectNotSupported => "ASPECT_NOT_SUPPORTED",
            Self::ProtectedCircuitOccupied => "PROTECTED_CIRCUIT_OCCUPIED",
            Self::TrackCircuitProtectionInconsistent => "TRACK_CIRCUIT_PROTECTION_INCONSISTENT",
            Self::ControllerRestriction => "CONTROLLER_RESTRICTION",
            Self::RuleEngineUnavailable(_) => "RULE_ENGINE_UNAVAILABLE",
            Self::OperatingStatusNotAvailable => "OPERATING_STATUS_NOT_AVAILABLE",
            Self::PointMachineLocked => "POINT_MACHINE_LOCKED",
            Self::TimeLockActive => "TIME_LOCK_ACTIVE",
            Self::DetectionLockOccupied => "DETECTION_LOCK_OCCUPIED",
            Self::ProtectingSignalsNotRed => "PROTECTING_SIGNALS_NOT_RED",
            Self::AffectedSegmentOccupied => "AFFECTED_SEGMENT_OCCUPIED",
            Self::ConflictingMachineNotNormal => "CONFLICTING_MACHINE_NOT_NORMAL",
            Self::RouteConflict => "ROUTE_CONFLICT",
        }
    }
}
