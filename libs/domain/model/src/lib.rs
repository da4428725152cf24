//! Entity types shared by every layer of the interlocking core.
//!
//! Nothing in this crate talks to the store or to I/O: it is the vocabulary
//! the rest of the workspace is written in.

pub mod aspect;
pub mod enum_codec;
pub mod ids;
pub mod lock;
pub mod outcome;
pub mod point_machine;
pub mod route;
pub mod rule;
pub mod signal;
pub mod track;

pub use aspect::{CallingOnAspect, CompositeAspect, LoopAspect, MainAspect};
pub use enum_codec::ParseEnumError;
pub use ids::*;
pub use lock::{LockType, ResourceLock, ResourceType};
pub use outcome::{BlockReason, Outcome};
pub use point_machine::{OperatingStatus, PointMachine, PointPosition};
pub use route::{Direction, RouteAssignment, RouteEvent, RouteEventType, RouteState};
pub use rule::{ControlMode, InterlockingRule, RuleCondition, SignalOverlapDefinition, SignalRuleConfig, TrackCircuitEdge};
pub use signal::{Signal, SignalType};
pub use track::{TrackCircuit, TrackSegment};
