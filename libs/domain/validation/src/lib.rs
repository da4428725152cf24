pub mod errors;
pub mod point_machine_branch;
pub mod signal_branch;
pub mod track_circuit_branch;

pub use errors::ValidationError;
pub use point_machine_branch::{validate_paired_operation, validate_position_change};
pub use signal_branch::{validate_main_aspect_change, validate_subsidiary_aspect_change, SubsidiaryKind};
pub use track_circuit_branch::{on_occupancy_transition, EnforcementOutcome};
