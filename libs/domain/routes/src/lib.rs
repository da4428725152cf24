pub mod errors;
pub mod lifecycle;
pub mod manager;

pub use errors::RouteError;
pub use lifecycle::{validate_resource_conflict, validate_route_activation, validate_route_partial_release, validate_route_release, validate_route_request};
pub use manager::{acquire_lock, activate_route, create_route, delete_route, fail_route, partial_release_route, release_route};
