pub mod config;
pub mod distributor;
pub mod events;
pub mod fingerprint;
pub mod health;

pub use config::DistributorConfig;
pub use distributor::{Diagnostics, Distributor};
pub use events::ChangeEvent;
