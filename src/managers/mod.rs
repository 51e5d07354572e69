// Managers Module
//
// Long-lived owners of shared engine state.
//
// - SessionRegistry: session lookup, creation, removal and idle/expiry sweeps

pub mod session_registry;

pub use session_registry::{EstimatorFactory, RegistryHealth, SessionRegistry, SweepReport};
