//! CLI command implementations

pub mod deploy;

pub use deploy::DeployArgs;
