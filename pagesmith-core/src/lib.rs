//! Pagesmith Core - publish build output to a git branch
//!
//! This crate mirrors a set of in-memory build artifacts onto a branch of a
//! remote repository (by default `gh-pages`), committing and pushing only
//! when the published tree actually changes.

pub mod artifact;
pub mod config;
pub mod deploy;
pub mod error;
pub mod git;

pub use artifact::{channel, Artifact, ArtifactCollector, ArtifactSink};
pub use config::{CliOverrides, Config};
pub use deploy::{
    BranchStrategy, DeployOptions, DeployPhase, DeployReport, DeployStatus, Deployer,
};
pub use error::{Error, Result};
pub use git::{GitBackend, GitRepo, RemoteUrl, RepoHandle, RepoOpener};
