//! Deployment orchestration
//!
//! [`Deployer::deploy`] mirrors an artifact set onto a branch of a remote
//! repository in one forward pass:
//!
//! 1. open or clone the working copy
//! 2. resolve the branch (local, remote-tracking or new orphan)
//! 3. pull, when the working copy is a persistent cache
//! 4. clear the tree, write the artifacts, stage everything
//! 5. commit and push only if something changed
//!
//! Every step's failure aborts the rest of the run. A commit that was made
//! before a failed push stays in the working copy.

mod phase;

use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tempfile::TempDir;

use crate::artifact::{self, Artifact};
use crate::git::{
    AddOptions, Author, GitBackend, RemoveOptions, RepoHandle, RepoOpener, StagedChangeSet,
};
use crate::Result;

pub use phase::{DeployPhase, StateMachine};

/// Remote name used when none is configured
pub const DEFAULT_ORIGIN: &str = "origin";

/// Branch deployed to when none is configured
pub const DEFAULT_BRANCH: &str = "gh-pages";

/// Commit message template when none is configured
pub const DEFAULT_MESSAGE: &str = "Update [timestamp]";

/// Placeholder in the message template replaced by the commit time
pub const TIMESTAMP_PLACEHOLDER: &str = "[timestamp]";

/// Where and how to deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOptions {
    /// Repository to publish to
    pub remote_url: String,
    /// Name the remote is registered under in the working copy
    pub origin: String,
    /// Branch receiving the artifacts
    pub branch: String,
    /// Working copy kept between runs; a temporary clone is used when unset
    pub cache_dir: Option<PathBuf>,
    /// Push after committing
    pub push: bool,
    /// Commit message template
    pub message: String,
    /// Stage files matched by ignore rules too
    pub force: bool,
    /// Commit identity override
    pub author: Option<Author>,
}

impl DeployOptions {
    pub fn new(remote_url: impl Into<String>) -> Self {
        Self {
            remote_url: remote_url.into(),
            origin: DEFAULT_ORIGIN.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            cache_dir: None,
            push: true,
            message: DEFAULT_MESSAGE.to_string(),
            force: false,
            author: None,
        }
    }
}

impl From<&str> for DeployOptions {
    fn from(remote_url: &str) -> Self {
        Self::new(remote_url)
    }
}

impl From<String> for DeployOptions {
    fn from(remote_url: String) -> Self {
        Self::new(remote_url)
    }
}

/// `(remote_url, origin)` shorthand
impl From<(&str, &str)> for DeployOptions {
    fn from((remote_url, origin): (&str, &str)) -> Self {
        Self {
            origin: origin.to_string(),
            ..Self::new(remote_url)
        }
    }
}

/// How the target branch was made current
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStrategy {
    /// The branch already existed locally
    Local,
    /// The branch existed on the remote and is now tracked locally
    Tracked,
    /// Neither existed; an orphan branch was started
    Created,
}

/// Outcome of a successful deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStatus {
    /// No artifacts were supplied; nothing was touched
    Empty,
    /// The branch already held exactly these artifacts
    Unchanged,
    /// A new commit was created
    Committed,
}

/// What a deployment did
#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    pub status: DeployStatus,
    pub branch: String,
    pub strategy: Option<BranchStrategy>,
    pub commit: Option<String>,
    pub message: Option<String>,
    pub pushed: bool,
    pub changes: StagedChangeSet,
    pub phases: Vec<DeployPhase>,
}

impl DeployReport {
    fn new(branch: &str) -> Self {
        Self {
            status: DeployStatus::Empty,
            branch: branch.to_string(),
            strategy: None,
            commit: None,
            message: None,
            pushed: false,
            changes: StagedChangeSet::new(),
            phases: Vec::new(),
        }
    }
}

/// Make `branch` the current branch of `repo`
///
/// Branch lists are read fresh on every call. A local branch wins over a
/// remote one, and a remote one over creating a new branch.
pub fn resolve_branch<H: RepoHandle>(
    repo: &mut H,
    origin: &str,
    branch: &str,
) -> Result<BranchStrategy> {
    let local = repo.list_local_branches()?;
    let remote = repo.list_remote_branches(origin)?;

    let strategy = if local.contains(branch) {
        repo.checkout_branch(branch)?;
        BranchStrategy::Local
    } else if remote.contains(&format!("{}/{}", origin, branch)) {
        repo.checkout_branch(branch)?;
        BranchStrategy::Tracked
    } else {
        repo.create_and_checkout_branch(branch)?;
        BranchStrategy::Created
    };

    tracing::info!(branch = %branch, ?strategy, "Branch ready");
    Ok(strategy)
}

/// Render a message template for a commit made at `now`
///
/// The timestamp is RFC 3339 in UTC with millisecond precision.
pub fn commit_message(template: &str, now: DateTime<Utc>) -> String {
    template.replace(
        TIMESTAMP_PLACEHOLDER,
        &now.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

/// Drives one deployment at a time through a [`RepoOpener`]
#[derive(Debug, Clone)]
pub struct Deployer<O: RepoOpener> {
    opener: O,
    options: DeployOptions,
}

impl Deployer<GitBackend> {
    /// Deployer backed by libgit2
    pub fn git(options: DeployOptions) -> Self {
        let backend = GitBackend::new().with_author(options.author.clone());
        Self::new(backend, options)
    }
}

impl<O: RepoOpener> Deployer<O> {
    pub fn new(opener: O, options: DeployOptions) -> Self {
        Self { opener, options }
    }

    pub fn options(&self) -> &DeployOptions {
        &self.options
    }

    /// Publish `artifacts` as the new contents of the target branch
    ///
    /// Blocks until every repository operation has finished. Concurrent runs
    /// against the same cache directory must be serialized by the caller.
    pub fn deploy(&self, artifacts: &[Artifact]) -> Result<DeployReport> {
        let mut phases = StateMachine::deployment();
        let result = self.run(artifacts, &mut phases);

        if let Err(e) = &result {
            tracing::warn!(
                phase = %phases.current_phase(),
                branch = %self.options.branch,
                error = %e,
                "Deployment failed"
            );
        }
        result
    }

    fn run(
        &self,
        artifacts: &[Artifact],
        phases: &mut StateMachine<DeployPhase>,
    ) -> Result<DeployReport> {
        let options = &self.options;
        let mut report = DeployReport::new(&options.branch);

        if artifacts.is_empty() {
            tracing::info!("No files to deploy");
            phases.transition_to(DeployPhase::Done)?;
            report.phases = phases.history().to_vec();
            return Ok(report);
        }

        artifact::validate(artifacts)?;

        let (workdir, _scratch) = self.workdir()?;
        tracing::info!(
            remote = %options.remote_url,
            branch = %options.branch,
            dir = %workdir.display(),
            files = artifacts.len(),
            "Starting deployment"
        );

        let mut repo = self
            .opener
            .open(&options.remote_url, &options.origin, &workdir)?;
        phases.transition_to(DeployPhase::RepoReady)?;

        report.strategy = Some(resolve_branch(&mut repo, &options.origin, &options.branch)?);
        phases.transition_to(DeployPhase::BranchReady)?;

        if options.cache_dir.is_some() {
            repo.pull()?;
        }
        phases.transition_to(DeployPhase::Synced)?;

        repo.remove_files(".", RemoveOptions { recursive: true })?;
        phases.transition_to(DeployPhase::Cleared)?;

        artifact::materialize(artifacts, repo.root())?;
        phases.transition_to(DeployPhase::Materialized)?;

        repo.add_files(".", AddOptions { force: options.force })?;
        report.changes = repo.staged().clone();
        phases.transition_to(DeployPhase::Staged)?;

        if report.changes.is_empty() {
            tracing::info!("No files changed");
            report.status = DeployStatus::Unchanged;
            phases.transition_to(DeployPhase::Skipped)?;
            phases.transition_to(DeployPhase::Done)?;
            report.phases = phases.history().to_vec();
            return Ok(report);
        }

        let message = commit_message(&options.message, Utc::now());
        let commit = repo.commit(&message)?;
        tracing::info!(commit = %commit, files = report.changes.len(), "Committed deployment");
        report.status = DeployStatus::Committed;
        report.commit = Some(commit);
        report.message = Some(message);
        phases.transition_to(DeployPhase::Committed)?;

        if options.push {
            repo.push(&options.origin)?;
            report.pushed = true;
            phases.transition_to(DeployPhase::Pushed)?;
        }

        phases.transition_to(DeployPhase::Done)?;
        report.phases = phases.history().to_vec();
        Ok(report)
    }

    /// Cache directory, or a scratch directory removed when the guard drops
    fn workdir(&self) -> Result<(PathBuf, Option<TempDir>)> {
        match &self.options.cache_dir {
            Some(dir) => Ok((dir.clone(), None)),
            None => {
                let scratch = tempfile::Builder::new().prefix("pagesmith-").tempdir()?;
                Ok((scratch.path().to_path_buf(), Some(scratch)))
            }
        }
    }
}
