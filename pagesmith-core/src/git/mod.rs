//! Git operations for pagesmith
//!
//! The deployment orchestrator talks to version control only through the
//! [`RepoHandle`] and [`RepoOpener`] traits. [`GitRepo`] and [`GitBackend`]
//! implement them on top of libgit2.

mod branch;
mod credentials;
mod remote_url;
mod repo;
mod stage;
mod sync;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;

use crate::Result;

pub use repo::{Author, GitBackend, GitRepo};
pub use remote_url::RemoteUrl;

#[cfg(test)]
pub(crate) use repo::tests as fixtures;

/// How a path differs between HEAD and the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StagedStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    TypeChanged,
}

/// Paths staged for the next commit, keyed by repository-relative path
pub type StagedChangeSet = BTreeMap<String, StagedStatus>;

/// Options for [`RepoHandle::remove_files`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveOptions {
    /// Descend into directories
    pub recursive: bool,
}

/// Options for [`RepoHandle::add_files`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AddOptions {
    /// Also stage files matched by ignore rules
    pub force: bool,
}

/// A local working copy of a remote repository
///
/// Every method is a blocking call against the filesystem or the network.
pub trait RepoHandle {
    /// Root directory of the working tree
    fn root(&self) -> &Path;

    /// Names of all local branches
    fn list_local_branches(&self) -> Result<BTreeSet<String>>;

    /// Remote-tracking branches of `origin`, as `"<origin>/<name>"`
    fn list_remote_branches(&self, origin: &str) -> Result<BTreeSet<String>>;

    /// Switch to `name`, creating a local tracking branch if it only exists
    /// on the remote
    fn checkout_branch(&mut self, name: &str) -> Result<()>;

    /// Start a new branch `name` with no history and switch to it
    fn create_and_checkout_branch(&mut self, name: &str) -> Result<()>;

    /// Fast-forward the current branch from its upstream
    fn pull(&mut self) -> Result<()>;

    /// Stage the deletion of everything tracked under `path`
    fn remove_files(&mut self, path: &str, options: RemoveOptions) -> Result<()>;

    /// Stage every change under `path` and return the resulting change set
    fn add_files(&mut self, path: &str, options: AddOptions) -> Result<&StagedChangeSet>;

    /// Change set computed by the last [`RepoHandle::add_files`]
    fn staged(&self) -> &StagedChangeSet;

    /// Commit the staged changes, returning the new commit id
    fn commit(&mut self, message: &str) -> Result<String>;

    /// Push the current branch to `origin`
    fn push(&mut self, origin: &str) -> Result<()>;
}

/// Produces a [`RepoHandle`] for a remote in a given directory
pub trait RepoOpener {
    type Handle: RepoHandle;

    /// Clone `remote_url` into `dir`, or reuse the clone already there
    fn open(&self, remote_url: &str, origin: &str, dir: &Path) -> Result<Self::Handle>;
}

/// Strip the `refs/heads/` prefix git uses for local branches
pub(crate) fn short_branch_name(refname: &str) -> &str {
    refname.strip_prefix("refs/heads/").unwrap_or(refname)
}
