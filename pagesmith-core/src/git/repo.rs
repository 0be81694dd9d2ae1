//! Working copy lifecycle: clone, reuse and inspection

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use git2::build::RepoBuilder;
use git2::{FetchOptions, Repository};
use serde::{Deserialize, Serialize};

use super::{
    credentials, AddOptions, RemoveOptions, RepoHandle, RepoOpener, StagedChangeSet,
};
use crate::{Error, Result};

/// Identity recorded on deployment commits
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

/// A working copy of a remote repository, driven through libgit2
pub struct GitRepo {
    /// The underlying git2 repository
    pub(super) repo: Repository,
    /// Path to the working tree root
    pub(super) root: PathBuf,
    /// URL the working copy was cloned from
    pub(super) remote_url: String,
    /// Name the remote is registered under
    pub(super) origin: String,
    /// Identity for commits, falls back to git config
    pub(super) author: Option<Author>,
    /// Result of the last add
    pub(super) staged: StagedChangeSet,
}

impl std::fmt::Debug for GitRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepo")
            .field("root", &self.root)
            .field("remote_url", &self.remote_url)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl GitRepo {
    /// Clone `remote_url` into `dir`, or reuse the clone already living there
    ///
    /// A missing or empty `dir` gets a fresh clone with the remote registered
    /// as `origin`. A non-empty `dir` must already be a clone of `remote_url`;
    /// it is fetched but never reinitialized.
    pub fn open_or_clone(remote_url: &str, origin: &str, dir: &Path) -> Result<Self> {
        if dir.exists() && !dir.is_dir() {
            return Err(unavailable(
                remote_url,
                format!("{} is not a directory", dir.display()),
            ));
        }

        if is_empty_dir(dir)? {
            Self::clone_into(remote_url, origin, dir)
        } else {
            Self::reuse(remote_url, origin, dir)
        }
    }

    fn clone_into(remote_url: &str, origin: &str, dir: &Path) -> Result<Self> {
        tracing::info!(url = %remote_url, dir = %dir.display(), "Cloning repository");

        fs::create_dir_all(dir).map_err(|e| {
            unavailable(
                remote_url,
                format!("cannot create {}: {}", dir.display(), e),
            )
        })?;

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(credentials::remote_callbacks());

        let origin_name = origin.to_string();
        let mut builder = RepoBuilder::new();
        builder.fetch_options(fetch_options);
        builder.remote_create(move |repo, _name, url| repo.remote(&origin_name, url));

        let repo = builder
            .clone(remote_url, dir)
            .map_err(|e| unavailable(remote_url, format!("clone failed: {}", e.message())))?;

        Self::from_repository(repo, remote_url, origin)
    }

    fn reuse(remote_url: &str, origin: &str, dir: &Path) -> Result<Self> {
        let repo = Repository::open(dir).map_err(|e| {
            unavailable(
                remote_url,
                format!("{} is not a git repository: {}", dir.display(), e.message()),
            )
        })?;

        {
            let remote = repo.find_remote(origin).map_err(|_| {
                unavailable(
                    remote_url,
                    format!("remote '{}' is not configured in {}", origin, dir.display()),
                )
            })?;

            if remote.url() != Some(remote_url) {
                return Err(unavailable(
                    remote_url,
                    format!(
                        "{} is a clone of {}",
                        dir.display(),
                        remote.url().unwrap_or("<non-utf8 url>")
                    ),
                ));
            }
        }

        let this = Self::from_repository(repo, remote_url, origin)?;

        tracing::info!(dir = %dir.display(), "Reusing cached working copy");
        this.fetch(origin)
            .map_err(|e| unavailable(remote_url, format!("fetch failed: {}", e.message())))?;

        Ok(this)
    }

    fn from_repository(repo: Repository, remote_url: &str, origin: &str) -> Result<Self> {
        let root = repo
            .workdir()
            .ok_or_else(|| unavailable(remote_url, "bare repositories are not supported".into()))?
            .to_path_buf();

        Ok(Self {
            repo,
            root,
            remote_url: remote_url.to_string(),
            origin: origin.to_string(),
            author: None,
            staged: StagedChangeSet::new(),
        })
    }

    /// Record commits under `author` instead of the configured git identity
    pub fn with_author(mut self, author: Option<Author>) -> Self {
        self.author = author;
        self
    }

    /// URL this working copy was cloned from
    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }

    /// Get the current branch name
    ///
    /// Returns the name even while the branch is unborn; `None` means a
    /// detached HEAD.
    pub fn current_branch(&self) -> Result<Option<String>> {
        match self.repo.head() {
            Ok(head) if head.is_branch() => Ok(head.shorthand().map(|s| s.to_string())),
            Ok(_) => Ok(None),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => {
                let head = self.repo.find_reference("HEAD")?;
                Ok(head
                    .symbolic_target()
                    .map(|target| super::short_branch_name(target).to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// URL of `remote` in the repository enclosing `path`
    ///
    /// Used to default the deployment target to the project being built.
    pub fn discover_remote_url(path: impl AsRef<Path>, remote: &str) -> Result<String> {
        let path = path.as_ref();

        let repo = Repository::discover(path).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                Error::Config(format!(
                    "Not a git repository: {}. Pass --remote or set deploy.remote_url.",
                    path.display()
                ))
            } else {
                Error::Other(format!("Git error: {}", e))
            }
        })?;

        let remote = repo.find_remote(remote).map_err(|_| {
            Error::Config(format!(
                "Remote '{}' not configured in {}. Add it with 'git remote add {} <url>'",
                remote,
                path.display(),
                remote
            ))
        })?;

        remote
            .url()
            .map(|url| url.to_string())
            .ok_or_else(|| Error::Config("Remote URL is not valid UTF-8".to_string()))
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Repository {
        &self.repo
    }
}

impl RepoHandle for GitRepo {
    fn root(&self) -> &Path {
        &self.root
    }

    fn list_local_branches(&self) -> Result<BTreeSet<String>> {
        GitRepo::list_local_branches(self)
    }

    fn list_remote_branches(&self, origin: &str) -> Result<BTreeSet<String>> {
        GitRepo::list_remote_branches(self, origin)
    }

    fn checkout_branch(&mut self, name: &str) -> Result<()> {
        GitRepo::checkout_branch(self, name)
    }

    fn create_and_checkout_branch(&mut self, name: &str) -> Result<()> {
        GitRepo::create_and_checkout_branch(self, name)
    }

    fn pull(&mut self) -> Result<()> {
        GitRepo::pull(self)
    }

    fn remove_files(&mut self, path: &str, options: RemoveOptions) -> Result<()> {
        GitRepo::remove_files(self, path, options)
    }

    fn add_files(&mut self, path: &str, options: AddOptions) -> Result<&StagedChangeSet> {
        GitRepo::add_files(self, path, options)
    }

    fn staged(&self) -> &StagedChangeSet {
        GitRepo::staged(self)
    }

    fn commit(&mut self, message: &str) -> Result<String> {
        GitRepo::commit(self, message)
    }

    fn push(&mut self, origin: &str) -> Result<()> {
        GitRepo::push(self, origin)
    }
}

/// [`RepoOpener`] backed by libgit2
#[derive(Debug, Clone, Default)]
pub struct GitBackend {
    author: Option<Author>,
}

impl GitBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit identity for every handle this backend opens
    pub fn with_author(mut self, author: Option<Author>) -> Self {
        self.author = author;
        self
    }
}

impl RepoOpener for GitBackend {
    type Handle = GitRepo;

    fn open(&self, remote_url: &str, origin: &str, dir: &Path) -> Result<GitRepo> {
        Ok(GitRepo::open_or_clone(remote_url, origin, dir)?.with_author(self.author.clone()))
    }
}

fn unavailable(url: &str, reason: String) -> Error {
    Error::RepositoryUnavailable {
        url: url.to_string(),
        reason,
    }
}

fn is_empty_dir(dir: &Path) -> Result<bool> {
    match fs::read_dir(dir) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e.into()),
    }
}
