//! Staging and committing

use std::fs;
use std::io;
use std::path::{Component, Path};

use git2::{Commit, Delta, ErrorCode, IndexAddOption, Signature};

use super::repo::GitRepo;
use super::{AddOptions, RemoveOptions, StagedChangeSet, StagedStatus};
use crate::{Error, Result};

/// Identity used when neither an author nor a git identity is configured
const FALLBACK_NAME: &str = "pagesmith";
const FALLBACK_EMAIL: &str = "pagesmith@localhost";

impl GitRepo {
    /// Stage the deletion of every tracked file under `path` and clear it from
    /// the working tree
    ///
    /// `"."` addresses the whole tree. The top-level `.git` directory is kept;
    /// nested ones are deleted with the rest of the tree.
    pub fn remove_files(&mut self, path: &str, options: RemoveOptions) -> Result<()> {
        let scope = Scope::parse(path)?;
        let target = scope.resolve(&self.root);

        if target.is_dir() && !options.recursive {
            return Err(Error::Other(format!(
                "not removing '{}' recursively without the recursive option",
                path
            )));
        }

        let mut index = self.repo.index()?;
        let tracked: Vec<String> = index
            .iter()
            .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
            .filter(|entry| scope.contains(entry))
            .collect();

        for entry in &tracked {
            index.remove_path(Path::new(entry))?;
        }
        index.write()?;

        clear_path(&target)?;

        tracing::debug!(path, removed = tracked.len(), "Removed tracked files");
        Ok(())
    }

    /// Stage every change under `path` and recompute the staged change set
    pub fn add_files(&mut self, path: &str, options: AddOptions) -> Result<&StagedChangeSet> {
        let scope = Scope::parse(path)?;
        let pathspec = scope.pathspec();

        let flags = if options.force {
            IndexAddOption::FORCE
        } else {
            IndexAddOption::DEFAULT
        };

        let mut index = self.repo.index()?;
        index.add_all([pathspec], flags, None)?;
        index.update_all([pathspec], None)?;
        index.write()?;

        self.staged = self.diff_head_to_index()?;

        tracing::debug!(path, staged = self.staged.len(), "Staged changes");
        Ok(&self.staged)
    }

    /// Change set computed by the last [`GitRepo::add_files`]
    pub fn staged(&self) -> &StagedChangeSet {
        &self.staged
    }

    fn diff_head_to_index(&self) -> Result<StagedChangeSet> {
        let head_tree = match self.head_commit()? {
            Some(commit) => Some(commit.tree()?),
            None => None,
        };

        let index = self.repo.index()?;
        let diff = self
            .repo
            .diff_tree_to_index(head_tree.as_ref(), Some(&index), None)?;

        let mut staged = StagedChangeSet::new();
        for delta in diff.deltas() {
            let status = match delta.status() {
                Delta::Added | Delta::Copied => StagedStatus::Added,
                Delta::Modified => StagedStatus::Modified,
                Delta::Deleted => StagedStatus::Deleted,
                Delta::Renamed => StagedStatus::Renamed,
                Delta::Typechange => StagedStatus::TypeChanged,
                _ => continue,
            };

            if let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) {
                staged.insert(path.to_string_lossy().replace('\\', "/"), status);
            }
        }

        Ok(staged)
    }

    /// Commit the staged changes on the current branch
    ///
    /// Fails with [`Error::NothingToCommit`] when the last add found no
    /// changes. The first commit of an orphan branch has no parents.
    pub fn commit(&mut self, message: &str) -> Result<String> {
        if self.staged.is_empty() {
            return Err(Error::NothingToCommit);
        }

        let oid = {
            let mut index = self.repo.index()?;
            let tree = self.repo.find_tree(index.write_tree()?)?;
            let signature = self.signature()?;

            let parent = self.head_commit()?;
            let parents: Vec<&Commit<'_>> = parent.iter().collect();

            self.repo
                .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?
        };

        tracing::info!(commit = %oid, files = self.staged.len(), "Created commit");
        self.staged.clear();

        Ok(oid.to_string())
    }

    fn head_commit(&self) -> Result<Option<Commit<'_>>> {
        match self.repo.head() {
            Ok(head) => Ok(Some(head.peel_to_commit()?)),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn signature(&self) -> Result<Signature<'static>> {
        let signature = match &self.author {
            Some(author) => Signature::now(&author.name, &author.email)?,
            None => match self.repo.signature() {
                Ok(signature) => signature,
                Err(_) => Signature::now(FALLBACK_NAME, FALLBACK_EMAIL)?,
            },
        };
        Ok(signature)
    }
}

/// A repository-relative path a staging operation is limited to
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    Everything,
    Under(String),
}

impl Scope {
    fn parse(path: &str) -> Result<Self> {
        let normalized = path.trim().replace('\\', "/");
        let normalized = normalized.trim_start_matches("./").trim_end_matches('/');

        if normalized.is_empty() || normalized == "." {
            return Ok(Self::Everything);
        }

        let escapes = Path::new(normalized)
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(Error::Other(format!(
                "path '{}' is outside the working tree",
                path
            )));
        }

        Ok(Self::Under(normalized.to_string()))
    }

    fn resolve(&self, root: &Path) -> std::path::PathBuf {
        match self {
            Self::Everything => root.to_path_buf(),
            Self::Under(path) => root.join(path),
        }
    }

    fn contains(&self, entry: &str) -> bool {
        match self {
            Self::Everything => true,
            Self::Under(path) => {
                entry == path
                    || entry
                        .strip_prefix(path.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }

    fn pathspec(&self) -> &str {
        match self {
            Self::Everything => "*",
            Self::Under(path) => path,
        }
    }
}

/// Delete `target` from disk, keeping any `.git` directory inside it
fn clear_path(target: &Path) -> io::Result<()> {
    let metadata = match fs::symlink_metadata(target) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    if !metadata.is_dir() {
        return fs::remove_file(target);
    }

    for entry in fs::read_dir(target)? {
        let entry = entry?;
        if entry.file_name() == ".git" {
            continue;
        }

        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }

    Ok(())
}
