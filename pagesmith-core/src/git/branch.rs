//! Branch listing and switching

use std::collections::BTreeSet;

use git2::build::CheckoutBuilder;
use git2::{Branch, BranchType, ErrorCode, Reference};

use super::repo::GitRepo;
use crate::{Error, Result};

impl GitRepo {
    /// List all local branches
    pub fn list_local_branches(&self) -> Result<BTreeSet<String>> {
        self.branch_names(BranchType::Local)
    }

    /// List the remote tracking branches of `remote` as `"<remote>/<name>"`
    ///
    /// The symbolic `<remote>/HEAD` is not a branch and is left out.
    pub fn list_remote_branches(&self, remote: &str) -> Result<BTreeSet<String>> {
        let prefix = format!("{}/", remote);

        Ok(self
            .branch_names(BranchType::Remote)?
            .into_iter()
            .filter(|name| name.starts_with(&prefix) && !name.ends_with("/HEAD"))
            .collect())
    }

    fn branch_names(&self, kind: BranchType) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();

        for branch in self.repo.branches(Some(kind))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name().ok().flatten() {
                names.insert(name.to_string());
            }
        }

        Ok(names)
    }

    /// Switch the working tree to branch `name`
    ///
    /// When `name` only exists as a remote tracking branch, a local branch is
    /// created at the same commit with the remote branch as its upstream.
    /// Local modifications that would be overwritten abort the switch.
    pub fn checkout_branch(&mut self, name: &str) -> Result<()> {
        let branch = match self.repo.find_branch(name, BranchType::Local) {
            Ok(branch) => branch,
            Err(e) if e.code() == ErrorCode::NotFound => self.create_tracking_branch(name)?,
            Err(e) => return Err(e.into()),
        };

        let reference = branch.into_reference();
        let refname = reference
            .name()
            .ok_or_else(|| checkout_failed(name, "branch name is not valid UTF-8".to_string()))?
            .to_string();

        let commit = reference
            .peel_to_commit()
            .map_err(|e| checkout_failed(name, e.message().to_string()))?;

        let mut checkout = CheckoutBuilder::new();
        checkout.safe();
        self.repo
            .checkout_tree(commit.as_object(), Some(&mut checkout))
            .map_err(|e| checkout_failed(name, e.message().to_string()))?;

        self.repo
            .set_head(&refname)
            .map_err(|e| checkout_failed(name, e.message().to_string()))?;

        tracing::info!(branch = %name, commit = %commit.id(), "Checked out branch");
        Ok(())
    }

    fn create_tracking_branch(&self, name: &str) -> Result<Branch<'_>> {
        let upstream = format!("{}/{}", self.origin, name);

        let remote_branch = self
            .repo
            .find_branch(&upstream, BranchType::Remote)
            .map_err(|e| {
                checkout_failed(
                    name,
                    format!("no local branch and no {}: {}", upstream, e.message()),
                )
            })?;

        let commit = remote_branch.get().peel_to_commit()?;
        let mut local = self
            .repo
            .branch(name, &commit, false)
            .map_err(|e| checkout_failed(name, e.message().to_string()))?;
        local.set_upstream(Some(&upstream))?;

        tracing::info!(branch = %name, upstream = %upstream, "Created local tracking branch");
        Ok(local)
    }

    /// Point HEAD at a new branch `name` with no history
    ///
    /// The index and working tree keep whatever the previous branch had; the
    /// first commit records only what is staged by then.
    pub fn create_and_checkout_branch(&mut self, name: &str) -> Result<()> {
        let refname = format!("refs/heads/{}", name);

        if !Reference::is_valid_name(&refname) {
            return Err(checkout_failed(name, "not a valid branch name".to_string()));
        }

        if self.repo.find_reference(&refname).is_ok() {
            return Err(checkout_failed(name, "branch already exists".to_string()));
        }

        self.repo
            .set_head(&refname)
            .map_err(|e| checkout_failed(name, e.message().to_string()))?;

        tracing::info!(branch = %name, "Started orphan branch");
        Ok(())
    }
}

fn checkout_failed(branch: &str, reason: String) -> Error {
    Error::CheckoutFailed {
        branch: branch.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::repo::tests::{bare_remote, commit_to_remote};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_list_branches_after_clone() {
        let (_remote, url) = bare_remote();
        commit_to_remote(&url, "gh-pages", &[("index.html", "A".as_bytes())]);
        let work = TempDir::new().unwrap();

        let repo = GitRepo::open_or_clone(&url, "origin", work.path()).unwrap();

        let local = repo.list_local_branches().unwrap();
        assert!(local.contains("main"));
        assert!(!local.contains("gh-pages"));

        let remote = repo.list_remote_branches("origin").unwrap();
        assert!(remote.contains("origin/main"));
        assert!(remote.contains("origin/gh-pages"));
        assert!(!remote.contains("origin/HEAD"));
        assert!(repo.list_remote_branches("upstream").unwrap().is_empty());
    }

    #[test]
    fn test_checkout_remote_branch_sets_up_tracking() {
        let (_remote, url) = bare_remote();
        commit_to_remote(&url, "gh-pages", &[("index.html", "A".as_bytes())]);
        let work = TempDir::new().unwrap();

        let mut repo = GitRepo::open_or_clone(&url, "origin", work.path()).unwrap();
        repo.checkout_branch("gh-pages").unwrap();

        assert_eq!(repo.current_branch().unwrap().as_deref(), Some("gh-pages"));
        assert_eq!(fs::read_to_string(work.path().join("index.html")).unwrap(), "A");
        assert!(!work.path().join("README.md").exists());

        let branch = repo.inner().find_branch("gh-pages", BranchType::Local).unwrap();
        let upstream = branch.upstream().unwrap();
        assert_eq!(upstream.name().unwrap(), Some("origin/gh-pages"));
    }

    #[test]
    fn test_checkout_unknown_branch_fails() {
        let (_remote, url) = bare_remote();
        let work = TempDir::new().unwrap();

        let mut repo = GitRepo::open_or_clone(&url, "origin", work.path()).unwrap();
        let err = repo.checkout_branch("nope").unwrap_err();
        assert!(matches!(err, Error::CheckoutFailed { .. }));
    }

    #[test]
    fn test_checkout_blocked_by_local_modifications() {
        let (_remote, url) = bare_remote();
        commit_to_remote(&url, "gh-pages", &[("README.md", "pages".as_bytes())]);
        let work = TempDir::new().unwrap();

        let mut repo = GitRepo::open_or_clone(&url, "origin", work.path()).unwrap();
        fs::write(work.path().join("README.md"), "local edit").unwrap();

        let err = repo.checkout_branch("gh-pages").unwrap_err();
        assert!(matches!(err, Error::CheckoutFailed { .. }));
        assert_eq!(repo.current_branch().unwrap().as_deref(), Some("main"));
    }

    #[test]
    fn test_create_orphan_branch() {
        let (_remote, url) = bare_remote();
        let work = TempDir::new().unwrap();

        let mut repo = GitRepo::open_or_clone(&url, "origin", work.path()).unwrap();
        repo.create_and_checkout_branch("gh-pages").unwrap();

        assert_eq!(repo.current_branch().unwrap().as_deref(), Some("gh-pages"));
        assert!(matches!(
            repo.inner().head().map_err(|e| e.code()),
            Err(ErrorCode::UnbornBranch)
        ));
    }

    #[test]
    fn test_create_existing_branch_fails() {
        let (_remote, url) = bare_remote();
        let work = TempDir::new().unwrap();

        let mut repo = GitRepo::open_or_clone(&url, "origin", work.path()).unwrap();
        assert!(repo.create_and_checkout_branch("main").is_err());
        assert!(repo.create_and_checkout_branch("bad..name").is_err());
    }
}
