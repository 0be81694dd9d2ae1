//! Network synchronization: fetch, fast-forward pull and push

use git2::build::CheckoutBuilder;
use git2::{BranchType, ErrorCode, FetchOptions, FetchPrune, PushOptions};

use super::credentials;
use super::repo::GitRepo;
use crate::{Error, Result};

impl GitRepo {
    /// Fetch every branch of `remote_name`, pruning deleted ones
    pub(super) fn fetch(&self, remote_name: &str) -> std::result::Result<(), git2::Error> {
        let mut remote = self.repo.find_remote(remote_name)?;

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(credentials::remote_callbacks());
        fetch_options.prune(FetchPrune::On);

        remote.fetch(&[] as &[&str], Some(&mut fetch_options), None)?;
        tracing::debug!(remote = %remote_name, "Fetched remote");
        Ok(())
    }

    /// Fast-forward the current branch from its upstream
    ///
    /// An unborn branch or a branch without upstream has nothing to pull and
    /// succeeds untouched. Diverged history is never merged.
    pub fn pull(&mut self) -> Result<()> {
        let Some(branch_name) = self.current_branch()? else {
            tracing::debug!("Detached HEAD, nothing to pull");
            return Ok(());
        };

        let sync_failed = |reason: String| Error::SyncFailed {
            branch: branch_name.clone(),
            reason,
        };

        let local = match self.repo.find_branch(&branch_name, BranchType::Local) {
            Ok(branch) => branch,
            Err(e) if e.code() == ErrorCode::NotFound => {
                tracing::debug!(branch = %branch_name, "Unborn branch, nothing to pull");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let remote_name = match self.repo.branch_upstream_remote(
            local.get().name().unwrap_or_default(),
        ) {
            Ok(buf) => buf.as_str().unwrap_or(&self.origin).to_string(),
            Err(e) if e.code() == ErrorCode::NotFound => {
                tracing::debug!(branch = %branch_name, "No upstream configured, nothing to pull");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        self.fetch(&remote_name)
            .map_err(|e| sync_failed(format!("fetch failed: {}", e.message())))?;

        let upstream = match local.upstream() {
            Ok(upstream) => upstream,
            Err(e) if e.code() == ErrorCode::NotFound => {
                tracing::debug!(branch = %branch_name, "Upstream branch is gone, nothing to pull");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let target = self.repo.reference_to_annotated_commit(upstream.get())?;
        let (analysis, _) = self.repo.merge_analysis(&[&target])?;

        if analysis.is_up_to_date() {
            tracing::debug!(branch = %branch_name, "Already up to date");
            return Ok(());
        }

        if !analysis.is_fast_forward() {
            return Err(sync_failed(
                "local and remote history have diverged".to_string(),
            ));
        }

        let target_commit = self.repo.find_commit(target.id())?;
        let mut checkout = CheckoutBuilder::new();
        checkout.safe();
        self.repo
            .checkout_tree(target_commit.as_object(), Some(&mut checkout))
            .map_err(|e| sync_failed(e.message().to_string()))?;

        let mut reference = local.into_reference();
        reference.set_target(
            target.id(),
            &format!("pull: fast-forward to {}", target.id()),
        )?;

        tracing::info!(branch = %branch_name, commit = %target.id(), "Fast-forwarded branch");
        Ok(())
    }

    /// Push the current branch to the branch of the same name on `remote_name`
    ///
    /// A non-fast-forward update is reported as [`Error::PushRejected`] and
    /// never forced. On success the branch's upstream is pointed at the pushed
    /// remote branch.
    pub fn push(&mut self, remote_name: &str) -> Result<()> {
        let branch_name = self
            .current_branch()?
            .ok_or_else(|| Error::Other("Cannot push a detached HEAD".to_string()))?;

        let rejected = |reason: String| Error::PushRejected {
            branch: branch_name.clone(),
            reason,
        };

        let refspec = format!("refs/heads/{0}:refs/heads/{0}", branch_name);
        let mut remote = self.repo.find_remote(remote_name)?;

        let mut refusal: Option<String> = None;
        let result = {
            let mut callbacks = credentials::remote_callbacks();
            callbacks.push_update_reference(|refname, status| {
                if let Some(message) = status {
                    refusal = Some(format!("{}: {}", refname, message));
                }
                Ok(())
            });

            let mut push_options = PushOptions::new();
            push_options.remote_callbacks(callbacks);
            remote.push(&[refspec.as_str()], Some(&mut push_options))
        };

        match result {
            Ok(()) => {}
            Err(e) if e.code() == ErrorCode::NotFastForward => {
                return Err(rejected(e.message().to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(reason) = refusal {
            return Err(rejected(reason));
        }

        let upstream = format!("{}/{}", remote_name, branch_name);
        let mut local = self.repo.find_branch(&branch_name, BranchType::Local)?;
        if let Err(e) = local.set_upstream(Some(&upstream)) {
            tracing::warn!(branch = %branch_name, upstream = %upstream, "Failed to set upstream: {}", e);
        }

        tracing::info!(branch = %branch_name, remote = %remote_name, "Pushed branch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::repo::tests::{bare_remote, commit_to_remote, remote_files};
    use crate::git::{AddOptions, RemoveOptions};
    use std::fs;
    use tempfile::TempDir;

    fn publish(repo: &mut GitRepo, file: &str, contents: &str) -> String {
        repo.remove_files(".", RemoveOptions { recursive: true }).unwrap();
        fs::write(repo.root.join(file), contents).unwrap();
        repo.add_files(".", AddOptions::default()).unwrap();
        repo.commit("test commit").unwrap()
    }

    #[test]
    fn test_pull_without_upstream_is_noop() {
        let (_remote, url) = bare_remote();
        let work = TempDir::new().unwrap();

        let mut repo = GitRepo::open_or_clone(&url, "origin", work.path()).unwrap();
        repo.create_and_checkout_branch("gh-pages").unwrap();
        repo.pull().unwrap();

        publish(&mut repo, "index.html", "A");
        repo.pull().unwrap();
    }

    #[test]
    fn test_pull_fast_forwards() {
        let (_remote, url) = bare_remote();
        commit_to_remote(&url, "gh-pages", &[("index.html", "A".as_bytes())]);
        let work = TempDir::new().unwrap();

        let mut repo = GitRepo::open_or_clone(&url, "origin", work.path()).unwrap();
        repo.checkout_branch("gh-pages").unwrap();

        commit_to_remote(&url, "gh-pages", &[("index.html", "B".as_bytes())]);
        repo.pull().unwrap();

        assert_eq!(fs::read_to_string(work.path().join("index.html")).unwrap(), "B");
    }

    #[test]
    fn test_pull_refuses_diverged_history() {
        let (_remote, url) = bare_remote();
        commit_to_remote(&url, "gh-pages", &[("index.html", "A".as_bytes())]);
        let work = TempDir::new().unwrap();

        let mut repo = GitRepo::open_or_clone(&url, "origin", work.path()).unwrap();
        repo.checkout_branch("gh-pages").unwrap();
        publish(&mut repo, "index.html", "local");

        commit_to_remote(&url, "gh-pages", &[("index.html", "remote".as_bytes())]);
        let err = repo.pull().unwrap_err();
        assert!(matches!(err, Error::SyncFailed { .. }));
        assert_eq!(
            fs::read_to_string(work.path().join("index.html")).unwrap(),
            "local"
        );
    }

    #[test]
    fn test_push_new_branch_sets_upstream() {
        let (_remote, url) = bare_remote();
        let work = TempDir::new().unwrap();

        let mut repo = GitRepo::open_or_clone(&url, "origin", work.path()).unwrap();
        repo.create_and_checkout_branch("gh-pages").unwrap();
        publish(&mut repo, "index.html", "A");
        repo.push("origin").unwrap();

        assert_eq!(
            remote_files(&url, "gh-pages").unwrap(),
            vec![("index.html".to_string(), "A".to_string())]
        );

        let branch = repo.inner().find_branch("gh-pages", BranchType::Local).unwrap();
        assert!(branch.upstream().is_ok());
    }

    #[test]
    fn test_push_non_fast_forward_is_rejected() {
        let (_remote, url) = bare_remote();
        commit_to_remote(&url, "gh-pages", &[("index.html", "A".as_bytes())]);
        let work = TempDir::new().unwrap();

        let mut repo = GitRepo::open_or_clone(&url, "origin", work.path()).unwrap();
        repo.checkout_branch("gh-pages").unwrap();
        commit_to_remote(&url, "gh-pages", &[("index.html", "remote".as_bytes())]);

        let local_commit = publish(&mut repo, "index.html", "local");
        let err = repo.push("origin").unwrap_err();
        assert!(matches!(err, Error::PushRejected { .. }));

        let head = repo.inner().head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.id().to_string(), local_commit);
        assert_eq!(
            remote_files(&url, "gh-pages").unwrap(),
            vec![("index.html".to_string(), "remote".to_string())]
        );
    }
}
