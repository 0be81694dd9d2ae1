//! Remote URL parsing

use std::path::Path;

use crate::{Error, Result};

/// A deployment target as given by the user, normalized to a clone URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    /// URL handed to git
    pub clone_url: String,
    /// Host (e.g., "github.com"); `None` for local repositories
    pub host: Option<String>,
    /// Repository owner/organization, when the URL names one
    pub owner: Option<String>,
    /// Repository name
    pub repo: String,
}

impl RemoteUrl {
    /// Parse a repository URL or shorthand
    ///
    /// Supports:
    /// - `https://github.com/owner/repo` (with or without `.git`)
    /// - `git@github.com:owner/repo.git`
    /// - `ssh://git@host/owner/repo.git` and `file:///path/to/repo`
    /// - `owner/repo` (assumes GitHub)
    /// - absolute or `./`-relative paths to local repositories, and any
    ///   other path that exists on disk
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if input.is_empty() {
            return Err(invalid(input));
        }

        // Local paths win over the shorthand so `./site/repo` is not sent to GitHub
        if input.starts_with('/')
            || input.starts_with("./")
            || input.starts_with("../")
            || Path::new(input).exists()
        {
            return Self::local(input);
        }

        // Handle owner/repo shorthand (assumes GitHub)
        if !input.contains("://") && !input.contains('@') && input.contains('/') {
            let parts: Vec<&str> = input.split('/').collect();
            if parts.len() == 2 && parts.iter().all(|p| !p.is_empty()) {
                let owner = parts[0].to_string();
                let repo = parts[1].trim_end_matches(".git").to_string();
                return Ok(Self {
                    clone_url: format!("https://github.com/{}/{}.git", owner, repo),
                    host: Some("github.com".to_string()),
                    owner: Some(owner),
                    repo,
                });
            }
        }

        // Handle scp-like URLs (e.g., git@github.com:owner/repo.git)
        if !input.contains("://") {
            if let Some((user_host, path)) = input.split_once(':') {
                if let Some((_, host)) = user_host.split_once('@') {
                    let path = path.trim_end_matches(".git");
                    if let Some((owner, repo)) = path.rsplit_once('/') {
                        return Ok(Self {
                            clone_url: input.to_string(),
                            host: Some(host.to_string()),
                            owner: Some(owner.to_string()),
                            repo: repo.to_string(),
                        });
                    }
                }
            }
        }

        let url = url::Url::parse(input).map_err(|_| invalid(input))?;
        match url.scheme() {
            "file" => {
                let path = url.to_file_path().map_err(|_| invalid(input))?;
                let repo = repo_name_of(&path).ok_or_else(|| invalid(input))?;
                Ok(Self {
                    clone_url: input.to_string(),
                    host: None,
                    owner: None,
                    repo,
                })
            }
            "https" | "http" | "ssh" | "git" => {
                let host = url.host_str().ok_or_else(|| invalid(input))?.to_string();
                let path = url.path().trim_start_matches('/').trim_end_matches(".git");
                let (owner, repo) = match path.rsplit_once('/') {
                    Some((owner, repo)) => (Some(owner.to_string()), repo.to_string()),
                    None if !path.is_empty() => (None, path.to_string()),
                    None => return Err(invalid(input)),
                };

                let clone_url = if url.scheme().starts_with("http") && !input.ends_with(".git") {
                    format!("{}.git", input.trim_end_matches('/'))
                } else {
                    input.to_string()
                };

                Ok(Self {
                    clone_url,
                    host: Some(host),
                    owner,
                    repo,
                })
            }
            _ => Err(invalid(input)),
        }
    }

    fn local(input: &str) -> Result<Self> {
        let repo = repo_name_of(Path::new(input)).ok_or_else(|| invalid(input))?;
        Ok(Self {
            clone_url: input.to_string(),
            host: None,
            owner: None,
            repo,
        })
    }

    /// Public URL the branch is served at, for GitHub remotes
    ///
    /// `owner.github.io` repositories are served from the domain root.
    pub fn pages_url(&self) -> Option<String> {
        if self.host.as_deref() != Some("github.com") {
            return None;
        }

        let owner = self.owner.as_deref()?.to_lowercase();
        if self.repo.to_lowercase() == format!("{}.github.io", owner) {
            Some(format!("https://{}.github.io/", owner))
        } else {
            Some(format!("https://{}.github.io/{}/", owner, self.repo))
        }
    }
}

impl std::fmt::Display for RemoteUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.clone_url)
    }
}

fn repo_name_of(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.trim_end_matches(".git").to_string())
        .filter(|n| !n.is_empty())
}

fn invalid(input: &str) -> Error {
    Error::Config(format!(
        "Invalid repository URL: '{}'. Expected owner/repo, https://host/owner/repo, git@host:owner/repo.git or a local path",
        input
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shorthand() {
        let url = RemoteUrl::parse("owner/repo").unwrap();
        assert_eq!(url.owner.as_deref(), Some("owner"));
        assert_eq!(url.repo, "repo");
        assert_eq!(url.host.as_deref(), Some("github.com"));
        assert_eq!(url.clone_url, "https://github.com/owner/repo.git");
    }

    #[test]
    fn test_parse_https() {
        let url = RemoteUrl::parse("https://github.com/owner/repo").unwrap();
        assert_eq!(url.owner.as_deref(), Some("owner"));
        assert_eq!(url.repo, "repo");
        assert_eq!(url.clone_url, "https://github.com/owner/repo.git");

        let url = RemoteUrl::parse("https://gitlab.com/group/sub/repo.git").unwrap();
        assert_eq!(url.owner.as_deref(), Some("group/sub"));
        assert_eq!(url.clone_url, "https://gitlab.com/group/sub/repo.git");
    }

    #[test]
    fn test_parse_git_ssh() {
        let url = RemoteUrl::parse("git@github.com:owner/repo.git").unwrap();
        assert_eq!(url.owner.as_deref(), Some("owner"));
        assert_eq!(url.repo, "repo");
        assert_eq!(url.host.as_deref(), Some("github.com"));
        assert_eq!(url.clone_url, "git@github.com:owner/repo.git");
    }

    #[test]
    fn test_parse_local() {
        let url = RemoteUrl::parse("/srv/git/site.git").unwrap();
        assert_eq!(url.host, None);
        assert_eq!(url.repo, "site");
        assert_eq!(url.clone_url, "/srv/git/site.git");

        let url = RemoteUrl::parse("file:///srv/git/site.git").unwrap();
        assert_eq!(url.repo, "site");
        assert_eq!(url.pages_url(), None);
    }

    #[test]
    fn test_existing_relative_path_is_not_shorthand() {
        // Tests run from the package root, where `src/lib.rs` exists
        let url = RemoteUrl::parse("src/lib.rs").unwrap();
        assert_eq!(url.host, None);
        assert_eq!(url.owner, None);
        assert_eq!(url.clone_url, "src/lib.rs");

        let url = RemoteUrl::parse("no-such-owner/site").unwrap();
        assert_eq!(url.host.as_deref(), Some("github.com"));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(RemoteUrl::parse("invalid").is_err());
        assert!(RemoteUrl::parse("").is_err());
        assert!(RemoteUrl::parse("ftp://example.com/owner/repo").is_err());
    }

    #[test]
    fn test_pages_url() {
        let url = RemoteUrl::parse("owner/docs").unwrap();
        assert_eq!(url.pages_url().as_deref(), Some("https://owner.github.io/docs/"));

        let url = RemoteUrl::parse("git@github.com:Owner/owner.github.io.git").unwrap();
        assert_eq!(url.pages_url().as_deref(), Some("https://owner.github.io/"));

        let url = RemoteUrl::parse("https://gitlab.com/owner/docs").unwrap();
        assert_eq!(url.pages_url(), None);
    }
}
