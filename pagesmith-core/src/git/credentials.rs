//! Credential negotiation for network remotes

use git2::{Cred, CredentialType, RemoteCallbacks};

/// libgit2 re-invokes the callback after every rejected credential
const MAX_ATTEMPTS: usize = 3;

/// Remote callbacks with credential lookup and silent progress
pub(super) fn remote_callbacks<'a>() -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    let mut attempts = 0;

    callbacks.credentials(move |url, username, allowed| {
        attempts += 1;
        if attempts > MAX_ATTEMPTS {
            return Err(git2::Error::from_str(&format!(
                "authentication failed for {}",
                url
            )));
        }
        credentials(url, username, allowed)
    });
    callbacks.transfer_progress(|_| true);

    callbacks
}

fn credentials(
    url: &str,
    username: Option<&str>,
    allowed: CredentialType,
) -> Result<Cred, git2::Error> {
    if allowed.contains(CredentialType::SSH_KEY) {
        if let Some(user) = username {
            return Cred::ssh_key_from_agent(user);
        }
    }

    if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
        let config = git2::Config::open_default()?;
        return Cred::credential_helper(&config, url, username);
    }

    if allowed.contains(CredentialType::USERNAME) {
        return Cred::username(username.unwrap_or("git"));
    }

    if allowed.contains(CredentialType::DEFAULT) {
        return Cred::default();
    }

    tracing::warn!(url, ?allowed, "No supported credential type offered");
    Err(git2::Error::from_str("no supported credential type"))
}
