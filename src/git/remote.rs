//! git::remote
//!
//! Remote operations: fetch, push and refspec handling.
//!
//! All calls block until the transfer finishes. Authentication goes through
//! a [`CredentialProvider`]; if it has nothing to offer the operation fails
//! with [`GitError::CredentialFailure`].

use std::cell::Cell;

use super::credentials::{AllowedKinds, Credential, CredentialProvider};
use super::interface::{GitError, Repository};
use crate::core::types::RefName;

/// Credential callback invocations before giving up.
const MAX_CREDENTIAL_ATTEMPTS: u32 = 3;

/// A parsed `[+]src[:dst]` refspec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refspec {
    pub force: bool,
    pub src: RefName,
    pub dst: Option<RefName>,
}

impl Refspec {
    /// Parse a refspec; short names are qualified with `refs/heads/`.
    ///
    /// ```
    /// use quadvc::git::Refspec;
    ///
    /// let spec = Refspec::parse("+master:refs/remotes/origin/master").unwrap();
    /// assert!(spec.force);
    /// assert_eq!(spec.src.as_str(), "refs/heads/master");
    /// assert_eq!(spec.to_string(), "+refs/heads/master:refs/remotes/origin/master");
    /// ```
    pub fn parse(spec: &str) -> Result<Self, GitError> {
        let invalid = || GitError::InvalidRefspec {
            refspec: spec.to_string(),
        };
        let (force, rest) = match spec.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, spec),
        };
        let (src, dst) = match rest.split_once(':') {
            Some((src, dst)) => (src, Some(dst)),
            None => (rest, None),
        };
        if src.is_empty() || dst.is_some_and(str::is_empty) {
            return Err(invalid());
        }

        Ok(Self {
            force,
            src: RefName::branch(src).map_err(|_| invalid())?,
            dst: dst
                .map(|d| RefName::branch(d).map_err(|_| invalid()))
                .transpose()?,
        })
    }

    /// Fetch form: a missing destination becomes the remote tracking ref.
    fn for_fetch(&self, remote: &str) -> Result<String, GitError> {
        let dst = match &self.dst {
            Some(dst) => dst.clone(),
            None => RefName::remote_tracking(remote, self.src.short_name())?,
        };
        Ok(format!("{}{}:{}", self.plus(), self.src, dst))
    }

    /// Push form: a missing destination pushes to the same name.
    fn for_push(&self) -> String {
        let dst = self.dst.as_ref().unwrap_or(&self.src);
        format!("{}{}:{}", self.plus(), self.src, dst)
    }

    fn plus(&self) -> &'static str {
        if self.force {
            "+"
        } else {
            ""
        }
    }
}

impl std::fmt::Display for Refspec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.plus(), self.src)?;
        if let Some(dst) = &self.dst {
            write!(f, ":{dst}")?;
        }
        Ok(())
    }
}

/// Remote callbacks wired to a credential provider.
///
/// When the provider has nothing to offer, the reason is left in `failure`.
pub(super) fn callbacks<'a>(
    provider: &'a dyn CredentialProvider,
    failure: &'a Cell<Option<String>>,
) -> git2::RemoteCallbacks<'a> {
    let mut callbacks = git2::RemoteCallbacks::new();
    let mut attempts = 0u32;

    callbacks.credentials(move |url, username, allowed| {
        let user = username.unwrap_or("git");
        if allowed.contains(git2::CredentialType::USERNAME) {
            return git2::Cred::username(user);
        }

        attempts += 1;
        let kinds = AllowedKinds {
            ssh_key: allowed.contains(git2::CredentialType::SSH_KEY),
            plaintext: allowed.contains(git2::CredentialType::USER_PASS_PLAINTEXT),
        };
        let credential = if attempts > MAX_CREDENTIAL_ATTEMPTS {
            None
        } else {
            provider.provide(url, username, kinds)
        };

        match credential {
            Some(Credential::SshAgent { username }) => git2::Cred::ssh_key_from_agent(&username),
            Some(Credential::SshKey {
                username,
                public_key,
                private_key,
                passphrase,
            }) => git2::Cred::ssh_key(
                &username,
                public_key.as_deref(),
                &private_key,
                passphrase.as_deref(),
            ),
            Some(Credential::Plaintext { username, password }) => {
                git2::Cred::userpass_plaintext(&username, &password)
            }
            None => {
                let message = if attempts > MAX_CREDENTIAL_ATTEMPTS {
                    format!("authentication to {url} failed after {MAX_CREDENTIAL_ATTEMPTS} attempts")
                } else {
                    format!("no usable credential for {url} (accepts {kinds:?})")
                };
                failure.set(Some(message.clone()));
                Err(git2::Error::from_str(&message))
            }
        }
    });

    callbacks
}

fn fetch_options<'a>(
    provider: &'a dyn CredentialProvider,
    failure: &'a Cell<Option<String>>,
) -> git2::FetchOptions<'a> {
    let mut options = git2::FetchOptions::new();
    options.remote_callbacks(callbacks(provider, failure));
    options
}

/// Turn a transfer error into a credential failure when the callback gave up.
fn transfer_error(err: git2::Error, context: &str, failure: &Cell<Option<String>>) -> GitError {
    match failure.take() {
        Some(message) => GitError::CredentialFailure { message },
        None => GitError::from_git2(err, context),
    }
}

impl Repository {
    /// Initialize a bare repository (no working directory).
    pub fn create_bare(path: &std::path::Path) -> Result<Self, GitError> {
        git2::Repository::init_bare(path).map_err(|e| GitError::from_git2(e, "init"))?;
        Self::open(path)
    }

    /// Clone `url` into `path` using `provider` for authentication.
    pub fn clone_from(
        url: &str,
        path: &std::path::Path,
        provider: &dyn CredentialProvider,
    ) -> Result<Self, GitError> {
        let failure = Cell::new(None);
        let mut builder = git2::build::RepoBuilder::new();
        builder.fetch_options(fetch_options(provider, &failure));
        builder
            .clone(url, path)
            .map_err(|e| transfer_error(e, url, &failure))?;
        Self::open(path)
    }

    /// Configured remote names.
    pub fn remotes(&self) -> Result<Vec<String>, GitError> {
        Ok(self
            .repo
            .remotes()?
            .iter()
            .flatten()
            .map(String::from)
            .collect())
    }

    /// Add a remote.
    pub fn add_remote(&self, name: &str, url: &str) -> Result<(), GitError> {
        self.repo
            .remote(name, url)
            .map_err(|e| GitError::from_git2(e, name))?;
        Ok(())
    }

    pub fn remote_url(&self, name: &str) -> Result<String, GitError> {
        let remote = self.find_remote(name)?;
        Ok(remote.url().unwrap_or_default().to_string())
    }

    fn find_remote(&self, name: &str) -> Result<git2::Remote<'_>, GitError> {
        self.repo.find_remote(name).map_err(|_| GitError::RemoteNotFound {
            name: name.to_string(),
        })
    }

    /// Upstream `(remote, ref)` of the branch HEAD points at, if configured.
    pub fn upstream(&self) -> Result<Option<(String, RefName)>, GitError> {
        let Some(branch) = self.current_head()? else {
            return Ok(None);
        };
        let local = RefName::branch(&branch)?;

        let remote = match self.repo.branch_upstream_remote(local.as_str()) {
            Ok(buf) => buf.as_str().map(String::from),
            Err(_) => None,
        };
        let merge = match self.repo.branch_upstream_merge(local.as_str()) {
            Ok(buf) => buf.as_str().map(String::from),
            Err(_) => None,
        };

        match (remote, merge) {
            (Some(remote), Some(merge)) => Ok(Some((remote, RefName::new(merge)?))),
            _ => Ok(None),
        }
    }

    /// Remote and refspec to use when the caller gave none.
    fn default_target(&self, remote: Option<&str>) -> Result<(String, Option<Refspec>), GitError> {
        let upstream = self.upstream()?;
        let remote = match (remote, &upstream) {
            (Some(r), _) => r.to_string(),
            (None, Some((r, _))) => r.clone(),
            (None, None) => "origin".to_string(),
        };

        let spec = match (upstream, self.current_head()?) {
            (Some((up_remote, merge)), Some(branch)) if up_remote == remote => Some(Refspec {
                force: false,
                src: RefName::branch(&branch)?,
                dst: Some(merge),
            }),
            (_, Some(branch)) => Some(Refspec {
                force: false,
                src: RefName::branch(&branch)?,
                dst: None,
            }),
            (_, None) => None,
        };
        Ok((remote, spec))
    }

    /// Fetch from `remote` (default: upstream remote, else `origin`).
    ///
    /// Without a refspec, the remote's configured refspecs are used. The
    /// fetched commit is recorded in `FETCH_HEAD`.
    pub fn fetch(
        &self,
        remote: Option<&str>,
        refspec: Option<&str>,
        provider: &dyn CredentialProvider,
    ) -> Result<(), GitError> {
        let (remote_name, _) = self.default_target(remote)?;
        let mut remote = self.find_remote(&remote_name)?;

        let specs = match refspec {
            Some(spec) => vec![Refspec::parse(spec)?.for_fetch(&remote_name)?],
            None => Vec::new(),
        };

        let failure = Cell::new(None);
        let mut options = fetch_options(provider, &failure);
        remote
            .fetch(&specs, Some(&mut options), None)
            .map_err(|e| transfer_error(e, &remote_name, &failure))?;

        tracing::info!(remote = %remote_name, refspecs = ?specs, "fetched");
        Ok(())
    }

    /// Push to `remote` (default: upstream remote, else `origin`).
    ///
    /// Without a refspec the current branch is pushed to its upstream, or to
    /// the same name.
    ///
    /// # Errors
    ///
    /// - [`GitError::PushRejected`] if the remote refuses the update
    pub fn push(
        &self,
        remote: Option<&str>,
        refspec: Option<&str>,
        provider: &dyn CredentialProvider,
    ) -> Result<(), GitError> {
        let (remote_name, default_spec) = self.default_target(remote)?;
        let spec = match refspec {
            Some(spec) => Refspec::parse(spec)?,
            None => default_spec.ok_or_else(|| GitError::InvalidRefspec {
                refspec: "HEAD is detached and no refspec was given".to_string(),
            })?,
        };
        let push_spec = spec.for_push();
        let mut remote = self.find_remote(&remote_name)?;

        let failure = Cell::new(None);
        let rejected: Cell<Option<String>> = Cell::new(None);
        let mut callbacks = callbacks(provider, &failure);
        callbacks.push_update_reference(|refname, status| {
            if let Some(message) = status {
                rejected.set(Some(format!("{refname}: {message}")));
            }
            Ok(())
        });

        let mut options = git2::PushOptions::new();
        options.remote_callbacks(callbacks);
        remote
            .push(&[push_spec.as_str()], Some(&mut options))
            .map_err(|e| match transfer_error(e, spec.src.as_str(), &failure) {
                GitError::PushRejected { message, .. } => GitError::PushRejected {
                    refname: spec.src.to_string(),
                    message,
                },
                other => other,
            })?;

        if let Some(message) = rejected.take() {
            return Err(GitError::PushRejected {
                refname: spec.src.to_string(),
                message,
            });
        }

        tracing::info!(remote = %remote_name, refspec = %push_spec, "pushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod refspec {
        use super::*;

        #[test]
        fn short_names_are_qualified() {
            let spec = Refspec::parse("develop").unwrap();
            assert!(!spec.force);
            assert_eq!(spec.src.as_str(), "refs/heads/develop");
            assert!(spec.dst.is_none());
            assert_eq!(
                spec.for_fetch("origin").unwrap(),
                "refs/heads/develop:refs/remotes/origin/develop"
            );
            assert_eq!(spec.for_push(), "refs/heads/develop:refs/heads/develop");
        }

        #[test]
        fn explicit_destination() {
            let spec = Refspec::parse("+a:refs/remotes/up/b").unwrap();
            assert!(spec.force);
            assert_eq!(spec.for_push(), "+refs/heads/a:refs/remotes/up/b");
        }

        #[test]
        fn rejects_malformed() {
            assert!(Refspec::parse("").is_err());
            assert!(Refspec::parse("a:").is_err());
            assert!(Refspec::parse(":b").is_err());
            assert!(Refspec::parse("a b").is_err());
        }
    }
}
