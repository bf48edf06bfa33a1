//! git::credentials
//!
//! Credential resolution for remote operations.
//!
//! A [`CredentialProvider`] is asked for a credential whenever a remote
//! requests authentication, along with the kinds of credential the remote
//! accepts. [`EnvCredentials`], the default provider, resolves from the
//! environment:
//!
//! 1. SSH agent, when `SSH_AUTH_SOCK` is set
//! 2. SSH key pair `id_rsa` / `id_rsa.pub` under `$QVC_SSH_KEY_HOME`
//!    (default `~/.ssh`)
//! 3. `GIT_USERNAME` / `GIT_PASSWORD` for plaintext authentication
//!
//! A provider returning `None` aborts the operation with
//! [`GitError::CredentialFailure`](super::GitError::CredentialFailure).

use std::path::PathBuf;

/// A resolved credential.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    SshAgent {
        username: String,
    },
    SshKey {
        username: String,
        public_key: Option<PathBuf>,
        private_key: PathBuf,
        passphrase: Option<String>,
    },
    Plaintext {
        username: String,
        password: String,
    },
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::SshAgent { username } => {
                f.debug_struct("SshAgent").field("username", username).finish()
            }
            Credential::SshKey {
                username,
                private_key,
                ..
            } => f
                .debug_struct("SshKey")
                .field("username", username)
                .field("private_key", private_key)
                .finish_non_exhaustive(),
            Credential::Plaintext { username, .. } => f
                .debug_struct("Plaintext")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// Credential kinds a remote accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllowedKinds {
    pub ssh_key: bool,
    pub plaintext: bool,
}

/// Source of credentials for remote operations.
pub trait CredentialProvider {
    /// Return a credential for `url`, or `None` if nothing usable is
    /// configured. `username` is the one embedded in the URL, if any.
    fn provide(&self, url: &str, username: Option<&str>, allowed: AllowedKinds) -> Option<Credential>;
}

/// Environment-backed provider.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EnvCredentials {
    pub agent_socket: Option<String>,
    pub key_home: Option<PathBuf>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for EnvCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvCredentials")
            .field("agent_socket", &self.agent_socket)
            .field("key_home", &self.key_home)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl EnvCredentials {
    const DEFAULT_USER: &'static str = "git";

    /// Read the provider settings from the process environment.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            agent_socket: var("SSH_AUTH_SOCK"),
            key_home: var("QVC_SSH_KEY_HOME")
                .map(PathBuf::from)
                .or_else(|| dirs::home_dir().map(|home| home.join(".ssh"))),
            username: var("GIT_USERNAME"),
            password: var("GIT_PASSWORD"),
        }
    }

    fn key_pair(&self) -> Option<(PathBuf, PathBuf)> {
        let home = self.key_home.as_ref()?;
        let private = home.join("id_rsa");
        let public = home.join("id_rsa.pub");
        (private.is_file() && public.is_file()).then_some((public, private))
    }
}

impl CredentialProvider for EnvCredentials {
    fn provide(&self, url: &str, username: Option<&str>, allowed: AllowedKinds) -> Option<Credential> {
        let username = username.unwrap_or(Self::DEFAULT_USER).to_string();

        if allowed.ssh_key {
            if self.agent_socket.is_some() {
                tracing::debug!(url, "using ssh agent");
                return Some(Credential::SshAgent { username });
            }
            if let Some((public, private)) = self.key_pair() {
                tracing::debug!(url, key = %private.display(), "using ssh key pair");
                return Some(Credential::SshKey {
                    username,
                    public_key: Some(public),
                    private_key: private,
                    passphrase: None,
                });
            }
        }

        if allowed.plaintext {
            if let (Some(user), Some(password)) = (&self.username, &self.password) {
                tracing::debug!(url, "using plaintext credentials");
                return Some(Credential::Plaintext {
                    username: user.clone(),
                    password: password.clone(),
                });
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SSH: AllowedKinds = AllowedKinds {
        ssh_key: true,
        plaintext: false,
    };
    const PLAIN: AllowedKinds = AllowedKinds {
        ssh_key: false,
        plaintext: true,
    };

    #[test]
    fn agent_wins_for_ssh() {
        let provider = EnvCredentials {
            agent_socket: Some("/tmp/agent.sock".to_string()),
            ..Default::default()
        };
        assert_eq!(
            provider.provide("ssh://host/repo", Some("deploy"), SSH),
            Some(Credential::SshAgent {
                username: "deploy".to_string()
            })
        );
    }

    #[test]
    fn key_pair_from_key_home() {
        let home = TempDir::new().unwrap();
        std::fs::write(home.path().join("id_rsa"), "private").unwrap();
        std::fs::write(home.path().join("id_rsa.pub"), "public").unwrap();

        let provider = EnvCredentials {
            key_home: Some(home.path().to_path_buf()),
            ..Default::default()
        };
        match provider.provide("ssh://host/repo", None, SSH) {
            Some(Credential::SshKey {
                username,
                private_key,
                ..
            }) => {
                assert_eq!(username, "git");
                assert_eq!(private_key, home.path().join("id_rsa"));
            }
            other => panic!("expected key pair, got {other:?}"),
        }
    }

    #[test]
    fn plaintext_needs_both_values() {
        let mut provider = EnvCredentials {
            username: Some("alice".to_string()),
            ..Default::default()
        };
        assert_eq!(provider.provide("https://host/repo", None, PLAIN), None);

        provider.password = Some("secret".to_string());
        assert!(matches!(
            provider.provide("https://host/repo", None, PLAIN),
            Some(Credential::Plaintext { .. })
        ));
    }

    #[test]
    fn nothing_usable() {
        let provider = EnvCredentials::default();
        assert_eq!(provider.provide("ssh://host/repo", None, SSH), None);
    }

    #[test]
    fn debug_redacts_password() {
        let provider = EnvCredentials {
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        assert!(!format!("{provider:?}").contains("hunter2"));
        let cred = Credential::Plaintext {
            username: "a".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{cred:?}").contains("hunter2"));
    }
}
