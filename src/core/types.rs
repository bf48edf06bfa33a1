//! core::types
//!
//! Strong types for repository identifiers.
//!
//! # Types
//!
//! - [`Oid`] - Content hash of a commit, tree or blob
//! - [`RefName`] - Fully qualified reference name (`refs/heads/master`)
//!
//! Both types validate on construction so that the object store never
//! receives a malformed identifier from the layers above it.
//!
//! # Examples
//!
//! ```
//! use quadvc::core::types::{Oid, RefName};
//!
//! let oid = Oid::new("3F2504E04F8911D39A0C0305E82C3301AABBCCDD").unwrap();
//! assert_eq!(oid.short(), "3f2504e04f");
//!
//! let head = RefName::branch("master").unwrap();
//! assert_eq!(head.as_str(), "refs/heads/master");
//! assert_eq!(head.short_name(), "master");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from identifier validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),
}

/// A git object id, normalized to lowercase hex.
///
/// SHA-1 (40 characters) and SHA-256 (64 characters) repositories are both
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Length of the abbreviated form used in logs and commit listings.
    pub const SHORT_LEN: usize = 10;

    /// Create a validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` unless the input is 40 or 64 hex digits.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(format!("not hexadecimal: {oid}")));
        }
        Ok(Self(oid))
    }

    /// Abbreviated id (first ten hex digits).
    pub fn short(&self) -> &str {
        &self.0[..Self::SHORT_LEN]
    }

    /// Whether this is the all-zero id git uses for "no object".
    pub fn is_zero(&self) -> bool {
        self.0.bytes().all(|b| b == b'0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fully qualified git reference name.
///
/// Short branch names are qualified through [`RefName::branch`]; the
/// pseudo-refs `HEAD` and `FETCH_HEAD` are accepted as they are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefName(String);

impl RefName {
    const HEADS: &'static str = "refs/heads/";
    const TAGS: &'static str = "refs/tags/";

    /// Create a validated ref name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRefName` if the name breaks git's
    /// refname rules or is neither under `refs/` nor a pseudo-ref.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name == "HEAD" || name == "FETCH_HEAD" {
            return Ok(Self(name));
        }
        if !name.starts_with("refs/") {
            return Err(TypeError::InvalidRefName(format!(
                "'{name}' is not under refs/"
            )));
        }
        validate_ref_path(&name)?;
        Ok(Self(name))
    }

    /// Qualify a branch name. Already qualified names pass through.
    pub fn branch(name: &str) -> Result<Self, TypeError> {
        if name.starts_with("refs/") || name == "HEAD" || name == "FETCH_HEAD" {
            Self::new(name)
        } else {
            Self::new(format!("{}{name}", Self::HEADS))
        }
    }

    /// Qualify a tag name.
    pub fn tag(name: &str) -> Result<Self, TypeError> {
        Self::new(format!("{}{name}", Self::TAGS))
    }

    /// Remote tracking ref (`refs/remotes/<remote>/<branch>`).
    pub fn remote_tracking(remote: &str, branch: &str) -> Result<Self, TypeError> {
        Self::new(format!("refs/remotes/{remote}/{branch}"))
    }

    /// Whether this is a local branch.
    pub fn is_branch(&self) -> bool {
        self.0.starts_with(Self::HEADS)
    }

    /// Name with `refs/heads/` or `refs/tags/` removed.
    pub fn short_name(&self) -> &str {
        self.0
            .strip_prefix(Self::HEADS)
            .or_else(|| self.0.strip_prefix(Self::TAGS))
            .unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate_ref_path(name: &str) -> Result<(), TypeError> {
    let invalid = |why: &str| Err(TypeError::InvalidRefName(format!("'{name}': {why}")));

    if name.ends_with('/') || name.ends_with(".lock") || name.ends_with('.') {
        return invalid("bad suffix");
    }
    for pattern in ["..", "@{", "//"] {
        if name.contains(pattern) {
            return invalid("forbidden sequence");
        }
    }
    if name
        .chars()
        .any(|c| c.is_ascii_control() || " ~^:\\?*[".contains(c))
    {
        return invalid("forbidden character");
    }
    if name
        .split('/')
        .any(|part| part.starts_with('.') || part.ends_with(".lock"))
    {
        return invalid("bad path component");
    }
    Ok(())
}

impl TryFrom<String> for RefName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RefName> for String {
    fn from(name: RefName) -> Self {
        name.0
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod oid {
        use super::*;

        #[test]
        fn normalizes_case() {
            let oid = Oid::new("ABCDEF0123456789ABCDEF0123456789ABCDEF01").unwrap();
            assert_eq!(oid.as_str(), "abcdef0123456789abcdef0123456789abcdef01");
        }

        #[test]
        fn rejects_bad_length_and_digits() {
            assert!(Oid::new("abc").is_err());
            assert!(Oid::new("g".repeat(40)).is_err());
            assert!(Oid::new("a".repeat(64)).is_ok());
        }

        #[test]
        fn short_and_zero() {
            let zero = Oid::new("0".repeat(40)).unwrap();
            assert!(zero.is_zero());
            assert_eq!(zero.short().len(), Oid::SHORT_LEN);
        }

        #[test]
        fn serde_roundtrip() {
            let oid = Oid::new("a".repeat(40)).unwrap();
            let json = serde_json::to_string(&oid).unwrap();
            assert_eq!(serde_json::from_str::<Oid>(&json).unwrap(), oid);
        }
    }

    mod ref_name {
        use super::*;

        #[test]
        fn qualifies_branches() {
            assert_eq!(
                RefName::branch("develop").unwrap().as_str(),
                "refs/heads/develop"
            );
            assert_eq!(
                RefName::branch("refs/heads/develop").unwrap().as_str(),
                "refs/heads/develop"
            );
            assert_eq!(RefName::branch("HEAD").unwrap().as_str(), "HEAD");
        }

        #[test]
        fn short_names() {
            assert_eq!(RefName::tag("v1").unwrap().short_name(), "v1");
            let remote = RefName::remote_tracking("origin", "master").unwrap();
            assert_eq!(remote.short_name(), "refs/remotes/origin/master");
            assert!(!remote.is_branch());
        }

        #[test]
        fn rejects_malformed() {
            assert!(RefName::new("heads/master").is_err());
            assert!(RefName::branch("a..b").is_err());
            assert!(RefName::branch("has space").is_err());
            assert!(RefName::branch("x.lock").is_err());
            assert!(RefName::branch(".hidden").is_err());
            assert!(RefName::branch("trailing/").is_err());
        }
    }
}
