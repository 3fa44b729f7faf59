//! Author identity normalization.
//!
//! The same person often commits as `Alice Smith <Alice@Example.com>` on one
//! machine and `alice smith <alice@example.com >` on another. Every commit
//! author is reduced to an [`AuthorId`] so ownership and decay results do not
//! fragment across spellings.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical author key.
///
/// The normalized email when one is present, otherwise the normalized name.
///
/// # Examples
///
/// ```
/// use xray_history::identity::AuthorId;
///
/// let a = AuthorId::from_parts("Alice Smith", " Alice@Example.COM ");
/// let b = AuthorId::from_parts("alice  smith", "alice@example.com");
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), "alice@example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorId(String);

impl AuthorId {
    /// Derive the key from a raw name/email pair.
    pub fn from_parts(name: &str, email: &str) -> Self {
        let email = normalize(email);
        if email.is_empty() {
            Self(normalize(name))
        } else {
            Self(email)
        }
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trim, collapse internal whitespace, and lowercase.
fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Memoizing front for [`AuthorId::from_parts`].
///
/// A long history repeats the same few hundred name/email pairs thousands of
/// times; the cache turns each repeat into a single lookup.
///
/// # Examples
///
/// ```
/// use xray_history::identity::IdentityNormalizer;
///
/// let mut normalizer = IdentityNormalizer::new();
/// let first = normalizer.normalize("Bob", "BOB@example.com");
/// let second = normalizer.normalize("bob", "bob@example.com");
/// assert_eq!(first, second);
/// assert_eq!(normalizer.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct IdentityNormalizer {
    cache: HashMap<(String, String), AuthorId>,
}

impl IdentityNormalizer {
    /// Create an empty normalizer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the canonical key for `name`/`email`, computing it at most once.
    pub fn normalize(&mut self, name: &str, email: &str) -> AuthorId {
        if let Some(id) = self.cache.get(&(name.to_string(), email.to_string())) {
            return id.clone();
        }
        let id = AuthorId::from_parts(name, email);
        self.cache
            .insert((name.to_string(), email.to_string()), id.clone());
        id
    }

    /// Number of distinct raw spellings seen.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether no spelling has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
