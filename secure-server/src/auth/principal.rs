//! The authenticated identity attached to a request.

use std::collections::BTreeSet;

/// Identity extracted from a validated token.
///
/// Created by the auth gate and handed to handlers through
/// `Extension<Principal>`. Lives for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    subject: String,
    scopes: BTreeSet<String>,
}

impl Principal {
    pub fn new<I, S>(subject: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            subject: subject.into(),
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }

    /// The token subject (`sub` claim).
    pub fn name(&self) -> &str {
        &self.subject
    }

    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    /// Whether the token granted `scope`. Matching is exact.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }
}
