//! The scope gate: client-side permission discipline.
//!
//! The replicated store enforces no ACL — any replica that can open a
//! document can write to it. Permission therefore has to be checked on the
//! client, before a mutation is attempted, and re-checked on every
//! operation because a session's scope can change while it is open (a
//! draft skill becoming published demotes editors to
//! [`Scope::ReadOnlyWithInput`]).
//!
//! [`GraphSession`](crate::session::GraphSession) consults the gate before
//! every store call; a denial is a [`PermissionError`] raised with zero
//! writes issued.
//!
//! # Examples
//!
//! ```rust
//! use loomcanvas::scope::Scope;
//!
//! assert!(Scope::ReadWrite.can_mutate(false));
//! assert!(!Scope::ReadOnly.can_mutate(false));
//! // filling a published skill's input is the one permitted mutation
//! assert!(Scope::ReadOnlyWithInput.can_mutate(true));
//! assert!(!Scope::ReadOnlyWithInput.can_mutate(false));
//! ```

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Permission level attached to a session for one skill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    /// No mutations permitted.
    ReadOnly,
    /// Mutations permitted only on nodes that are live inputs to the
    /// skill's Input node, so an end user can fill in inputs without
    /// editing the workflow.
    ReadOnlyWithInput,
    /// All graph mutations permitted.
    ReadWrite,
}

impl Scope {
    /// Whether a mutation is permitted under this scope.
    ///
    /// `is_skill_input` says whether the targeted node is a live input to
    /// the skill's Input node; it is only consulted for
    /// `ReadOnlyWithInput`.
    #[must_use]
    pub fn can_mutate(self, is_skill_input: bool) -> bool {
        match self {
            Scope::ReadWrite => true,
            Scope::ReadOnlyWithInput => is_skill_input,
            Scope::ReadOnly => false,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::ReadOnly => f.write_str("read-only"),
            Scope::ReadOnlyWithInput => f.write_str("read-only-with-input"),
            Scope::ReadWrite => f.write_str("read-write"),
        }
    }
}

/// A mutation denied by the scope gate, before any store call was made.
#[derive(Debug, Error, Diagnostic)]
#[error("operation '{operation}' denied under {scope} scope")]
#[diagnostic(
    code(loomcanvas::scope::denied),
    help("The session's scope does not permit this mutation; it was not sent to the store.")
)]
pub struct PermissionError {
    pub scope: Scope,
    pub operation: &'static str,
}

impl PermissionError {
    #[must_use]
    pub fn new(scope: Scope, operation: &'static str) -> Self {
        Self { scope, operation }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_permits_everything() {
        assert!(Scope::ReadWrite.can_mutate(false));
        assert!(Scope::ReadWrite.can_mutate(true));
    }

    #[test]
    fn read_only_permits_nothing() {
        assert!(!Scope::ReadOnly.can_mutate(false));
        assert!(!Scope::ReadOnly.can_mutate(true));
    }

    #[test]
    fn with_input_permits_only_skill_inputs() {
        assert!(Scope::ReadOnlyWithInput.can_mutate(true));
        assert!(!Scope::ReadOnlyWithInput.can_mutate(false));
    }
}
