// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Provenance detection.
//!
//! When a commit gets cherry-picked with `git cherry-pick -x`, Git appends a
//! __provenance annotation__ to the new commit's message:
//!
//! ```text
//! (cherry picked from commit 1a2b3c4d5e6f...)
//! ```
//!
//! Scanning commit messages for these annotations tells us which commits of a
//! plan were already applied, whether by pickplan or by hand. Detection is
//! modeled through the [`ProvenanceDetector`] trait, so plan logic only ever
//! sees a set of full commit ids, never the text matching behind it.

use crate::backend::{Backend, BackendError};

use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, instrument};

/// Pattern matching the annotation left by `git cherry-pick -x`.
pub const DEFAULT_PATTERN: &str = r"\(cherry picked from commit ([0-9a-fA-F]{4,40})\)";

/// Detect commits that were already applied.
pub trait ProvenanceDetector {
    /// Full ids of commits applied somewhere in `left...right`.
    fn applied<B>(&self, backend: &B, left: &str, right: &str) -> Result<HashSet<String>>
    where
        B: Backend;
}

/// Detect applied commits through regular expressions over commit messages.
///
/// Each pattern must have one capture group matching a commit id. Captured
/// ids may be abbreviated. Ids that do not resolve to exactly one commit are
/// skipped.
#[derive(Debug, Clone)]
pub struct PatternDetector {
    patterns: Vec<Regex>,
}

impl PatternDetector {
    /// Construct new pattern detector.
    ///
    /// # Errors
    ///
    /// - Return [`DetectError::Pattern`] if a pattern does not compile.
    /// - Return [`DetectError::MissingCapture`] if a pattern has no capture
    ///   group.
    pub fn new(patterns: impl IntoIterator<Item = impl AsRef<str>>) -> Result<Self> {
        let mut compiled = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let regex = Regex::new(pattern)?;
            if regex.captures_len() < 2 {
                return Err(DetectError::MissingCapture(pattern.into()));
            }
            compiled.push(regex);
        }

        Ok(Self { patterns: compiled })
    }

    /// Extract every commit id mentioned in a commit message.
    pub fn extract<'msg>(&self, message: &'msg str) -> Vec<&'msg str> {
        self.patterns
            .iter()
            .flat_map(|regex| regex.captures_iter(message))
            .filter_map(|captures| captures.get(1))
            .map(|id| id.as_str())
            .collect()
    }
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self {
            patterns: vec![Regex::new(DEFAULT_PATTERN).unwrap()],
        }
    }
}

impl ProvenanceDetector for PatternDetector {
    #[instrument(skip(self, backend), level = "debug")]
    fn applied<B>(&self, backend: &B, left: &str, right: &str) -> Result<HashSet<String>>
    where
        B: Backend,
    {
        let mut applied = HashSet::new();
        for message in backend.messages(left, right)? {
            for id in self.extract(&message) {
                match backend.resolve(id)? {
                    Some(full) => {
                        debug!("found provenance of {full}");
                        applied.insert(full);
                    }
                    None => debug!("skip unresolvable provenance {id:?}"),
                }
            }
        }

        Ok(applied)
    }
}

/// Provenance detection error types.
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    /// Pattern is not a valid regular expression.
    #[error(transparent)]
    Pattern(#[from] regex::Error),

    /// Pattern cannot capture a commit id.
    #[error("pattern {0:?} has no capture group for a commit id")]
    MissingCapture(String),

    /// Backend operations fail.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Friendly result alias :3
pub type Result<T, E = DetectError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_pattern_extracts_provenance() {
        let detector = PatternDetector::default();
        let message = indoc! {r#"
            Fix parser crash

            Some body text mentioning commit 1234567 in passing.

            (cherry picked from commit 0123456789abcdef0123456789abcdef01234567)
        "#};

        let result = detector.extract(message);
        assert_eq!(result, vec!["0123456789abcdef0123456789abcdef01234567"]);
    }

    #[test]
    fn custom_patterns_extract_in_order() -> anyhow::Result<()> {
        let detector = PatternDetector::new([
            DEFAULT_PATTERN,
            r"(?m)^Backport-of: ([0-9a-f]+)$",
        ])?;
        let message = indoc! {r#"
            Backport two fixes

            (cherry picked from commit abcdef1)
            Backport-of: 7654321
        "#};

        let result = detector.extract(message);
        assert_eq!(result, vec!["abcdef1", "7654321"]);

        Ok(())
    }

    #[test]
    fn reject_pattern_without_capture() {
        let result = PatternDetector::new([r"cherry picked"]);
        assert!(matches!(result, Err(DetectError::MissingCapture(_))));

        let result = PatternDetector::new([r"(unclosed"]);
        assert!(matches!(result, Err(DetectError::Pattern(_))));
    }
}
