//! Problem matcher
//!
//! Completions arrive with the problem's free text, not its id. The matcher
//! maps that text back to a stored [`ProblemRecord`] in three tiers, strictly
//! in this order:
//!
//! 1. **Exact**: stored text equals the incoming text.
//! 2. **Prefix**: the incoming text starts with the first `prefix_chars`
//!    characters of the stored text (or all of it, when shorter). Covers
//!    truncated and extended restatements.
//! 3. **RecentUnsolved**: the newest problem not yet solved.
//!
//! Within a tier the most recently created record wins.

use crate::config::MatcherSettings;
use crate::domain::{ProblemRecord, ProfileKey};

/// Which tier produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    Prefix,
    RecentUnsolved,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Prefix => "prefix",
            Self::RecentUnsolved => "recent_unsolved",
        }
    }
}

/// A resolved problem and how it was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProblemMatch<'a> {
    pub problem: &'a ProblemRecord,
    pub tier: MatchTier,
}

#[derive(Debug, Clone)]
pub struct ProblemMatcher {
    prefix_chars: usize,
}

impl Default for ProblemMatcher {
    fn default() -> Self {
        Self::new(&MatcherSettings::default())
    }
}

impl ProblemMatcher {
    pub fn new(settings: &MatcherSettings) -> Self {
        Self {
            prefix_chars: settings.prefix_chars,
        }
    }

    /// Resolve `incoming` against the problems owned by `key`.
    ///
    /// Records belonging to other users or profiles are ignored even if the
    /// caller passes them in.
    pub fn resolve<'a>(
        &self,
        key: &ProfileKey,
        problems: &'a [ProblemRecord],
        incoming: &str,
    ) -> Option<ProblemMatch<'a>> {
        let owned = || problems.iter().filter(|p| p.belongs_to(key));

        if let Some(problem) = newest(owned().filter(|p| p.text == incoming)) {
            return Some(ProblemMatch {
                problem,
                tier: MatchTier::Exact,
            });
        }

        if let Some(problem) = newest(owned().filter(|p| self.same_prefix(&p.text, incoming))) {
            return Some(ProblemMatch {
                problem,
                tier: MatchTier::Prefix,
            });
        }

        newest(owned().filter(|p| !p.is_solved())).map(|problem| ProblemMatch {
            problem,
            tier: MatchTier::RecentUnsolved,
        })
    }

    /// The stored text's first `min(prefix_chars, len)` characters start the
    /// incoming text. An empty stored text never matches.
    fn same_prefix(&self, stored: &str, incoming: &str) -> bool {
        let n = stored.chars().count().min(self.prefix_chars);
        if n == 0 {
            return false;
        }
        let mut incoming = incoming.chars();
        stored
            .chars()
            .take(n)
            .all(|c| incoming.next() == Some(c))
    }
}

fn newest<'a>(candidates: impl Iterator<Item = &'a ProblemRecord>) -> Option<&'a ProblemRecord> {
    candidates.max_by_key(|p| p.created_at)
}
