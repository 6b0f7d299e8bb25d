// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Plan file layout.
//!
//! A __plan__ is a plain text file listing commits to cherry-pick from a
//! source branch onto the current branch. Each commit gets its own line, and
//! lines are applied from top to bottom. Anything that is not a commit line is
//! kept verbatim, so users may sprinkle comments and blank lines around as they
//! please.
//!
//! # Commit Lines
//!
//! A commit line starts with a four character verb, followed by an abbreviated
//! commit id, followed by the commit's subject line:
//!
//! ```text
//! pick 1a2b3c4 Fix parser crash
//! drop 5d6e7f8 Bump version
//! noop 9a8b7c6 Already applied upstream
//!      0f1e2d3 Not decided yet
//! ```
//!
//! A verb of four spaces means that nobody has decided what to do with that
//! commit yet. Only `pick` lines are ever cherry-picked.
//!
//! # Header Block
//!
//! Every plan ends with a generated header block recording the range that was
//! used to build it:
//!
//! ```text
//! # Rebase 1a2b3c4..0f1e2d3 onto 1a2b3c4 (4 commands)
//! ```
//!
//! The header is how later invocations recover the onto commit and the source
//! tip without the user repeating them. File I/O is left to the caller.

use regex::Regex;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
    sync::LazyLock,
};
use tracing::warn;

static HEADER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^# Rebase ([0-9a-fA-F]+)\.\.([0-9a-fA-F]+) onto ([0-9a-fA-F]+) \((\d+) commands?\)$")
        .unwrap()
});

const FOOTER: &[&str] = &[
    "# Commands:",
    "# pick <commit> = cherry-pick commit onto the current branch",
    "# drop <commit> = leave commit out",
    "# noop <commit> = commit was already applied, set by mark",
    "#      <commit> = not decided yet, will not be applied",
    "#",
    "# These lines are applied from top to bottom.",
    "# Do not reorder them, the order is the order of application.",
    "#",
    "# Only pick lines are applied. Run mark again after applying to",
    "# refresh noop lines.",
];

/// What to do with a commit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Cherry-pick the commit.
    Pick,

    /// Leave the commit out.
    Drop,

    /// Commit was found to be applied already.
    Noop,

    /// Nobody decided yet.
    #[default]
    Undecided,
}

impl Verb {
    /// Four character keyword written at the start of a commit line.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Pick => "pick",
            Self::Drop => "drop",
            Self::Noop => "noop",
            Self::Undecided => "    ",
        }
    }

    fn looks_like_action(line: &str) -> bool {
        [Self::Pick, Self::Drop, Self::Noop]
            .into_iter()
            .any(|verb| {
                line.strip_prefix(verb.keyword())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with([' ', '\t']))
            })
    }

    fn split_line(line: &str) -> Option<(Self, &str)> {
        [Self::Pick, Self::Drop, Self::Noop, Self::Undecided]
            .into_iter()
            .find_map(|verb| {
                line.strip_prefix(verb.keyword())
                    .and_then(|rest| rest.strip_prefix([' ', '\t']))
                    .map(|rest| (verb, rest.trim_start_matches([' ', '\t'])))
            })
    }
}

impl Display for Verb {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.keyword())
    }
}

/// A single commit line of a plan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommitAction {
    /// What to do with the commit.
    pub verb: Verb,

    /// Commit id as written in the plan, usually abbreviated.
    pub id: String,

    /// Subject line of the commit.
    pub subject: String,
}

impl CommitAction {
    /// Construct new commit action.
    pub fn new(verb: Verb, id: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            verb,
            id: id.into(),
            subject: subject.into(),
        }
    }

    /// Construct new commit action nobody decided on yet.
    pub fn undecided(id: impl Into<String>, subject: impl Into<String>) -> Self {
        Self::new(Verb::Undecided, id, subject)
    }

    fn parse(line: &str) -> Option<Self> {
        let (verb, rest) = Verb::split_line(line)?;
        let (id, subject) = rest
            .split_once([' ', '\t'])
            .map(|(id, subject)| (id, subject.trim_start_matches('\t')))
            .unwrap_or((rest, ""));

        // INVARIANT: Commit ids are non-empty hexadecimal strings.
        if id.is_empty() || !id.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return None;
        }

        Some(Self::new(verb, id, subject))
    }
}

impl Display for CommitAction {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        if self.subject.is_empty() {
            write!(fmt, "{} {}", self.verb, self.id)
        } else {
            write!(fmt, "{} {} {}", self.verb, self.id, self.subject)
        }
    }
}

/// A line of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// Commit line.
    Action(CommitAction),

    /// Comment, blank line, or anything else kept verbatim.
    Line(String),
}

impl Display for Entry {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Action(action) => action.fmt(fmt),
            Self::Line(line) => fmt.write_str(line),
        }
    }
}

/// Generated header line of a plan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Header {
    /// Commit the plan is applied onto.
    pub onto: String,

    /// Tip of the source branch when the plan was last built.
    pub tip: String,

    /// Number of commit lines in the plan.
    pub count: usize,
}

impl FromStr for Header {
    type Err = PlanError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let captures = HEADER_LINE
            .captures(line.trim_end())
            .ok_or_else(|| PlanError::InvalidHeader(line.into()))?;

        Ok(Self {
            onto: captures[3].into(),
            tip: captures[2].into(),
            count: captures[4]
                .parse()
                .map_err(|_| PlanError::InvalidHeader(line.into()))?,
        })
    }
}

impl Display for Header {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let noun = if self.count == 1 { "command" } else { "commands" };
        write!(
            fmt,
            "# Rebase {onto}..{tip} onto {onto} ({count} {noun})",
            onto = self.onto,
            tip = self.tip,
            count = self.count,
        )
    }
}

/// In-memory plan.
///
/// # Invariant
///
/// - Entries keep the order they were read or appended in.
/// - Lines that are not commit lines are never altered.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Plan {
    entries: Vec<Entry>,
}

impl Plan {
    /// Construct new empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries in file order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Commit lines in file order.
    pub fn actions(&self) -> impl Iterator<Item = &CommitAction> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Action(action) => Some(action),
            Entry::Line(_) => None,
        })
    }

    /// Mutable commit lines in file order.
    pub fn actions_mut(&mut self) -> impl Iterator<Item = &mut CommitAction> {
        self.entries.iter_mut().filter_map(|entry| match entry {
            Entry::Action(action) => Some(action),
            Entry::Line(_) => None,
        })
    }

    /// Commit lines marked as `pick` in file order.
    pub fn picks(&self) -> impl Iterator<Item = &CommitAction> {
        self.actions().filter(|action| action.verb == Verb::Pick)
    }

    /// Last commit line of plan if any.
    pub fn last_action(&self) -> Option<&CommitAction> {
        self.actions().last()
    }

    /// Latest header of plan if any.
    pub fn header(&self) -> Option<Header> {
        self.entries.iter().rev().find_map(|entry| match entry {
            Entry::Line(line) => line.parse().ok(),
            Entry::Action(_) => None,
        })
    }

    /// Append commit line.
    pub fn push_action(&mut self, action: CommitAction) {
        self.entries.push(Entry::Action(action));
    }

    /// Append generated header block.
    ///
    /// Counts the current commit lines, and returns the header that was
    /// written.
    pub fn push_header(&mut self, onto: impl Into<String>, tip: impl Into<String>) -> Header {
        let header = Header {
            onto: onto.into(),
            tip: tip.into(),
            count: self.actions().count(),
        };

        self.entries.push(Entry::Line(String::new()));
        self.entries.push(Entry::Line(header.to_string()));
        self.entries.push(Entry::Line("#".into()));
        self.entries
            .extend(FOOTER.iter().map(|line| Entry::Line((*line).into())));

        header
    }

    /// Drop everything after the last commit line.
    ///
    /// Clears the whole plan if it has no commit lines at all.
    pub fn truncate_after_last_action(&mut self) {
        let end = self
            .entries
            .iter()
            .rposition(|entry| matches!(entry, Entry::Action(_)))
            .map_or(0, |index| index + 1);
        self.entries.truncate(end);
    }

    /// Turn every `noop` line back into an undecided line.
    ///
    /// Returns the number of lines that changed.
    pub fn reset_noops(&mut self) -> usize {
        let mut count = 0;
        for action in self.actions_mut().filter(|action| action.verb == Verb::Noop) {
            action.verb = Verb::Undecided;
            count += 1;
        }

        count
    }
}

impl Display for Plan {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        for entry in &self.entries {
            writeln!(fmt, "{entry}")?;
        }

        Ok(())
    }
}

impl From<&str> for Plan {
    fn from(content: &str) -> Self {
        let entries = content
            .lines()
            .map(|line| match CommitAction::parse(line) {
                Some(action) => Entry::Action(action),
                None => {
                    if Verb::looks_like_action(line) {
                        warn!("keeping malformed commit line {line:?} as is");
                    }
                    Entry::Line(line.into())
                }
            })
            .collect();

        Self { entries }
    }
}

impl From<String> for Plan {
    fn from(content: String) -> Self {
        Self::from(content.as_str())
    }
}

/// Plan layout error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum PlanError {
    /// Line is not a generated header line.
    #[error("invalid plan header {0:?}")]
    InvalidHeader(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use simple_test_case::test_case;

    #[test_case("pick abc1234 Fix bug", Verb::Pick, "abc1234", "Fix bug"; "pick line")]
    #[test_case("drop def5678 Unrelated", Verb::Drop, "def5678", "Unrelated"; "drop line")]
    #[test_case("noop 9999999 Already applied", Verb::Noop, "9999999", "Already applied"; "noop line")]
    #[test_case("     0123abc Not sure", Verb::Undecided, "0123abc", "Not sure"; "undecided line")]
    #[test_case("pick abc1234", Verb::Pick, "abc1234", ""; "missing subject")]
    #[test]
    fn parse_commit_line(line: &str, verb: Verb, id: &str, subject: &str) {
        let plan = Plan::from(line);
        let expect = vec![Entry::Action(CommitAction::new(verb, id, subject))];
        assert_eq!(plan.entries(), expect.as_slice());
        assert_eq!(plan.to_string(), format!("{line}\n"));
    }

    #[test_case("pick\tabc1234 Fix bug"; "tab after verb")]
    #[test_case("pick abc1234\tFix bug"; "tab after id")]
    #[test_case("pick  abc1234 Fix bug"; "double space after verb")]
    #[test_case("pick\tabc1234\t\tFix bug"; "tabs everywhere")]
    #[test]
    fn parse_loosely_separated_line(line: &str) {
        let plan = Plan::from(line);
        let expect = vec![Entry::Action(CommitAction::new(Verb::Pick, "abc1234", "Fix bug"))];
        assert_eq!(plan.entries(), expect.as_slice());
        assert_eq!(plan.to_string(), "pick abc1234 Fix bug\n");
    }

    #[test_case("# pick abc1234 Fix bug"; "comment")]
    #[test_case("   "; "short indent")]
    #[test_case("pick"; "verb only")]
    #[test_case("pick zzzzzzz Not hex"; "bad id")]
    #[test_case("squash abc1234 Other verb"; "unknown verb")]
    #[test]
    fn parse_opaque_line(line: &str) {
        let plan = Plan::from(line);
        assert_eq!(plan.entries(), [Entry::Line(line.into())].as_slice());
    }

    #[test]
    fn render_header_block() {
        let mut plan = Plan::new();
        plan.push_action(CommitAction::undecided("abc1234", "Fix bug"));
        let header = plan.push_header("1111111", "2222222");

        assert_eq!(header.count, 1);
        let result = plan.to_string();
        let expect = indoc! {r#"
                 abc1234 Fix bug

            # Rebase 1111111..2222222 onto 1111111 (1 command)
            #
            # Commands:
            # pick <commit> = cherry-pick commit onto the current branch
            # drop <commit> = leave commit out
            # noop <commit> = commit was already applied, set by mark
            #      <commit> = not decided yet, will not be applied
            #
            # These lines are applied from top to bottom.
            # Do not reorder them, the order is the order of application.
            #
            # Only pick lines are applied. Run mark again after applying to
            # refresh noop lines.
        "#};
        assert_eq!(result, expect);
        assert_eq!(Plan::from(result.as_str()), plan);
        assert_eq!(Plan::from(result.as_str()).header(), Some(header));
    }

    #[test]
    fn header_line_parsing() -> anyhow::Result<()> {
        let header: Header = "# Rebase 1111111..2222222 onto 1111111 (12 commands)".parse()?;
        let expect = Header {
            onto: "1111111".into(),
            tip: "2222222".into(),
            count: 12,
        };
        assert_eq!(header, expect);
        assert!("# Rebase onto nothing".parse::<Header>().is_err());

        Ok(())
    }

    #[test]
    fn truncate_drops_old_header() {
        let mut plan = Plan::from(indoc! {r#"
            # my notes
            pick abc1234 Fix bug

            drop def5678 Unrelated

            # Rebase 1111111..def5678 onto 1111111 (2 commands)
            #
        "#});
        plan.truncate_after_last_action();

        let expect = indoc! {r#"
            # my notes
            pick abc1234 Fix bug

            drop def5678 Unrelated
        "#};
        assert_eq!(plan.to_string(), expect);
        assert_eq!(plan.header(), None);
    }

    #[test]
    fn truncate_without_actions_clears_plan() {
        let mut plan = Plan::from("# nothing here\n\n");
        plan.truncate_after_last_action();
        assert_eq!(plan.to_string(), "");
    }

    #[test]
    fn reset_noops_keeps_decisions() {
        let mut plan = Plan::from(indoc! {r#"
            pick abc1234 Fix bug
            noop def5678 Applied
            drop 9999999 Unrelated
            noop 1234567 Applied too
        "#});

        assert_eq!(plan.reset_noops(), 2);
        let expect = indoc! {r#"
            pick abc1234 Fix bug
                 def5678 Applied
            drop 9999999 Unrelated
                 1234567 Applied too
        "#};
        assert_eq!(plan.to_string(), expect);
        assert_eq!(plan.reset_noops(), 0);
    }

    #[test]
    fn picks_follow_file_order() {
        let plan = Plan::from(indoc! {r#"
            pick abc1234 Fix bug
            drop def5678 Unrelated
            noop 9999999 Already applied
                 7777777 Undecided
            pick 1234567 Second fix
        "#});

        let ids = plan.picks().map(|action| action.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["abc1234", "1234567"]);
        assert_eq!(plan.last_action().map(|action| action.id.as_str()), Some("1234567"));
    }
}
