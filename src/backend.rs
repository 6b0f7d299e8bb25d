// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version control backend.
//!
//! Everything pickplan needs to know about commits, branches, and
//! configuration goes through the [`Backend`] trait. Plan logic never touches
//! Git directly, which keeps it testable against an in-memory fake.
//!
//! The default backend, [`Git2Backend`], reads history through libgit2. Some
//! things libgit2 either cannot do or does differently from the Git binary.
//! Cherry-picking with provenance recording (`git cherry-pick -x`) is the
//! big one, so those operations shell out to `git` instead.

use git2::{ErrorCode, Oid, Repository, Sort};
use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, info, instrument};

/// Smallest abbreviation width Git will ever hand out.
pub const MIN_ABBREV: usize = 7;

/// Commit as listed by a backend.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Full commit id.
    pub id: String,

    /// Subject line of commit message.
    pub subject: String,
}

impl CommitInfo {
    /// Construct new commit listing.
    pub fn new(id: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
        }
    }
}

/// Version control operations that plans are built from.
pub trait Backend {
    /// Name of currently checked out branch.
    fn current_branch(&self) -> Result<String>;

    /// Width used for abbreviated commit ids.
    fn abbrev_width(&self) -> Result<usize>;

    /// Resolve revision to full commit id.
    ///
    /// Returns `None` if the revision does not exist, or is ambiguous.
    fn resolve(&self, rev: &str) -> Result<Option<String>>;

    /// Commits reachable from `include` but not from `exclude`, oldest first.
    ///
    /// Lists the entire history of `include` when `exclude` is `None`.
    fn commits(&self, exclude: Option<&str>, include: &str) -> Result<Vec<CommitInfo>>;

    /// Full commit messages on either side of `left...right`.
    ///
    /// Covers commits reachable from one revision but not the other, i.e.,
    /// everything since their merge base.
    fn messages(&self, left: &str, right: &str) -> Result<Vec<String>>;

    /// Cherry-pick commit onto current branch while recording its origin.
    fn cherry_pick(&self, id: &str) -> Result<()>;

    /// Single valued configuration setting.
    fn config_value(&self, key: &str) -> Result<Option<String>>;

    /// Multi valued configuration setting.
    fn config_values(&self, key: &str) -> Result<Vec<String>>;
}

/// Backend through libgit2 and the Git binary.
pub struct Git2Backend {
    repository: Repository,
}

impl Git2Backend {
    /// Construct new backend from an opened repository.
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Open repository containing target path.
    ///
    /// Searches parent directories like Git itself does.
    ///
    /// # Errors
    ///
    /// - Return [`BackendError::Git2`] if no repository can be found.
    #[instrument(skip(path), level = "debug")]
    pub fn discover(path: impl AsRef<Path>) -> Result<Self> {
        debug!("discover repository from {:?}", path.as_ref().display());
        Ok(Self::new(Repository::discover(path.as_ref())?))
    }

    fn peel(&self, rev: &str) -> Result<Oid> {
        Ok(self.repository.revparse_single(rev)?.peel_to_commit()?.id())
    }

    fn workdir(&self) -> PathBuf {
        self.repository
            .workdir()
            .unwrap_or_else(|| self.repository.path())
            .to_path_buf()
    }

    fn expand_bin_args(
        &self,
        args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Vec<OsString> {
        let mut bin_args: Vec<OsString> = vec!["-C".into(), self.workdir().into_os_string()];
        bin_args.extend(args.into_iter().map(Into::into));
        bin_args
    }
}

impl Backend for Git2Backend {
    fn current_branch(&self) -> Result<String> {
        let head = self.repository.head()?;
        if !head.is_branch() {
            return Err(BackendError::DetachedHead);
        }

        head.shorthand()
            .map(ToString::to_string)
            .ok_or(BackendError::DetachedHead)
    }

    fn abbrev_width(&self) -> Result<usize> {
        let config = self.repository.config()?;

        // INVARIANT: Prefer core.abbrev when it is an actual number.
        //   - Values like "auto" or "no" fall through to libgit2's own guess.
        if let Ok(width) = config.get_i32("core.abbrev") {
            if let Ok(width) = usize::try_from(width) {
                return Ok(width.clamp(4, 40));
            }
        }

        let head = self.repository.head()?.peel_to_commit()?;
        let width = match head.as_object().short_id() {
            Ok(short) => short.as_str().map_or(MIN_ABBREV, str::len),
            Err(error) => {
                debug!("cannot abbreviate HEAD: {error}");
                MIN_ABBREV
            }
        };

        Ok(width.max(MIN_ABBREV))
    }

    fn resolve(&self, rev: &str) -> Result<Option<String>> {
        match self.peel(rev) {
            Ok(oid) => Ok(Some(oid.to_string())),
            Err(BackendError::Git2(error))
                if matches!(
                    error.code(),
                    ErrorCode::NotFound | ErrorCode::Ambiguous | ErrorCode::InvalidSpec
                ) =>
            {
                debug!("cannot resolve {rev:?}: {error}");
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    #[instrument(skip(self), level = "debug")]
    fn commits(&self, exclude: Option<&str>, include: &str) -> Result<Vec<CommitInfo>> {
        let mut walk = self.repository.revwalk()?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
        walk.push(self.peel(include)?)?;
        if let Some(exclude) = exclude {
            walk.hide(self.peel(exclude)?)?;
        }

        let mut commits = Vec::new();
        for oid in walk {
            let commit = self.repository.find_commit(oid?)?;
            commits.push(CommitInfo::new(
                commit.id().to_string(),
                commit.summary().unwrap_or_default(),
            ));
        }

        Ok(commits)
    }

    #[instrument(skip(self), level = "debug")]
    fn messages(&self, left: &str, right: &str) -> Result<Vec<String>> {
        let left = self.peel(left)?;
        let right = self.peel(right)?;

        let mut walk = self.repository.revwalk()?;
        walk.push(left)?;
        walk.push(right)?;
        match self.repository.merge_base(left, right) {
            Ok(base) => walk.hide(base)?,
            Err(error) if error.code() == ErrorCode::NotFound => {
                debug!("no merge base between {left} and {right}");
            }
            Err(error) => return Err(error.into()),
        }

        let mut messages = Vec::new();
        for oid in walk {
            let commit = self.repository.find_commit(oid?)?;
            messages.push(String::from_utf8_lossy(commit.message_bytes()).into_owned());
        }

        Ok(messages)
    }

    #[instrument(skip(self), level = "debug")]
    fn cherry_pick(&self, id: &str) -> Result<()> {
        let output =
            syscall_non_interactive("git", self.expand_bin_args(["cherry-pick", "-x", id]))?;
        if !output.is_empty() {
            info!("{output}");
        }

        Ok(())
    }

    fn config_value(&self, key: &str) -> Result<Option<String>> {
        match self.repository.config()?.get_string(key) {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.code() == ErrorCode::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn config_values(&self, key: &str) -> Result<Vec<String>> {
        // INVARIANT: Exit status 1 only means that the key is not set.
        let output = Command::new("git")
            .args(self.expand_bin_args(["config", "--get-all", key]))
            .output()?;
        if output.status.code() == Some(1) {
            return Ok(Vec::new());
        }

        if !output.status.success() {
            return Err(BackendError::Syscall(std::io::Error::other(format!(
                "command \"git config --get-all {key}\" failed:\n{}",
                String::from_utf8_lossy(output.stderr.as_slice())
            ))));
        }

        Ok(String::from_utf8_lossy(output.stdout.as_slice())
            .lines()
            .map(str::to_owned)
            .collect())
    }
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<String> {
    let output = Command::new(cmd.as_ref()).args(args).output()?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(format!("stdout: {stdout}").as_str());
    }

    if !stderr.is_empty() {
        message.push_str(format!("stderr: {stderr}").as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    let message = message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message);

    if !output.status.success() {
        return Err(BackendError::Syscall(std::io::Error::other(format!(
            "command {:?} failed:\n{message}",
            cmd.as_ref()
        ))));
    }

    Ok(message)
}

/// Version control backend error types.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// HEAD does not point at a branch.
    #[error("HEAD is detached, cannot determine current branch")]
    DetachedHead,

    /// Revision does not name exactly one commit.
    #[error("revision {0:?} does not name exactly one commit")]
    UnknownRevision(String),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),

    /// Calls to the Git binary fail.
    #[error(transparent)]
    Syscall(#[from] std::io::Error),
}

/// Friendly result alias :3
pub type Result<T, E = BackendError> = std::result::Result<T, E>;

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory backend for testing plan logic without a repository.

    use super::*;
    use std::{
        cell::RefCell,
        collections::{HashMap, HashSet},
    };

    /// Pad a short hex prefix out to a full commit id.
    pub(crate) fn full(prefix: &str) -> String {
        format!("{prefix:0<40}")
    }

    #[derive(Debug, Clone)]
    pub(crate) struct FakeCommit {
        pub(crate) id: String,
        pub(crate) subject: String,
        pub(crate) message: String,
    }

    /// Linear branches keyed by name, each listed oldest first.
    #[derive(Debug, Default)]
    pub(crate) struct FakeBackend {
        pub(crate) head: String,
        pub(crate) width: usize,
        pub(crate) branches: RefCell<HashMap<String, Vec<FakeCommit>>>,
        pub(crate) config: HashMap<String, Vec<String>>,
        pub(crate) failing: HashSet<String>,
        pub(crate) picked: RefCell<Vec<String>>,
    }

    impl FakeBackend {
        pub(crate) fn new(head: &str) -> Self {
            let backend = Self {
                head: head.into(),
                width: MIN_ABBREV,
                ..Default::default()
            };
            backend.branches.borrow_mut().insert(head.into(), Vec::new());
            backend
        }

        /// Add commit to branch. Branch is forked from HEAD if it is new.
        pub(crate) fn commit(&self, branch: &str, prefix: &str, subject: &str) -> String {
            self.commit_with_message(branch, prefix, subject, subject)
        }

        pub(crate) fn commit_with_message(
            &self,
            branch: &str,
            prefix: &str,
            subject: &str,
            message: &str,
        ) -> String {
            let id = full(prefix);
            let mut branches = self.branches.borrow_mut();
            let base = branches.get(&self.head).cloned().unwrap_or_default();
            branches
                .entry(branch.into())
                .or_insert(base)
                .push(FakeCommit {
                    id: id.clone(),
                    subject: subject.into(),
                    message: message.into(),
                });
            id
        }

        pub(crate) fn picked(&self) -> Vec<String> {
            self.picked.borrow().clone()
        }

        fn all_ids(&self) -> HashSet<String> {
            self.branches
                .borrow()
                .values()
                .flatten()
                .map(|commit| commit.id.clone())
                .collect()
        }

        fn history(&self, rev: &str) -> Result<Vec<FakeCommit>> {
            let rev = if rev == "HEAD" { self.head.as_str() } else { rev };
            let branches = self.branches.borrow();
            if let Some(commits) = branches.get(rev) {
                return Ok(commits.clone());
            }

            let id = self
                .resolve(rev)?
                .ok_or_else(|| BackendError::UnknownRevision(rev.into()))?;
            for commits in branches.values() {
                if let Some(index) = commits.iter().position(|commit| commit.id == id) {
                    return Ok(commits[..=index].to_vec());
                }
            }

            Err(BackendError::UnknownRevision(rev.into()))
        }
    }

    impl Backend for FakeBackend {
        fn current_branch(&self) -> Result<String> {
            Ok(self.head.clone())
        }

        fn abbrev_width(&self) -> Result<usize> {
            Ok(self.width)
        }

        fn resolve(&self, rev: &str) -> Result<Option<String>> {
            let rev = if rev == "HEAD" { self.head.as_str() } else { rev };
            if let Some(commits) = self.branches.borrow().get(rev) {
                return Ok(commits.last().map(|commit| commit.id.clone()));
            }

            let matches = self
                .all_ids()
                .into_iter()
                .filter(|id| id.starts_with(rev))
                .collect::<Vec<_>>();
            match matches.as_slice() {
                [id] => Ok(Some(id.clone())),
                _ => Ok(None),
            }
        }

        fn commits(&self, exclude: Option<&str>, include: &str) -> Result<Vec<CommitInfo>> {
            let hidden = match exclude {
                Some(exclude) => self
                    .history(exclude)?
                    .into_iter()
                    .map(|commit| commit.id)
                    .collect::<HashSet<_>>(),
                None => HashSet::new(),
            };

            Ok(self
                .history(include)?
                .into_iter()
                .filter(|commit| !hidden.contains(&commit.id))
                .map(|commit| CommitInfo::new(commit.id, commit.subject))
                .collect())
        }

        fn messages(&self, left: &str, right: &str) -> Result<Vec<String>> {
            let left = self.history(left)?;
            let right = self.history(right)?;
            let left_ids = left.iter().map(|c| c.id.clone()).collect::<HashSet<_>>();
            let right_ids = right.iter().map(|c| c.id.clone()).collect::<HashSet<_>>();

            Ok(left
                .iter()
                .filter(|commit| !right_ids.contains(&commit.id))
                .chain(right.iter().filter(|commit| !left_ids.contains(&commit.id)))
                .map(|commit| commit.message.clone())
                .collect())
        }

        fn cherry_pick(&self, id: &str) -> Result<()> {
            self.picked.borrow_mut().push(id.into());
            if self.failing.contains(id) {
                return Err(BackendError::Syscall(std::io::Error::other(format!(
                    "could not apply {id}"
                ))));
            }

            let copy = format!("{:x}", self.picked.borrow().len() + 0xf00);
            let message = format!("picked\n\n(cherry picked from commit {id})");
            self.commit_with_message(&self.head.clone(), &copy, "picked", &message);

            Ok(())
        }

        fn config_value(&self, key: &str) -> Result<Option<String>> {
            Ok(self
                .config
                .get(key)
                .and_then(|values| values.last())
                .cloned())
        }

        fn config_values(&self, key: &str) -> Result<Vec<String>> {
            Ok(self.config.get(key).cloned().unwrap_or_default())
        }
    }
}
