// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Plan file management.
//!
//! The [`PlanStore`] drives the life of a plan file through four operations:
//!
//! - __make__ creates a plan listing commits of a source branch that are not
//!   in the current branch yet.
//! - __pull__ appends commits that showed up on the source branch since the
//!   plan was last built.
//! - __mark__ flags commits that were already applied as `noop`.
//! - __apply__ cherry-picks every `pick` line.
//!
//! # Commit Identity
//!
//! Plans show abbreviated commit ids, but abbreviations can collide in large
//! repositories. Whenever two commits need to be compared, both sides are
//! resolved to full ids through the backend first. An abbreviation that does
//! not resolve to exactly one commit simply never matches.
//!
//! # Apply Policy
//!
//! Commits are cherry-picked one at a time in file order. The first failure
//! stops the run, and nothing is rolled back: commits applied before the
//! failure stay applied, and the repository is left however Git left it. Fix
//! things up by hand, run mark to flag what already landed, then apply again.

use crate::{
    backend::{Backend, BackendError, Git2Backend},
    detect::{DetectError, PatternDetector, ProvenanceDetector},
    plan::{CommitAction, Plan, Verb},
};

use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Revision plans are applied onto unless told otherwise.
pub const DEFAULT_LIMIT: &str = "HEAD";

/// Plan file manager.
#[derive(Debug)]
pub struct PlanStore<B = Git2Backend, D = PatternDetector>
where
    B: Backend,
    D: ProvenanceDetector,
{
    backend: B,
    detector: D,
}

impl<B, D> PlanStore<B, D>
where
    B: Backend,
    D: ProvenanceDetector,
{
    /// Construct new plan store.
    pub fn new(backend: B, detector: D) -> Self {
        Self { backend, detector }
    }

    /// Backend plans are built from.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Create new plan file.
    ///
    /// Lists every commit reachable from `branch` but not from `limit`, oldest
    /// first, marks the ones already applied, and writes the result with a
    /// fresh header. Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// - Return [`PlanStoreError::AlreadyExists`] if plan file exists.
    /// - Return [`PlanStoreError::Backend`] if revisions cannot be listed.
    /// - Return [`PlanStoreError::Detect`] if provenance detection fails.
    /// - Return [`PlanStoreError::WritePlan`] if plan cannot be written.
    #[instrument(skip(self, path), level = "debug")]
    pub fn make(
        &self,
        branch: &str,
        limit: Option<&str>,
        path: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        let path = path.as_ref();
        if path.exists() {
            return Err(PlanStoreError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }

        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        let width = self.backend.abbrev_width()?;
        let mut plan = Plan::new();
        for commit in self.backend.commits(Some(limit), branch)? {
            plan.push_action(CommitAction::undecided(
                abbreviate(&commit.id, width),
                commit.subject,
            ));
        }

        let marked = self.mark_plan(&mut plan, branch)?;
        let onto = self.short_id(limit, width)?;
        let tip = self.short_id(branch, width)?;
        let header = plan.push_header(onto, tip);
        write_plan(path, &plan)?;

        info!(
            "created {:?} with {} commits, {marked} already applied",
            path.display(),
            header.count
        );

        Ok(path.to_path_buf())
    }

    /// Append new commits of `branch` to existing plan file.
    ///
    /// Everything after the last commit line is discarded and replaced by the
    /// new commits and a fresh header. The onto commit of the old header is
    /// kept. Returns the number of commits appended.
    ///
    /// # Errors
    ///
    /// - Return [`PlanStoreError::NotFound`] if plan file is missing.
    /// - Return [`PlanStoreError::Backend`] if revisions cannot be listed.
    /// - Return [`PlanStoreError::WritePlan`] if plan cannot be written.
    #[instrument(skip(self, path), level = "debug")]
    pub fn pull(&self, branch: &str, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let mut plan = read_plan(path)?;
        let old_header = plan.header();
        let width = self.backend.abbrev_width()?;

        // INVARIANT: Start after the last recorded commit.
        //   - Fall back to the entire history for plans without commits.
        let exclude = plan.last_action().map(|action| action.id.clone());
        debug!("pull {branch} after {exclude:?}");
        plan.truncate_after_last_action();

        let commits = self.backend.commits(exclude.as_deref(), branch)?;
        for commit in &commits {
            let action = CommitAction::undecided(abbreviate(&commit.id, width), &commit.subject);
            info!("{action}");
            plan.push_action(action);
        }

        let onto = match old_header {
            Some(header) => header.onto,
            None => self.short_id(DEFAULT_LIMIT, width)?,
        };
        let tip = self.short_id(branch, width)?;
        plan.push_header(onto, tip);
        write_plan(path, &plan)?;

        Ok(commits.len())
    }

    /// Refresh `noop` lines of existing plan file.
    ///
    /// Every `noop` line goes back to undecided first. Then every undecided
    /// line whose commit was already applied becomes `noop`. Lines marked
    /// `pick` or `drop` are left alone. When `branch` is not given, the source
    /// tip recorded in the header is used. Returns the number of lines marked.
    ///
    /// # Errors
    ///
    /// - Return [`PlanStoreError::NotFound`] if plan file is missing.
    /// - Return [`PlanStoreError::MissingHeader`] if no branch was given and
    ///   plan has no header.
    /// - Return [`PlanStoreError::Detect`] if provenance detection fails.
    /// - Return [`PlanStoreError::WritePlan`] if plan cannot be written.
    #[instrument(skip(self, path), level = "debug")]
    pub fn mark(&self, path: impl AsRef<Path>, branch: Option<&str>) -> Result<usize> {
        let path = path.as_ref();
        let mut plan = read_plan(path)?;
        let reset = plan.reset_noops();
        debug!("reset {reset} noop lines");

        let branch = match branch {
            Some(branch) => branch.to_string(),
            None => plan
                .header()
                .map(|header| header.tip)
                .ok_or_else(|| PlanStoreError::MissingHeader {
                    path: path.to_path_buf(),
                })?,
        };

        let marked = self.mark_plan(&mut plan, &branch)?;
        write_plan(path, &plan)?;
        info!("marked {marked} commits in {:?} as applied", path.display());

        Ok(marked)
    }

    /// Cherry-pick every `pick` line of existing plan file.
    ///
    /// Stops at the first failure without attempting later lines. Returns the
    /// number of commits applied.
    ///
    /// # Errors
    ///
    /// - Return [`PlanStoreError::NotFound`] if plan file is missing.
    /// - Return [`PlanStoreError::ApplyFailure`] if a commit cannot be
    ///   resolved or cherry-picked.
    #[instrument(skip(self, path), level = "debug")]
    pub fn apply(&self, path: impl AsRef<Path>) -> Result<usize> {
        let plan = read_plan(path.as_ref())?;
        let picks = plan.picks().collect::<Vec<_>>();
        if picks.is_empty() {
            warn!("nothing to apply in {:?}", path.as_ref().display());
        }

        for action in &picks {
            info!("apply {action}");
            self.backend
                .resolve(&action.id)
                .and_then(|id| id.ok_or_else(|| BackendError::UnknownRevision(action.id.clone())))
                .and_then(|id| self.backend.cherry_pick(&id))
                .map_err(|source| PlanStoreError::ApplyFailure {
                    commit: action.id.clone(),
                    source,
                })?;
        }

        info!("applied {} commits", picks.len());

        Ok(picks.len())
    }

    fn mark_plan(&self, plan: &mut Plan, branch: &str) -> Result<usize> {
        let applied = self.detector.applied(&self.backend, DEFAULT_LIMIT, branch)?;
        if applied.is_empty() {
            return Ok(0);
        }

        let mut marked = 0;
        for action in plan
            .actions_mut()
            .filter(|action| action.verb == Verb::Undecided)
        {
            match self.backend.resolve(&action.id)? {
                Some(id) if applied.contains(&id) => {
                    debug!("mark {} as applied", action.id);
                    action.verb = Verb::Noop;
                    marked += 1;
                }
                Some(_) => continue,
                None => debug!("skip unresolvable commit {:?}", action.id),
            }
        }

        Ok(marked)
    }

    fn short_id(&self, rev: &str, width: usize) -> Result<String> {
        let id = self
            .backend
            .resolve(rev)?
            .ok_or_else(|| BackendError::UnknownRevision(rev.into()))?;

        Ok(abbreviate(&id, width))
    }
}

fn abbreviate(id: &str, width: usize) -> String {
    id.chars().take(width).collect()
}

fn read_plan(path: &Path) -> Result<Plan> {
    if !path.exists() {
        return Err(PlanStoreError::NotFound {
            path: path.to_path_buf(),
        });
    }

    read_to_string(path)
        .map(Plan::from)
        .map_err(|err| PlanStoreError::ReadPlan {
            source: err,
            path: path.to_path_buf(),
        })
}

fn write_plan(path: &Path, plan: &Plan) -> Result<()> {
    // INVARIANT: Create parent directories if needed.
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        mkdirp::mkdirp(parent).map_err(|err| PlanStoreError::WritePlan {
            source: err,
            path: path.to_path_buf(),
        })?;
    }

    write(path, plan.to_string().as_bytes()).map_err(|err| PlanStoreError::WritePlan {
        source: err,
        path: path.to_path_buf(),
    })
}

/// Plan store error types.
#[derive(Debug, thiserror::Error)]
pub enum PlanStoreError {
    /// Plan file to create already exists.
    #[error("plan {:?} already exists", path.display())]
    AlreadyExists { path: PathBuf },

    /// Plan file to use does not exist.
    #[error("plan {:?} does not exist", path.display())]
    NotFound { path: PathBuf },

    /// Plan has no header to derive source branch from.
    #[error("plan {:?} has no header, name the source branch explicitly", path.display())]
    MissingHeader { path: PathBuf },

    /// Commit of a pick line cannot be applied.
    #[error("failed to apply commit {commit}")]
    ApplyFailure {
        commit: String,
        #[source]
        source: BackendError,
    },

    /// Plan file cannot be read from.
    #[error("failed to read plan at {:?}", path.display())]
    ReadPlan {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Plan file cannot be written to.
    #[error("failed to write plan at {:?}", path.display())]
    WritePlan {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Provenance detection fails.
    #[error(transparent)]
    Detect(#[from] DetectError),

    /// Backend operations fail.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Friendly result alias :3
pub type Result<T, E = PlanStoreError> = std::result::Result<T, E>;
