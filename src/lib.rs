// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Cherry-pick plans.
//!
//! A __plan__ is a text file listing commits of a source branch that should be
//! cherry-picked onto the current branch, one line per commit, in order of
//! application. Plans are created with [`PlanStore::make`], extended with
//! [`PlanStore::pull`], annotated with [`PlanStore::mark`], and executed with
//! [`PlanStore::apply`]. Users edit them by hand in between to decide which
//! commits to pick and which to drop.
//!
//! # See Also
//!
//! 1. [`plan`] for the file layout.
//! 2. [`detect`] for how already applied commits are found.
//! 3. [Man page git-cherry-pick](https://git-scm.com/docs/git-cherry-pick)

pub mod backend;
pub mod config;
pub mod detect;
pub mod path;
pub mod plan;
pub mod store;

pub use backend::{Backend, Git2Backend};
pub use config::Settings;
pub use detect::{PatternDetector, ProvenanceDetector};
pub use plan::{CommitAction, Plan, Verb};
pub use store::{PlanStore, PlanStoreError};
