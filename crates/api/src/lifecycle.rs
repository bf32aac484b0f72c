// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Game state machine.
//!
//! Every rule that moves a game between statuses, stamps or clears its
//! timestamps, or gates scoring lives here as a pure function over
//! [`GameState`]. Handlers load the row, run a transition and persist the
//! resulting state inside their transaction.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::models::{Game, GameChanges, GameStatus, SideLabel};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("cannot change points for completed/canceled game")]
    ScoringClosed,
    #[error("cannot change color for completed/canceled game")]
    ColorsLocked,
    #[error("cannot complete a canceled game")]
    CompleteCanceled,
    #[error("{0} must be >= 0")]
    NegativeScore(&'static str),
}

/// The lifecycle-relevant slice of a game row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    pub status: GameStatus,
    pub winner_side: Option<SideLabel>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<&Game> for GameState {
    fn from(game: &Game) -> Self {
        Self {
            status: game.status,
            winner_side: game.winner_side,
            started_at: game.started_at,
            ended_at: game.ended_at,
        }
    }
}

impl GameState {
    /// Changeset that writes every lifecycle column.
    pub fn into_changes(self, now: DateTime<Utc>) -> GameChanges {
        GameChanges {
            status: Some(self.status),
            winner_side: Some(self.winner_side),
            started_at: Some(self.started_at),
            ended_at: Some(self.ended_at),
            updated_at: Some(now),
            ..Default::default()
        }
    }
}

/// Explicit status update (`PUT /games/:id` with `status`).
///
/// | target        | started_at   | ended_at     | winner_side |
/// |---------------|--------------|--------------|-------------|
/// | `scheduled`   | cleared      | cleared      | cleared     |
/// | `in_progress` | set if unset | kept         | kept        |
/// | `completed`   | kept         | set if unset | kept        |
/// | `canceled`    | kept         | always now   | kept        |
///
/// Any status may be targeted, which is how a closed game is re-opened.
pub fn on_status_update(state: &GameState, target: GameStatus, now: DateTime<Utc>) -> GameState {
    let mut next = state.clone();
    next.status = target;
    match target {
        GameStatus::Scheduled => {
            next.started_at = None;
            next.ended_at = None;
            next.winner_side = None;
        }
        GameStatus::InProgress => {
            next.started_at.get_or_insert(now);
        }
        GameStatus::Completed => {
            next.ended_at.get_or_insert(now);
        }
        GameStatus::Canceled => {
            next.ended_at = Some(now);
        }
    }
    next
}

/// Gate run before any points change. A scheduled game starts on its first score.
pub fn on_score(state: &GameState, now: DateTime<Utc>) -> Result<GameState, LifecycleError> {
    match state.status {
        GameStatus::Completed | GameStatus::Canceled => Err(LifecycleError::ScoringClosed),
        GameStatus::Scheduled => Ok(on_status_update(state, GameStatus::InProgress, now)),
        GameStatus::InProgress => Ok(state.clone()),
    }
}

/// Completion with a winner. Re-completing only updates the winner.
pub fn on_complete(
    state: &GameState,
    winner: SideLabel,
    now: DateTime<Utc>,
) -> Result<GameState, LifecycleError> {
    if state.status == GameStatus::Canceled {
        return Err(LifecycleError::CompleteCanceled);
    }
    let mut next = on_status_update(state, GameStatus::Completed, now);
    next.winner_side = Some(winner);
    Ok(next)
}

pub fn ensure_colors_editable(status: GameStatus) -> Result<(), LifecycleError> {
    if status.is_final() {
        Err(LifecycleError::ColorsLocked)
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreChange {
    Add(i32),
    Set(i32),
}

impl ScoreChange {
    pub fn validate(self) -> Result<Self, LifecycleError> {
        match self {
            ScoreChange::Add(delta) if delta < 0 => Err(LifecycleError::NegativeScore("delta")),
            ScoreChange::Set(points) if points < 0 => Err(LifecycleError::NegativeScore("points")),
            ok => Ok(ok),
        }
    }

    /// New running score, never below zero.
    pub fn apply(self, current: i32) -> i32 {
        let next = match self {
            ScoreChange::Add(delta) => current.saturating_add(delta),
            ScoreChange::Set(points) => points,
        };
        next.max(0)
    }
}
