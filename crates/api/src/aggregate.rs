// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Standings and statistics over completed games.
//!
//! Nothing in here touches the store. [`crate::db::queries`] loads the
//! completed-game history into [`CompletedGame`] values and the functions
//! in the submodules fold it into ranked rows.

use crate::db::models::{DiscColor, GameStatus, MatchType, SideLabel};

mod duplicates;
mod player_standings;
mod season_stats;
mod team_standings;

pub use duplicates::{DuplicateGameRow, duplicate_games};
pub use player_standings::{
    CursorError, PlayerStandingsPage, PlayerStandingsRow, STANDINGS_DEFAULT_LIMIT,
    StandingsCursor, clamp_limit, player_standings,
};
pub use season_stats::{PlayerStatsRow, TeamStatsRow, player_stats, team_stats};
pub use team_standings::{TeamStandingsRow, team_standings};

/// Team as seen from a game side, including its two members.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamRef {
    pub id: i64,
    pub name: String,
    pub player_a_id: i64,
    pub player_b_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SideRecord {
    pub side: SideLabel,
    pub color: DiscColor,
    pub points: i32,
    pub player_id: Option<i64>,
    pub team: Option<TeamRef>,
}

impl SideRecord {
    /// Players credited through this side: the direct player, or both team members.
    pub fn credited_players(&self) -> Vec<i64> {
        let mut out = Vec::with_capacity(2);
        if let Some(player_id) = self.player_id {
            out.push(player_id);
        }
        if let Some(team) = &self.team {
            out.push(team.player_a_id);
            out.push(team.player_b_id);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedGame {
    pub id: i64,
    pub season_id: Option<i64>,
    pub match_type: MatchType,
    pub status: GameStatus,
    pub winner_side: Option<SideLabel>,
    pub location: Option<String>,
    /// Ordered A then B.
    pub sides: Vec<SideRecord>,
}

impl CompletedGame {
    pub fn side(&self, label: SideLabel) -> Option<&SideRecord> {
        self.sides.iter().find(|s| s.side == label)
    }

    pub fn opponent_points(&self, label: SideLabel) -> Option<i32> {
        self.side(label.opponent()).map(|s| s.points)
    }

    pub(crate) fn outcome_for(&self, label: SideLabel) -> Outcome {
        match self.winner_side {
            Some(winner) if winner == label => Outcome::Win,
            Some(_) => Outcome::Loss,
            None => Outcome::Undecided,
        }
    }

    /// One entry per player, first side that reaches them wins.
    pub(crate) fn player_credits(&self) -> Vec<(i64, &SideRecord)> {
        let mut credits: Vec<(i64, &SideRecord)> = Vec::new();
        for side in &self.sides {
            for player_id in side.credited_players() {
                if !credits.iter().any(|(seen, _)| *seen == player_id) {
                    credits.push((player_id, side));
                }
            }
        }
        credits
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Win,
    Loss,
    Undecided,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ColorSplit {
    pub white: i64,
    pub black: i64,
    pub natural: i64,
}

impl ColorSplit {
    pub fn bump(&mut self, color: DiscColor) {
        match color {
            DiscColor::White => self.white += 1,
            DiscColor::Black => self.black += 1,
            DiscColor::Natural => self.natural += 1,
        }
    }
}

pub(crate) fn ratio(num: f64, games: i64) -> f64 {
    if games == 0 { 0.0 } else { num / games as f64 }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn team(id: i64, name: &str, a: i64, b: i64) -> TeamRef {
        TeamRef {
            id,
            name: name.to_string(),
            player_a_id: a,
            player_b_id: b,
        }
    }

    pub fn player_side(side: SideLabel, player_id: i64, points: i32, color: DiscColor) -> SideRecord {
        SideRecord {
            side,
            color,
            points,
            player_id: Some(player_id),
            team: None,
        }
    }

    pub fn team_side(side: SideLabel, team: TeamRef, points: i32, color: DiscColor) -> SideRecord {
        SideRecord {
            side,
            color,
            points,
            player_id: None,
            team: Some(team),
        }
    }

    pub fn game(
        id: i64,
        match_type: MatchType,
        winner: Option<SideLabel>,
        location: Option<&str>,
        sides: Vec<SideRecord>,
    ) -> CompletedGame {
        CompletedGame {
            id,
            season_id: Some(1),
            match_type,
            status: GameStatus::Completed,
            winner_side: winner,
            location: location.map(str::to_string),
            sides,
        }
    }

    pub fn singles(id: i64, a: (i64, i32), b: (i64, i32), winner: Option<SideLabel>) -> CompletedGame {
        game(
            id,
            MatchType::Players,
            winner,
            None,
            vec![
                player_side(SideLabel::A, a.0, a.1, DiscColor::White),
                player_side(SideLabel::B, b.0, b.1, DiscColor::Black),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_player_credited_once_per_game() {
        // Player 1 is on the side A team and plays directly on side B.
        let game = game(
            7,
            MatchType::Teams,
            Some(SideLabel::A),
            None,
            vec![
                team_side(SideLabel::A, team(1, "Alpha", 1, 2), 100, DiscColor::White),
                player_side(SideLabel::B, 1, 40, DiscColor::Black),
            ],
        );
        let credits = game.player_credits();
        assert_eq!(credits.len(), 2);
        assert_eq!(credits[0].0, 1);
        assert_eq!(credits[0].1.side, SideLabel::A);
        assert_eq!(credits[1].0, 2);
    }

    #[test]
    fn test_outcomes() {
        let g = singles(1, (1, 100), (2, 60), Some(SideLabel::B));
        assert_eq!(g.outcome_for(SideLabel::B), Outcome::Win);
        assert_eq!(g.outcome_for(SideLabel::A), Outcome::Loss);
        let undecided = singles(2, (1, 100), (2, 60), None);
        assert_eq!(undecided.outcome_for(SideLabel::A), Outcome::Undecided);
        assert_eq!(g.opponent_points(SideLabel::A), Some(60));
    }
}
