// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::cmp::Ordering;
use std::collections::BTreeMap;

use base64::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{CompletedGame, Outcome, ratio};

pub const STANDINGS_DEFAULT_LIMIT: i64 = 50;
const STANDINGS_MAX_LIMIT: i64 = 200;

/// Keyset position after the last returned row.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandingsCursor {
    pub wins: i64,
    pub point_diff: i64,
    pub player_id: i64,
}

#[derive(Error, Debug)]
pub enum CursorError {
    #[error("Base64 decoding error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Cursor parsing error: {0}")]
    Parsing(#[from] serde_json::Error),
}

impl StandingsCursor {
    pub fn encode(&self) -> String {
        // Three integer fields cannot fail to serialize.
        let json = serde_json::to_vec(self).unwrap_or_default();
        BASE64_URL_SAFE.encode(json)
    }

    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let bytes = BASE64_URL_SAFE.decode(token.trim())?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Whether `row` sorts strictly after this cursor.
    fn admits(&self, row: &PlayerStandingsRow) -> bool {
        row.wins < self.wins
            || (row.wins == self.wins && row.point_diff < self.point_diff)
            || (row.wins == self.wins
                && row.point_diff == self.point_diff
                && row.player_id > self.player_id)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStandingsRow {
    pub player_id: i64,
    pub games: i64,
    pub wins: i64,
    pub losses: i64,
    pub points_for: i64,
    pub points_against: i64,
    pub point_diff: i64,
    pub win_pct: f64,
    pub rank: i64,
}

impl PlayerStandingsRow {
    fn empty(player_id: i64) -> Self {
        Self {
            player_id,
            games: 0,
            wins: 0,
            losses: 0,
            points_for: 0,
            points_against: 0,
            point_diff: 0,
            win_pct: 0.0,
            rank: 0,
        }
    }

    fn cursor(&self) -> StandingsCursor {
        StandingsCursor {
            wins: self.wins,
            point_diff: self.point_diff,
            player_id: self.player_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStandingsPage {
    pub rows: Vec<PlayerStandingsRow>,
    pub next_cursor: Option<StandingsCursor>,
}

/// `None` and out-of-range values are pulled into `1..=200`.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(STANDINGS_DEFAULT_LIMIT)
        .clamp(1, STANDINGS_MAX_LIMIT)
}

/// One page of the player table.
///
/// `roster` lists players that must appear even without games (active
/// team-season members). Everyone credited in `games` is added to it.
/// Ranks restart at 1 on every page.
pub fn player_standings(
    games: &[CompletedGame],
    roster: &[i64],
    limit: i64,
    cursor: Option<&StandingsCursor>,
) -> PlayerStandingsPage {
    let mut by_player: BTreeMap<i64, PlayerStandingsRow> = roster
        .iter()
        .map(|&id| (id, PlayerStandingsRow::empty(id)))
        .collect();

    for game in games {
        for (player_id, side) in game.player_credits() {
            let Some(against) = game.opponent_points(side.side) else {
                continue;
            };
            let row = by_player
                .entry(player_id)
                .or_insert_with(|| PlayerStandingsRow::empty(player_id));
            row.games += 1;
            match game.outcome_for(side.side) {
                Outcome::Win => row.wins += 1,
                Outcome::Loss => row.losses += 1,
                Outcome::Undecided => {}
            }
            row.points_for += i64::from(side.points);
            row.points_against += i64::from(against);
        }
    }

    let mut rows: Vec<PlayerStandingsRow> = by_player
        .into_values()
        .map(|mut row| {
            row.point_diff = row.points_for - row.points_against;
            row.win_pct = ratio(row.wins as f64, row.games);
            row
        })
        .filter(|row| cursor.is_none_or(|c| c.admits(row)))
        .collect();
    rows.sort_by(standings_order);

    let limit = clamp_limit(Some(limit)) as usize;
    let has_more = rows.len() > limit;
    rows.truncate(limit);
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i as i64 + 1;
    }

    let next_cursor = if has_more {
        rows.last().map(PlayerStandingsRow::cursor)
    } else {
        None
    };
    PlayerStandingsPage { rows, next_cursor }
}

fn standings_order(a: &PlayerStandingsRow, b: &PlayerStandingsRow) -> Ordering {
    b.wins
        .cmp(&a.wins)
        .then(b.point_diff.cmp(&a.point_diff))
        .then(a.player_id.cmp(&b.player_id))
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::db::models::{DiscColor, MatchType, SideLabel};

    #[test]
    fn test_roster_players_without_games_listed() {
        let games = vec![singles(1, (1, 100), (2, 40), Some(SideLabel::A))];
        let page = player_standings(&games, &[1, 5], 50, None);
        let ids: Vec<i64> = page.rows.iter().map(|r| r.player_id).collect();
        assert_eq!(ids, vec![1, 5, 2]);

        let idle = &page.rows[1];
        assert_eq!(idle.games, 0);
        assert_eq!(idle.win_pct, 0.0);
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn test_team_games_credit_both_members() {
        let games = vec![game(
            1,
            MatchType::Teams,
            Some(SideLabel::B),
            None,
            vec![
                team_side(SideLabel::A, team(1, "Alpha", 1, 2), 70, DiscColor::White),
                team_side(SideLabel::B, team(2, "Bravo", 3, 4), 100, DiscColor::Black),
            ],
        )];
        let page = player_standings(&games, &[], 50, None);
        let ids: Vec<i64> = page.rows.iter().map(|r| r.player_id).collect();
        assert_eq!(ids, vec![3, 4, 1, 2]);
        assert_eq!(page.rows[0].points_for, 100);
        assert_eq!(page.rows[0].points_against, 70);
        assert_eq!(page.rows[2].losses, 1);
        assert_eq!(page.rows[2].point_diff, -30);
    }

    #[test]
    fn test_game_without_winner_is_neither_win_nor_loss() {
        let games = vec![singles(1, (1, 50), (2, 50), None)];
        let page = player_standings(&games, &[], 50, None);
        for row in &page.rows {
            assert_eq!((row.games, row.wins, row.losses), (1, 0, 0));
        }
    }

    #[test]
    fn test_cursor_pages_do_not_repeat() {
        // Ten players, varying wins and diffs.
        let mut games = Vec::new();
        for i in 0..10 {
            let winner = 100 + i;
            games.push(singles(i, (winner, 100), (200 + i % 3, 50 + i as i32), Some(SideLabel::A)));
        }
        let roster: Vec<i64> = (300..305).collect();
        let full = player_standings(&games, &roster, 200, None);

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = player_standings(&games, &roster, 4, cursor.as_ref());
            assert!(page.rows.len() <= 4);
            assert_eq!(page.rows.first().map(|r| r.rank), Some(1));
            seen.extend(page.rows.iter().map(|r| r.player_id));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        let expected: Vec<i64> = full.rows.iter().map(|r| r.player_id).collect();
        assert_eq!(seen, expected);
        let mut deduped = seen.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), seen.len());
    }

    #[test]
    fn test_exact_page_has_no_cursor() {
        let games = vec![singles(1, (1, 100), (2, 40), Some(SideLabel::A))];
        let page = player_standings(&games, &[], 2, None);
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.next_cursor, None);

        let page = player_standings(&games, &[], 1, None);
        assert_eq!(
            page.next_cursor,
            Some(StandingsCursor {
                wins: 1,
                point_diff: 60,
                player_id: 1
            })
        );
    }

    #[test]
    fn test_cursor_token_round_trip() {
        let cursor = StandingsCursor {
            wins: 3,
            point_diff: -12,
            player_id: 42,
        };
        let token = cursor.encode();
        assert_eq!(StandingsCursor::decode(&token).unwrap(), cursor);
        assert!(StandingsCursor::decode("not a cursor").is_err());
        let wrong_shape = BASE64_URL_SAFE.encode(br#"{"wins":1}"#);
        assert!(StandingsCursor::decode(&wrong_shape).is_err());
    }

    #[test]
    fn test_limit_clamping() {
        assert_eq!(clamp_limit(None), 50);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(-3)), 1);
        assert_eq!(clamp_limit(Some(500)), 200);
        assert_eq!(clamp_limit(Some(25)), 25);
    }
}
