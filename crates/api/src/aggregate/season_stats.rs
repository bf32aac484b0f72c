// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::{ColorSplit, CompletedGame, Outcome, SideRecord, ratio};
use crate::db::models::MatchType;

const UNKNOWN_LOCATION: &str = "Unknown";

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatsRow {
    pub player_id: i64,
    pub games: i64,
    pub wins: i64,
    pub losses: i64,
    pub win_pct: f64,
    pub white_wins: i64,
    pub black_wins: i64,
    pub natural_wins: i64,
    pub white_games: i64,
    pub black_games: i64,
    pub natural_games: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamStatsRow {
    pub team_id: i64,
    pub games: i64,
    pub wins: i64,
    pub losses: i64,
    pub win_pct: f64,
    pub white_wins: i64,
    pub black_wins: i64,
    pub natural_wins: i64,
    pub white_games: i64,
    pub black_games: i64,
    pub natural_games: i64,
    pub best_location: Option<String>,
    pub best_location_wins: i64,
}

#[derive(Default)]
struct Tally {
    games: i64,
    wins: i64,
    losses: i64,
    color_games: ColorSplit,
    color_wins: ColorSplit,
}

impl Tally {
    fn record(&mut self, game: &CompletedGame, side: &SideRecord) -> Outcome {
        let outcome = game.outcome_for(side.side);
        self.games += 1;
        self.color_games.bump(side.color);
        match outcome {
            Outcome::Win => {
                self.wins += 1;
                self.color_wins.bump(side.color);
            }
            Outcome::Loss => self.losses += 1,
            Outcome::Undecided => {}
        }
        outcome
    }

    fn win_pct(&self) -> f64 {
        ratio(self.wins as f64, self.games)
    }
}

/// Per-player breakdown for one season, team games credit both members.
pub fn player_stats(games: &[CompletedGame]) -> Vec<PlayerStatsRow> {
    let mut tallies: BTreeMap<i64, Tally> = BTreeMap::new();
    for game in games {
        for (player_id, side) in game.player_credits() {
            tallies.entry(player_id).or_default().record(game, side);
        }
    }

    let mut rows: Vec<PlayerStatsRow> = tallies
        .into_iter()
        .map(|(player_id, t)| PlayerStatsRow {
            player_id,
            games: t.games,
            wins: t.wins,
            losses: t.losses,
            win_pct: t.win_pct(),
            white_wins: t.color_wins.white,
            black_wins: t.color_wins.black,
            natural_wins: t.color_wins.natural,
            white_games: t.color_games.white,
            black_games: t.color_games.black,
            natural_games: t.color_games.natural,
        })
        .collect();
    rows.sort_by(|a, b| stats_order((a.win_pct, a.games, a.player_id), (b.win_pct, b.games, b.player_id)));
    rows
}

/// Per-team breakdown for one season's team games.
pub fn team_stats(games: &[CompletedGame]) -> Vec<TeamStatsRow> {
    let mut tallies: BTreeMap<i64, (Tally, HashMap<String, i64>)> = BTreeMap::new();
    for game in games.iter().filter(|g| g.match_type == MatchType::Teams) {
        for side in &game.sides {
            let Some(team) = &side.team else { continue };
            let (tally, wins_at) = tallies.entry(team.id).or_default();
            if tally.record(game, side) == Outcome::Win {
                let location = game
                    .location
                    .as_deref()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .unwrap_or(UNKNOWN_LOCATION);
                *wins_at.entry(location.to_string()).or_default() += 1;
            }
        }
    }

    let mut rows: Vec<TeamStatsRow> = tallies
        .into_iter()
        .map(|(team_id, (t, wins_at))| {
            let best = best_location(wins_at);
            TeamStatsRow {
                team_id,
                games: t.games,
                wins: t.wins,
                losses: t.losses,
                win_pct: t.win_pct(),
                white_wins: t.color_wins.white,
                black_wins: t.color_wins.black,
                natural_wins: t.color_wins.natural,
                white_games: t.color_games.white,
                black_games: t.color_games.black,
                natural_games: t.color_games.natural,
                best_location_wins: best.as_ref().map_or(0, |(_, wins)| *wins),
                best_location: best.map(|(location, _)| location),
            }
        })
        .collect();
    rows.sort_by(|a, b| stats_order((a.win_pct, a.games, a.team_id), (b.win_pct, b.games, b.team_id)));
    rows
}

/// Most wins, ties broken by name.
fn best_location(wins_at: HashMap<String, i64>) -> Option<(String, i64)> {
    wins_at
        .into_iter()
        .min_by(|(name_a, wins_a), (name_b, wins_b)| wins_b.cmp(wins_a).then_with(|| name_a.cmp(name_b)))
}

fn stats_order(a: (f64, i64, i64), b: (f64, i64, i64)) -> Ordering {
    b.0.total_cmp(&a.0)
        .then(b.1.cmp(&a.1))
        .then(a.2.cmp(&b.2))
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::db::models::{DiscColor, SideLabel};

    fn doubles(id: i64, winner: SideLabel, location: Option<&str>) -> CompletedGame {
        game(
            id,
            MatchType::Teams,
            Some(winner),
            location,
            vec![
                team_side(SideLabel::A, team(1, "Alpha", 1, 2), 100, DiscColor::White),
                team_side(SideLabel::B, team(2, "Bravo", 3, 4), 80, DiscColor::Natural),
            ],
        )
    }

    #[test]
    fn test_player_color_breakdown() {
        let games = vec![
            singles(1, (1, 100), (2, 10), Some(SideLabel::A)),
            singles(2, (2, 100), (1, 10), Some(SideLabel::A)),
            doubles(3, SideLabel::A, None),
        ];
        let rows = player_stats(&games);
        let p1 = rows.iter().find(|r| r.player_id == 1).unwrap();
        assert_eq!((p1.games, p1.wins, p1.losses), (3, 2, 1));
        // White on side A of game 1 and the team game, black on side B of game 2.
        assert_eq!((p1.white_games, p1.black_games, p1.natural_games), (2, 1, 0));
        assert_eq!((p1.white_wins, p1.black_wins, p1.natural_wins), (2, 0, 0));

        let p3 = rows.iter().find(|r| r.player_id == 3).unwrap();
        assert_eq!((p3.games, p3.losses, p3.natural_games), (1, 1, 1));
    }

    #[test]
    fn test_stats_sort_order() {
        let games = vec![
            singles(1, (5, 100), (6, 10), Some(SideLabel::A)),
            singles(2, (7, 100), (8, 10), Some(SideLabel::A)),
            singles(3, (7, 100), (8, 10), Some(SideLabel::A)),
        ];
        let order: Vec<i64> = player_stats(&games).iter().map(|r| r.player_id).collect();
        // 7 and 5 both at 1.0, 7 has more games; 6 and 8 at 0.0, 8 has more games.
        assert_eq!(order, vec![7, 5, 8, 6]);
    }

    #[test]
    fn test_team_best_location() {
        let games = vec![
            doubles(1, SideLabel::A, Some("Pub")),
            doubles(2, SideLabel::A, Some("Hall")),
            doubles(3, SideLabel::A, None),
            doubles(4, SideLabel::B, Some("Pub")),
        ];
        let rows = team_stats(&games);
        let alpha = rows.iter().find(|r| r.team_id == 1).unwrap();
        assert_eq!((alpha.games, alpha.wins, alpha.losses), (4, 3, 1));
        // Hall, Pub and Unknown have one win each; Hall sorts first.
        assert_eq!(alpha.best_location.as_deref(), Some("Hall"));
        assert_eq!(alpha.best_location_wins, 1);

        let bravo = rows.iter().find(|r| r.team_id == 2).unwrap();
        assert_eq!(bravo.best_location.as_deref(), Some("Pub"));
        assert_eq!(bravo.natural_wins, 1);
        assert_eq!(rows[0].team_id, 1);
    }

    #[test]
    fn test_team_without_wins_has_no_best_location() {
        let games = vec![doubles(1, SideLabel::A, Some("Pub"))];
        let bravo = team_stats(&games).into_iter().find(|r| r.team_id == 2).unwrap();
        assert_eq!(bravo.best_location, None);
        assert_eq!(bravo.best_location_wins, 0);
        assert_eq!(bravo.win_pct, 0.0);
    }

    #[test]
    fn test_unset_location_counts_as_unknown() {
        let games = vec![doubles(1, SideLabel::A, None), doubles(2, SideLabel::A, Some(" "))];
        let alpha = team_stats(&games).into_iter().find(|r| r.team_id == 1).unwrap();
        assert_eq!(alpha.best_location.as_deref(), Some("Unknown"));
        assert_eq!(alpha.best_location_wins, 2);
    }
}
