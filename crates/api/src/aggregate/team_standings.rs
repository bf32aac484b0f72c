// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::collections::HashMap;

use serde::Serialize;

use super::{CompletedGame, ratio};
use crate::db::models::MatchType;

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamStandingsRow {
    pub team_id: i64,
    pub team_name: String,
    pub games: i64,
    pub wins: i64,
    pub losses: i64,
    pub ties: i64,
    pub points_for: i64,
    pub points_against: i64,
    pub point_diff: i64,
    pub win_pct: f64,
}

/// Team table for one season. Results come from the points, a tie counts half a win.
pub fn team_standings(games: &[CompletedGame]) -> Vec<TeamStandingsRow> {
    let mut by_team: HashMap<i64, TeamStandingsRow> = HashMap::new();

    for game in games.iter().filter(|g| g.match_type == MatchType::Teams) {
        for side in &game.sides {
            let Some(team) = &side.team else { continue };
            let Some(against) = game.opponent_points(side.side) else {
                continue;
            };
            let (pf, pa) = (i64::from(side.points), i64::from(against));

            let row = by_team.entry(team.id).or_insert_with(|| TeamStandingsRow {
                team_id: team.id,
                team_name: team.name.clone(),
                games: 0,
                wins: 0,
                losses: 0,
                ties: 0,
                points_for: 0,
                points_against: 0,
                point_diff: 0,
                win_pct: 0.0,
            });
            row.games += 1;
            match pf.cmp(&pa) {
                std::cmp::Ordering::Greater => row.wins += 1,
                std::cmp::Ordering::Less => row.losses += 1,
                std::cmp::Ordering::Equal => row.ties += 1,
            }
            row.points_for += pf;
            row.points_against += pa;
        }
    }

    let mut rows: Vec<TeamStandingsRow> = by_team
        .into_values()
        .map(|mut row| {
            row.point_diff = row.points_for - row.points_against;
            row.win_pct = round4(ratio(row.wins as f64 + 0.5 * row.ties as f64, row.games));
            row
        })
        .collect();

    rows.sort_by(|a, b| {
        b.wins
            .cmp(&a.wins)
            .then(b.point_diff.cmp(&a.point_diff))
            .then(b.points_for.cmp(&a.points_for))
            .then_with(|| a.team_name.cmp(&b.team_name))
            .then(a.team_id.cmp(&b.team_id))
    });
    rows
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
