// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::collections::BTreeMap;

use serde::Serialize;

use super::CompletedGame;
use crate::db::models::{DiscColor, GameStatus, MatchType, SideLabel};

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGameRow {
    pub game_id: i64,
    pub season_id: Option<i64>,
    pub match_type: MatchType,
    pub status: GameStatus,
    pub winner_side: Option<SideLabel>,
    pub side: SideLabel,
    pub color: DiscColor,
    /// Attribution paths that reach the player through this side and colour.
    pub row_count: i64,
}

/// Games in which `player_id` is reachable through more than one side or team.
///
/// Diagnostic only. Scoring credits the player once per game regardless.
pub fn duplicate_games(games: &[CompletedGame], player_id: i64) -> Vec<DuplicateGameRow> {
    let mut out = Vec::new();
    let mut ordered: Vec<&CompletedGame> = games.iter().collect();
    ordered.sort_by_key(|g| g.id);

    for game in ordered {
        let mut paths: BTreeMap<(SideLabel, &'static str), (DiscColor, i64)> = BTreeMap::new();
        for side in &game.sides {
            let hits = side
                .credited_players()
                .into_iter()
                .filter(|&p| p == player_id)
                .count() as i64;
            if hits > 0 {
                paths
                    .entry((side.side, side.color.as_str()))
                    .or_insert((side.color, 0))
                    .1 += hits;
            }
        }

        let total: i64 = paths.values().map(|(_, n)| n).sum();
        if total <= 1 {
            continue;
        }
        out.extend(paths.into_iter().map(|((side, _), (color, row_count))| DuplicateGameRow {
            game_id: game.id,
            season_id: game.season_id,
            match_type: game.match_type,
            status: game.status,
            winner_side: game.winner_side,
            side,
            color,
            row_count,
        }));
    }
    out
}
