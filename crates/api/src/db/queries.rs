// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Read queries feeding [`crate::aggregate`].
//!
//! Tombstoned games and sides are excluded. Teams are joined regardless of
//! their tombstone so that history survives a team being deleted.

use std::collections::{BTreeSet, HashMap};

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use super::models::{Game, GameSide, GameStatus, Team};
use super::schema::{game_sides, games, team_seasons, teams};
use crate::aggregate::{CompletedGame, SideRecord, TeamRef};

/// Completed, live games of one season with their sides.
pub async fn completed_season_games(
    conn: &mut AsyncPgConnection,
    season_id: i64,
) -> QueryResult<Vec<CompletedGame>> {
    let rows: Vec<Game> = games::table
        .filter(games::season_id.eq(season_id))
        .filter(games::status.eq(GameStatus::Completed))
        .filter(games::deleted_at.is_null())
        .order(games::id.asc())
        .select(Game::as_select())
        .load(conn)
        .await?;
    attach_sides(conn, rows).await
}

/// Completed, live games of any season (exhibitions included) that reach
/// `player_id` directly or through a team.
pub async fn completed_games_for_player(
    conn: &mut AsyncPgConnection,
    player_id: i64,
) -> QueryResult<Vec<CompletedGame>> {
    let member_of = teams::table
        .filter(
            teams::player_a_id
                .eq(player_id)
                .or(teams::player_b_id.eq(player_id)),
        )
        .select(teams::id.nullable());
    let participating = game_sides::table
        .filter(game_sides::deleted_at.is_null())
        .filter(
            game_sides::player_id
                .eq(player_id)
                .or(game_sides::team_id.eq_any(member_of)),
        )
        .select(game_sides::game_id);

    let rows: Vec<Game> = games::table
        .filter(games::id.eq_any(participating))
        .filter(games::status.eq(GameStatus::Completed))
        .filter(games::deleted_at.is_null())
        .order(games::id.asc())
        .select(Game::as_select())
        .load(conn)
        .await?;
    attach_sides(conn, rows).await
}

/// Members of every live team with a live, active link to the season.
pub async fn active_roster(conn: &mut AsyncPgConnection, season_id: i64) -> QueryResult<Vec<i64>> {
    let pairs: Vec<(i64, i64)> = team_seasons::table
        .inner_join(teams::table)
        .filter(team_seasons::season_id.eq(season_id))
        .filter(team_seasons::is_active.eq(true))
        .filter(team_seasons::deleted_at.is_null())
        .filter(teams::deleted_at.is_null())
        .select((teams::player_a_id, teams::player_b_id))
        .load(conn)
        .await?;
    let roster: BTreeSet<i64> = pairs.into_iter().flat_map(|(a, b)| [a, b]).collect();
    Ok(roster.into_iter().collect())
}

async fn attach_sides(
    conn: &mut AsyncPgConnection,
    rows: Vec<Game>,
) -> QueryResult<Vec<CompletedGame>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = rows.iter().map(|g| g.id).collect();
    let sides: Vec<(GameSide, Option<Team>)> = game_sides::table
        .left_join(teams::table)
        .filter(game_sides::game_id.eq_any(&ids))
        .filter(game_sides::deleted_at.is_null())
        .order((game_sides::game_id.asc(), game_sides::side.asc()))
        .select((GameSide::as_select(), Option::<Team>::as_select()))
        .load(conn)
        .await?;

    let mut by_game: HashMap<i64, Vec<SideRecord>> = HashMap::new();
    for (side, team) in sides {
        by_game.entry(side.game_id).or_default().push(SideRecord {
            side: side.side,
            color: side.color,
            points: side.points,
            player_id: side.player_id,
            team: team.map(|t| TeamRef {
                id: t.id,
                name: t.name,
                player_a_id: t.player_a_id,
                player_b_id: t.player_b_id,
            }),
        });
    }

    Ok(rows
        .into_iter()
        .map(|game| {
            let mut sides = by_game.remove(&game.id).unwrap_or_default();
            sides.sort_by_key(|s| s.side);
            CompletedGame {
                id: game.id,
                season_id: game.season_id,
                match_type: game.match_type,
                status: game.status,
                winner_side: game.winner_side,
                location: game.location,
                sides,
            }
        })
        .collect())
}
