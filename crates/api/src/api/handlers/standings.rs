// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Read-only aggregate endpoints. Every request recomputes from the
//! completed-game history; nothing is cached.

use serde::Serialize;

use super::{players::find_live_player, seasons::find_live_season};
use crate::{
    aggregate::{
        self, DuplicateGameRow, PlayerStandingsRow, PlayerStatsRow, StandingsCursor,
        TeamStandingsRow, TeamStatsRow,
    },
    api::Context,
    db::queries,
    error::{AppError, AppResult},
};

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SeasonRows<T> {
    pub season_id: i64,
    pub data: Vec<T>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStandingsResponse {
    pub season_id: i64,
    pub standings: Vec<PlayerStandingsRow>,
    #[serde(rename = "next_cursor")]
    pub next_cursor: Option<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGamesResponse {
    pub player_id: i64,
    pub data: Vec<DuplicateGameRow>,
}

pub fn parse_cursor(token: Option<&str>) -> AppResult<Option<StandingsCursor>> {
    match token.map(str::trim) {
        None | Some("") => Ok(None),
        Some(token) => StandingsCursor::decode(token)
            .map(Some)
            .map_err(|_| AppError::validation("invalid cursor")),
    }
}

pub async fn team_standings(ctx: &Context, season_id: i64) -> AppResult<SeasonRows<TeamStandingsRow>> {
    let mut pooled = ctx.get_db_conn().await?;
    if find_live_season(&mut pooled, season_id).await?.is_none() {
        return Err(AppError::NotFound("season"));
    }
    let games = queries::completed_season_games(&mut pooled, season_id).await?;
    let data = aggregate::team_standings(&games);
    tracing::info!(season_id, games = games.len(), rows = data.len(), "Computed team standings");
    Ok(SeasonRows { season_id, data })
}

pub async fn player_standings(
    ctx: &Context,
    season_id: i64,
    limit: Option<i64>,
    cursor: Option<&str>,
) -> AppResult<PlayerStandingsResponse> {
    let cursor = parse_cursor(cursor)?;
    let limit = aggregate::clamp_limit(limit);

    let mut pooled = ctx.get_db_conn().await?;
    if find_live_season(&mut pooled, season_id).await?.is_none() {
        return Err(AppError::NotFound("season"));
    }
    let games = queries::completed_season_games(&mut pooled, season_id).await?;
    let roster = queries::active_roster(&mut pooled, season_id).await?;
    let page = aggregate::player_standings(&games, &roster, limit, cursor.as_ref());
    tracing::info!(
        season_id,
        games = games.len(),
        rows = page.rows.len(),
        more = page.next_cursor.is_some(),
        "Computed player standings"
    );
    Ok(PlayerStandingsResponse {
        season_id,
        standings: page.rows,
        next_cursor: page.next_cursor.map(|c| c.encode()),
    })
}

pub async fn player_stats(ctx: &Context, season_id: i64) -> AppResult<SeasonRows<PlayerStatsRow>> {
    let mut pooled = ctx.get_db_conn().await?;
    if find_live_season(&mut pooled, season_id).await?.is_none() {
        return Err(AppError::NotFound("season"));
    }
    let games = queries::completed_season_games(&mut pooled, season_id).await?;
    let data = aggregate::player_stats(&games);
    tracing::info!(season_id, rows = data.len(), "Computed player stats");
    Ok(SeasonRows { season_id, data })
}

pub async fn team_stats(ctx: &Context, season_id: i64) -> AppResult<SeasonRows<TeamStatsRow>> {
    let mut pooled = ctx.get_db_conn().await?;
    if find_live_season(&mut pooled, season_id).await?.is_none() {
        return Err(AppError::NotFound("season"));
    }
    let games = queries::completed_season_games(&mut pooled, season_id).await?;
    let data = aggregate::team_stats(&games);
    tracing::info!(season_id, rows = data.len(), "Computed team stats");
    Ok(SeasonRows { season_id, data })
}

pub async fn duplicate_games(ctx: &Context, player_id: i64) -> AppResult<DuplicateGamesResponse> {
    let mut pooled = ctx.get_db_conn().await?;
    if find_live_player(&mut pooled, player_id).await?.is_none() {
        return Err(AppError::NotFound("player"));
    }
    let games = queries::completed_games_for_player(&mut pooled, player_id).await?;
    let data = aggregate::duplicate_games(&games, player_id);
    if !data.is_empty() {
        tracing::warn!(player_id, rows = data.len(), "Player credited through several paths");
    }
    Ok(DuplicateGamesResponse { player_id, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_parsing() {
        assert_eq!(parse_cursor(None).unwrap(), None);
        assert_eq!(parse_cursor(Some(" ")).unwrap(), None);
        let cursor = StandingsCursor {
            wins: 4,
            point_diff: -12,
            player_id: 31,
        };
        assert_eq!(parse_cursor(Some(&cursor.encode())).unwrap(), Some(cursor));
        assert!(matches!(
            parse_cursor(Some("not a cursor!")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_standings_response_keeps_snake_case_cursor() {
        let body = serde_json::to_value(PlayerStandingsResponse {
            season_id: 3,
            standings: Vec::new(),
            next_cursor: None,
        })
        .unwrap();
        assert_eq!(body["seasonId"], 3);
        assert!(body.get("next_cursor").is_some());
    }
}
