// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;

use super::{
    Paged, Pagination, require_positive_id, seasons::find_live_season, teams::find_live_team,
};
use crate::{
    api::Context,
    db::{
        models::{NewTeamSeason, Season, Team, TeamSeason},
        schema::{seasons, team_seasons, teams},
    },
    error::{AppError, AppResult},
};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LinkTeamSeasonInput {
    pub team_id: i64,
    pub season_id: i64,
    pub is_active: Option<bool>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SetActiveInput {
    pub is_active: bool,
}

#[derive(Debug, Default)]
pub struct TeamSeasonFilter {
    pub team_id: Option<i64>,
    pub season_id: Option<i64>,
    pub only_active: Option<bool>,
}

/// Creates the link, or revives a tombstoned one for the same team and season.
pub async fn link_team_season(ctx: &Context, input: LinkTeamSeasonInput) -> AppResult<TeamSeason> {
    ctx.require_authentication()?;
    let team_id = require_positive_id(input.team_id, "teamId")?;
    let season_id = require_positive_id(input.season_id, "seasonId")?;
    let is_active = input.is_active.unwrap_or(true);

    let mut pooled = ctx.get_db_conn().await?;
    if find_live_team(&mut pooled, team_id).await?.is_none() {
        return Err(AppError::validation("team not found"));
    }
    if find_live_season(&mut pooled, season_id).await?.is_none() {
        return Err(AppError::validation("season not found"));
    }

    let link = diesel::insert_into(team_seasons::table)
        .values(&NewTeamSeason {
            team_id,
            season_id,
            is_active,
        })
        .on_conflict((team_seasons::team_id, team_seasons::season_id))
        .do_update()
        .set((
            team_seasons::is_active.eq(is_active),
            team_seasons::deleted_at.eq(None::<DateTime<Utc>>),
            team_seasons::updated_at.eq(Utc::now()),
        ))
        .returning(TeamSeason::as_returning())
        .get_result(&mut pooled)
        .await?;
    tracing::info!(team_id, season_id, is_active, "Linked team to season");
    Ok(link)
}

pub async fn set_team_season_active(
    ctx: &Context,
    team_id: i64,
    season_id: i64,
    input: SetActiveInput,
) -> AppResult<TeamSeason> {
    ctx.require_authentication()?;
    let mut pooled = ctx.get_db_conn().await?;
    diesel::update(
        team_seasons::table
            .filter(team_seasons::team_id.eq(team_id))
            .filter(team_seasons::season_id.eq(season_id))
            .filter(team_seasons::deleted_at.is_null()),
    )
    .set((
        team_seasons::is_active.eq(input.is_active),
        team_seasons::updated_at.eq(Utc::now()),
    ))
    .returning(TeamSeason::as_returning())
    .get_result(&mut pooled)
    .await
    .optional()?
    .ok_or(AppError::NotFound("team season"))
}

/// Tombstones the link. Unlinking twice is not an error.
pub async fn unlink_team_season(ctx: &Context, team_id: i64, season_id: i64) -> AppResult<()> {
    ctx.require_authentication()?;
    let mut pooled = ctx.get_db_conn().await?;
    let now = Utc::now();
    let affected = diesel::update(
        team_seasons::table
            .filter(team_seasons::team_id.eq(team_id))
            .filter(team_seasons::season_id.eq(season_id))
            .filter(team_seasons::deleted_at.is_null()),
    )
    .set((
        team_seasons::deleted_at.eq(Some(now)),
        team_seasons::updated_at.eq(now),
    ))
    .execute(&mut pooled)
    .await?;
    tracing::info!(team_id, season_id, affected, "Unlinked team from season");
    Ok(())
}

fn filtered(filter: &TeamSeasonFilter) -> team_seasons::BoxedQuery<'static, Pg> {
    let mut query = team_seasons::table
        .filter(team_seasons::deleted_at.is_null())
        .into_boxed();
    if let Some(team_id) = filter.team_id {
        query = query.filter(team_seasons::team_id.eq(team_id));
    }
    if let Some(season_id) = filter.season_id {
        query = query.filter(team_seasons::season_id.eq(season_id));
    }
    if filter.only_active == Some(true) {
        query = query.filter(team_seasons::is_active.eq(true));
    }
    query
}

pub async fn list_team_seasons(
    ctx: &Context,
    filter: TeamSeasonFilter,
    pagination: Pagination,
) -> AppResult<Paged<TeamSeason>> {
    let mut pooled = ctx.get_db_conn().await?;
    let total: i64 = filtered(&filter).count().get_result(&mut pooled).await?;
    let data = filtered(&filter)
        .order(team_seasons::id.desc())
        .limit(pagination.size)
        .offset(pagination.offset())
        .select(TeamSeason::as_select())
        .load(&mut pooled)
        .await?;
    Ok(Paged::new(data, total, pagination))
}

pub async fn list_seasons_for_team(
    ctx: &Context,
    team_id: i64,
    only_active: Option<bool>,
) -> AppResult<Vec<Season>> {
    let mut pooled = ctx.get_db_conn().await?;
    if find_live_team(&mut pooled, team_id).await?.is_none() {
        return Err(AppError::NotFound("team"));
    }
    let mut query = seasons::table
        .inner_join(team_seasons::table)
        .filter(team_seasons::team_id.eq(team_id))
        .filter(team_seasons::deleted_at.is_null())
        .filter(seasons::deleted_at.is_null())
        .select(Season::as_select())
        .order(seasons::id.desc())
        .into_boxed();
    if only_active == Some(true) {
        query = query.filter(team_seasons::is_active.eq(true));
    }
    Ok(query.load(&mut pooled).await?)
}

pub async fn list_teams_for_season(
    ctx: &Context,
    season_id: i64,
    only_active: Option<bool>,
) -> AppResult<Vec<Team>> {
    let mut pooled = ctx.get_db_conn().await?;
    if find_live_season(&mut pooled, season_id).await?.is_none() {
        return Err(AppError::NotFound("season"));
    }
    let mut query = teams::table
        .inner_join(team_seasons::table)
        .filter(team_seasons::season_id.eq(season_id))
        .filter(team_seasons::deleted_at.is_null())
        .filter(teams::deleted_at.is_null())
        .select(Team::as_select())
        .order(teams::id.desc())
        .into_boxed();
    if only_active == Some(true) {
        query = query.filter(team_seasons::is_active.eq(true));
    }
    Ok(query.load(&mut pooled).await?)
}
