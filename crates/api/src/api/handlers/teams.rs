// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::Utc;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;

use super::{
    Paged, Pagination, double_option, optional_text, players::find_live_player, required_text,
    search_pattern,
};
use crate::{
    api::Context,
    db::{
        models::{NewTeam, Team, TeamChanges},
        schema::{team_seasons, teams},
    },
    error::{AppError, AppResult},
};

const DUPLICATE_PAIR: &str = "team for this player pair already exists";

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateTeamInput {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "playerAId")]
    pub player_a_id: i64,
    #[serde(rename = "playerBId")]
    pub player_b_id: i64,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTeamInput {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(rename = "playerAId")]
    pub player_a_id: Option<i64>,
    #[serde(rename = "playerBId")]
    pub player_b_id: Option<i64>,
}

#[derive(Debug, Default)]
pub struct TeamFilter {
    pub q: Option<String>,
    pub player_id: Option<i64>,
    pub season_id: Option<i64>,
    pub only_active: Option<bool>,
}

/// Orders a pair so the lower id comes first. Equal ids are rejected.
pub fn canonical_pair(a: i64, b: i64) -> AppResult<(i64, i64)> {
    if a <= 0 || b <= 0 {
        return Err(AppError::validation("playerAId and playerBId are required"));
    }
    if a == b {
        return Err(AppError::validation("a team needs two different players"));
    }
    Ok((a.min(b), a.max(b)))
}

pub(crate) async fn find_live_team(
    conn: &mut AsyncPgConnection,
    team_id: i64,
) -> AppResult<Option<Team>> {
    Ok(teams::table
        .filter(teams::id.eq(team_id))
        .filter(teams::deleted_at.is_null())
        .select(Team::as_select())
        .first(conn)
        .await
        .optional()?)
}

async fn ensure_players_live(conn: &mut AsyncPgConnection, pair: (i64, i64)) -> AppResult<()> {
    for player_id in [pair.0, pair.1] {
        if find_live_player(conn, player_id).await?.is_none() {
            return Err(AppError::validation(format!("player {player_id} not found")));
        }
    }
    Ok(())
}

async fn ensure_pair_free(
    conn: &mut AsyncPgConnection,
    pair: (i64, i64),
    own_id: Option<i64>,
) -> AppResult<()> {
    let mut query = teams::table
        .filter(teams::player_a_id.eq(pair.0))
        .filter(teams::player_b_id.eq(pair.1))
        .filter(teams::deleted_at.is_null())
        .into_boxed();
    if let Some(own_id) = own_id {
        query = query.filter(teams::id.ne(own_id));
    }
    let clashes: i64 = query.count().get_result(conn).await?;
    if clashes > 0 {
        return Err(AppError::Conflict(DUPLICATE_PAIR.to_string()));
    }
    Ok(())
}

/// The partial unique index catches pairs created concurrently.
fn pair_conflict(err: DieselError) -> AppError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            AppError::Conflict(DUPLICATE_PAIR.to_string())
        }
        other => other.into(),
    }
}

pub async fn create_team(ctx: &Context, input: CreateTeamInput) -> AppResult<Team> {
    ctx.require_authentication()?;
    let name = required_text(&input.name, "name")?;
    let (player_a_id, player_b_id) = canonical_pair(input.player_a_id, input.player_b_id)?;

    let mut pooled = ctx.get_db_conn().await?;
    ensure_players_live(&mut pooled, (player_a_id, player_b_id)).await?;
    ensure_pair_free(&mut pooled, (player_a_id, player_b_id), None).await?;

    let new_team = NewTeam {
        name,
        description: optional_text(input.description),
        player_a_id,
        player_b_id,
    };
    let team = diesel::insert_into(teams::table)
        .values(&new_team)
        .returning(Team::as_returning())
        .get_result(&mut pooled)
        .await
        .map_err(pair_conflict)?;
    tracing::info!(team_id = team.id, player_a_id, player_b_id, "Created team");
    Ok(team)
}

pub async fn get_team(ctx: &Context, team_id: i64) -> AppResult<Team> {
    let mut pooled = ctx.get_db_conn().await?;
    find_live_team(&mut pooled, team_id)
        .await?
        .ok_or(AppError::NotFound("team"))
}

fn filtered(filter: &TeamFilter) -> teams::BoxedQuery<'static, Pg> {
    let mut query = teams::table.filter(teams::deleted_at.is_null()).into_boxed();
    if let Some(pattern) = search_pattern(filter.q.as_deref()) {
        query = query.filter(teams::name.ilike(pattern));
    }
    if let Some(player_id) = filter.player_id {
        query = query.filter(
            teams::player_a_id
                .eq(player_id)
                .or(teams::player_b_id.eq(player_id)),
        );
    }
    let only_active = filter.only_active == Some(true);
    if filter.season_id.is_some() || only_active {
        let mut links = team_seasons::table
            .select(team_seasons::team_id)
            .filter(team_seasons::deleted_at.is_null())
            .into_boxed();
        if let Some(season_id) = filter.season_id {
            links = links.filter(team_seasons::season_id.eq(season_id));
        }
        if only_active {
            links = links.filter(team_seasons::is_active.eq(true));
        }
        query = query.filter(teams::id.eq_any(links));
    }
    query
}

pub async fn list_teams(
    ctx: &Context,
    filter: TeamFilter,
    pagination: Pagination,
) -> AppResult<Paged<Team>> {
    let mut pooled = ctx.get_db_conn().await?;
    let total: i64 = filtered(&filter).count().get_result(&mut pooled).await?;
    let data = filtered(&filter)
        .order(teams::id.desc())
        .limit(pagination.size)
        .offset(pagination.offset())
        .select(Team::as_select())
        .load(&mut pooled)
        .await?;
    Ok(Paged::new(data, total, pagination))
}

pub async fn update_team(ctx: &Context, team_id: i64, input: UpdateTeamInput) -> AppResult<Team> {
    ctx.require_authentication()?;
    let name = input
        .name
        .as_deref()
        .map(|n| required_text(n, "name"))
        .transpose()?;

    let mut pooled = ctx.get_db_conn().await?;
    let current = find_live_team(&mut pooled, team_id)
        .await?
        .ok_or(AppError::NotFound("team"))?;

    let mut pair = None;
    if input.player_a_id.is_some() || input.player_b_id.is_some() {
        let next = canonical_pair(
            input.player_a_id.unwrap_or(current.player_a_id),
            input.player_b_id.unwrap_or(current.player_b_id),
        )?;
        if next != (current.player_a_id, current.player_b_id) {
            ensure_players_live(&mut pooled, next).await?;
            ensure_pair_free(&mut pooled, next, Some(team_id)).await?;
        }
        pair = Some(next);
    }

    let changes = TeamChanges {
        name,
        description: input.description.map(optional_text),
        player_a_id: pair.map(|p| p.0),
        player_b_id: pair.map(|p| p.1),
        updated_at: Utc::now(),
    };
    diesel::update(
        teams::table
            .filter(teams::id.eq(team_id))
            .filter(teams::deleted_at.is_null()),
    )
    .set(&changes)
    .returning(Team::as_returning())
    .get_result(&mut pooled)
    .await
    .optional()
    .map_err(pair_conflict)?
    .ok_or(AppError::NotFound("team"))
}

pub async fn delete_team(ctx: &Context, team_id: i64) -> AppResult<()> {
    ctx.require_authentication()?;
    let mut pooled = ctx.get_db_conn().await?;
    let now = Utc::now();
    let affected = diesel::update(
        teams::table
            .filter(teams::id.eq(team_id))
            .filter(teams::deleted_at.is_null()),
    )
    .set((teams::deleted_at.eq(Some(now)), teams::updated_at.eq(now)))
    .execute(&mut pooled)
    .await?;
    if affected == 0 {
        return Err(AppError::NotFound("team"));
    }
    tracing::info!(team_id, "Deleted team");
    Ok(())
}
