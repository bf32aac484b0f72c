// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::Utc;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;

use super::{Paged, Pagination, required_text, search_pattern};
use crate::{
    api::Context,
    db::{
        models::{League, LeagueChanges, NewLeague},
        schema::leagues,
    },
    error::{AppError, AppResult},
};

#[derive(Deserialize, Debug)]
pub struct CreateLeagueInput {
    pub name: String,
}

#[derive(Deserialize, Debug)]
pub struct UpdateLeagueInput {
    pub name: Option<String>,
}

pub(crate) async fn find_live_league(
    conn: &mut AsyncPgConnection,
    league_id: i64,
) -> AppResult<Option<League>> {
    Ok(leagues::table
        .filter(leagues::id.eq(league_id))
        .filter(leagues::deleted_at.is_null())
        .select(League::as_select())
        .first(conn)
        .await
        .optional()?)
}

pub async fn create_league(ctx: &Context, input: CreateLeagueInput) -> AppResult<League> {
    ctx.require_authentication()?;
    let new_league = NewLeague {
        name: required_text(&input.name, "name")?,
    };

    let mut pooled = ctx.get_db_conn().await?;
    let league = diesel::insert_into(leagues::table)
        .values(&new_league)
        .returning(League::as_returning())
        .get_result(&mut pooled)
        .await?;
    tracing::info!(league_id = league.id, "Created league");
    Ok(league)
}

pub async fn get_league(ctx: &Context, league_id: i64) -> AppResult<League> {
    let mut pooled = ctx.get_db_conn().await?;
    find_live_league(&mut pooled, league_id)
        .await?
        .ok_or(AppError::NotFound("league"))
}

fn filtered(q: Option<&str>) -> leagues::BoxedQuery<'static, Pg> {
    let mut query = leagues::table
        .filter(leagues::deleted_at.is_null())
        .into_boxed();
    if let Some(pattern) = search_pattern(q) {
        query = query.filter(leagues::name.ilike(pattern));
    }
    query
}

pub async fn list_leagues(
    ctx: &Context,
    q: Option<&str>,
    pagination: Pagination,
) -> AppResult<Paged<League>> {
    let mut pooled = ctx.get_db_conn().await?;
    let total: i64 = filtered(q).count().get_result(&mut pooled).await?;
    let data = filtered(q)
        .order(leagues::id.desc())
        .limit(pagination.size)
        .offset(pagination.offset())
        .select(League::as_select())
        .load(&mut pooled)
        .await?;
    Ok(Paged::new(data, total, pagination))
}

pub async fn update_league(
    ctx: &Context,
    league_id: i64,
    input: UpdateLeagueInput,
) -> AppResult<League> {
    ctx.require_authentication()?;
    let changes = LeagueChanges {
        name: input
            .name
            .as_deref()
            .map(|n| required_text(n, "name"))
            .transpose()?,
        updated_at: Utc::now(),
    };

    let mut pooled = ctx.get_db_conn().await?;
    diesel::update(
        leagues::table
            .filter(leagues::id.eq(league_id))
            .filter(leagues::deleted_at.is_null()),
    )
    .set(&changes)
    .returning(League::as_returning())
    .get_result(&mut pooled)
    .await
    .optional()?
    .ok_or(AppError::NotFound("league"))
}

pub async fn delete_league(ctx: &Context, league_id: i64) -> AppResult<()> {
    ctx.require_authentication()?;
    let mut pooled = ctx.get_db_conn().await?;
    let now = Utc::now();
    let affected = diesel::update(
        leagues::table
            .filter(leagues::id.eq(league_id))
            .filter(leagues::deleted_at.is_null()),
    )
    .set((leagues::deleted_at.eq(Some(now)), leagues::updated_at.eq(now)))
    .execute(&mut pooled)
    .await?;
    if affected == 0 {
        return Err(AppError::NotFound("league"));
    }
    tracing::info!(league_id, "Deleted league");
    Ok(())
}
