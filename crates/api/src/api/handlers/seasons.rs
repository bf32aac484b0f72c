// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::{NaiveDate, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;

use super::{
    DEFAULT_TIMEZONE, Paged, Pagination, double_option, leagues::find_live_league, optional_text,
    parse_date, required_text, search_pattern, validate_timezone,
};
use crate::{
    api::Context,
    db::{
        models::{NewSeason, Season, SeasonChanges},
        schema::seasons,
    },
    error::{AppError, AppResult},
};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateSeasonInput {
    pub league_id: i64,
    pub name: String,
    pub starts_on: Option<String>,
    pub ends_on: Option<String>,
    pub timezone: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSeasonInput {
    pub league_id: Option<i64>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub starts_on: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub ends_on: Option<Option<String>>,
    pub timezone: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Default)]
pub struct SeasonFilter {
    pub q: Option<String>,
    pub league_id: Option<i64>,
}

pub(crate) async fn find_live_season(
    conn: &mut AsyncPgConnection,
    season_id: i64,
) -> AppResult<Option<Season>> {
    Ok(seasons::table
        .filter(seasons::id.eq(season_id))
        .filter(seasons::deleted_at.is_null())
        .select(Season::as_select())
        .first(conn)
        .await
        .optional()?)
}

fn check_date_order(starts_on: Option<NaiveDate>, ends_on: Option<NaiveDate>) -> AppResult<()> {
    match (starts_on, ends_on) {
        (Some(start), Some(end)) if end < start => {
            Err(AppError::validation("endsOn must be on or after startsOn"))
        }
        _ => Ok(()),
    }
}

fn optional_date(value: Option<&str>, field: &str) -> AppResult<Option<NaiveDate>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => parse_date(v, field).map(Some),
    }
}

pub async fn create_season(ctx: &Context, input: CreateSeasonInput) -> AppResult<Season> {
    ctx.require_authentication()?;
    let name = required_text(&input.name, "name")?;
    let starts_on = optional_date(input.starts_on.as_deref(), "startsOn")?;
    let ends_on = optional_date(input.ends_on.as_deref(), "endsOn")?;
    check_date_order(starts_on, ends_on)?;
    let timezone = match input.timezone.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_TIMEZONE.to_string(),
        Some(tz) => validate_timezone(tz)?,
    };

    let mut pooled = ctx.get_db_conn().await?;
    if find_live_league(&mut pooled, input.league_id).await?.is_none() {
        return Err(AppError::validation("league not found"));
    }

    let new_season = NewSeason {
        league_id: input.league_id,
        name,
        starts_on,
        ends_on,
        timezone,
        description: optional_text(input.description),
    };
    let season = diesel::insert_into(seasons::table)
        .values(&new_season)
        .returning(Season::as_returning())
        .get_result(&mut pooled)
        .await?;
    tracing::info!(season_id = season.id, league_id = season.league_id, "Created season");
    Ok(season)
}

pub async fn get_season(ctx: &Context, season_id: i64) -> AppResult<Season> {
    let mut pooled = ctx.get_db_conn().await?;
    find_live_season(&mut pooled, season_id)
        .await?
        .ok_or(AppError::NotFound("season"))
}

fn filtered(filter: &SeasonFilter) -> seasons::BoxedQuery<'static, Pg> {
    let mut query = seasons::table
        .filter(seasons::deleted_at.is_null())
        .into_boxed();
    if let Some(league_id) = filter.league_id {
        query = query.filter(seasons::league_id.eq(league_id));
    }
    if let Some(pattern) = search_pattern(filter.q.as_deref()) {
        query = query.filter(seasons::name.ilike(pattern));
    }
    query
}

pub async fn list_seasons(
    ctx: &Context,
    filter: SeasonFilter,
    pagination: Pagination,
) -> AppResult<Paged<Season>> {
    let mut pooled = ctx.get_db_conn().await?;
    let total: i64 = filtered(&filter).count().get_result(&mut pooled).await?;
    let data = filtered(&filter)
        .order(seasons::id.desc())
        .limit(pagination.size)
        .offset(pagination.offset())
        .select(Season::as_select())
        .load(&mut pooled)
        .await?;
    Ok(Paged::new(data, total, pagination))
}

pub async fn update_season(
    ctx: &Context,
    season_id: i64,
    input: UpdateSeasonInput,
) -> AppResult<Season> {
    ctx.require_authentication()?;
    let name = input
        .name
        .as_deref()
        .map(|n| required_text(n, "name"))
        .transpose()?;
    let starts_on = input
        .starts_on
        .map(|v| optional_date(v.as_deref(), "startsOn"))
        .transpose()?;
    let ends_on = input
        .ends_on
        .map(|v| optional_date(v.as_deref(), "endsOn"))
        .transpose()?;
    let timezone = input.timezone.as_deref().map(validate_timezone).transpose()?;

    let mut pooled = ctx.get_db_conn().await?;
    let current = find_live_season(&mut pooled, season_id)
        .await?
        .ok_or(AppError::NotFound("season"))?;
    check_date_order(
        starts_on.unwrap_or(current.starts_on),
        ends_on.unwrap_or(current.ends_on),
    )?;
    if let Some(league_id) = input.league_id {
        if find_live_league(&mut pooled, league_id).await?.is_none() {
            return Err(AppError::validation("league not found"));
        }
    }

    let changes = SeasonChanges {
        league_id: input.league_id,
        name,
        starts_on,
        ends_on,
        timezone,
        description: input.description.map(optional_text),
        updated_at: Utc::now(),
    };
    diesel::update(
        seasons::table
            .filter(seasons::id.eq(season_id))
            .filter(seasons::deleted_at.is_null()),
    )
    .set(&changes)
    .returning(Season::as_returning())
    .get_result(&mut pooled)
    .await
    .optional()?
    .ok_or(AppError::NotFound("season"))
}

pub async fn delete_season(ctx: &Context, season_id: i64) -> AppResult<()> {
    ctx.require_authentication()?;
    let mut pooled = ctx.get_db_conn().await?;
    let now = Utc::now();
    let affected = diesel::update(
        seasons::table
            .filter(seasons::id.eq(season_id))
            .filter(seasons::deleted_at.is_null()),
    )
    .set((seasons::deleted_at.eq(Some(now)), seasons::updated_at.eq(now)))
    .execute(&mut pooled)
    .await?;
    if affected == 0 {
        return Err(AppError::NotFound("season"));
    }
    tracing::info!(season_id, "Deleted season");
    Ok(())
}
