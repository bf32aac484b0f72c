// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::Utc;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;

use super::{Paged, Pagination, double_option, optional_text, required_text, search_pattern};
use crate::{
    api::Context,
    db::{
        models::{NewPlayer, Player, PlayerChanges},
        schema::{players, users},
    },
    error::{AppError, AppResult},
};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlayerInput {
    pub user_id: Option<i64>,
    pub nickname: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlayerInput {
    #[serde(default, deserialize_with = "double_option")]
    pub user_id: Option<Option<i64>>,
    pub nickname: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub last_name: Option<Option<String>>,
}

pub(crate) async fn find_live_player(
    conn: &mut AsyncPgConnection,
    player_id: i64,
) -> AppResult<Option<Player>> {
    Ok(players::table
        .filter(players::id.eq(player_id))
        .filter(players::deleted_at.is_null())
        .select(Player::as_select())
        .first(conn)
        .await
        .optional()?)
}

async fn ensure_user_exists(conn: &mut AsyncPgConnection, user_id: i64) -> AppResult<()> {
    let count: i64 = users::table
        .filter(users::id.eq(user_id))
        .count()
        .get_result(conn)
        .await?;
    if count == 0 {
        return Err(AppError::validation("user not found"));
    }
    Ok(())
}

pub async fn create_player(ctx: &Context, input: CreatePlayerInput) -> AppResult<Player> {
    ctx.require_authentication()?;
    let new_player = NewPlayer {
        user_id: input.user_id,
        nickname: required_text(&input.nickname, "nickname")?,
        first_name: optional_text(input.first_name),
        last_name: optional_text(input.last_name),
    };

    let mut pooled = ctx.get_db_conn().await?;
    if let Some(user_id) = new_player.user_id {
        ensure_user_exists(&mut pooled, user_id).await?;
    }
    let player = diesel::insert_into(players::table)
        .values(&new_player)
        .returning(Player::as_returning())
        .get_result(&mut pooled)
        .await?;
    tracing::info!(player_id = player.id, "Created player");
    Ok(player)
}

pub async fn get_player(ctx: &Context, player_id: i64) -> AppResult<Player> {
    let mut pooled = ctx.get_db_conn().await?;
    find_live_player(&mut pooled, player_id)
        .await?
        .ok_or(AppError::NotFound("player"))
}

fn filtered(q: Option<&str>) -> players::BoxedQuery<'static, Pg> {
    let mut query = players::table
        .filter(players::deleted_at.is_null())
        .into_boxed();
    if let Some(pattern) = search_pattern(q) {
        query = query.filter(
            players::nickname
                .ilike(pattern.clone())
                .or(players::first_name.assume_not_null().ilike(pattern.clone()))
                .or(players::last_name.assume_not_null().ilike(pattern)),
        );
    }
    query
}

pub async fn list_players(
    ctx: &Context,
    q: Option<&str>,
    pagination: Pagination,
) -> AppResult<Paged<Player>> {
    let mut pooled = ctx.get_db_conn().await?;
    let total: i64 = filtered(q).count().get_result(&mut pooled).await?;
    let data = filtered(q)
        .order(players::id.desc())
        .limit(pagination.size)
        .offset(pagination.offset())
        .select(Player::as_select())
        .load(&mut pooled)
        .await?;
    Ok(Paged::new(data, total, pagination))
}

pub async fn update_player(
    ctx: &Context,
    player_id: i64,
    input: UpdatePlayerInput,
) -> AppResult<Player> {
    ctx.require_authentication()?;
    let changes = PlayerChanges {
        user_id: input.user_id,
        nickname: input
            .nickname
            .as_deref()
            .map(|n| required_text(n, "nickname"))
            .transpose()?,
        first_name: input.first_name.map(optional_text),
        last_name: input.last_name.map(optional_text),
        updated_at: Utc::now(),
    };

    let mut pooled = ctx.get_db_conn().await?;
    if let Some(Some(user_id)) = changes.user_id {
        ensure_user_exists(&mut pooled, user_id).await?;
    }
    diesel::update(
        players::table
            .filter(players::id.eq(player_id))
            .filter(players::deleted_at.is_null()),
    )
    .set(&changes)
    .returning(Player::as_returning())
    .get_result(&mut pooled)
    .await
    .optional()?
    .ok_or(AppError::NotFound("player"))
}

pub async fn delete_player(ctx: &Context, player_id: i64) -> AppResult<()> {
    ctx.require_authentication()?;
    let mut pooled = ctx.get_db_conn().await?;
    let now = Utc::now();
    let affected = diesel::update(
        players::table
            .filter(players::id.eq(player_id))
            .filter(players::deleted_at.is_null()),
    )
    .set((players::deleted_at.eq(Some(now)), players::updated_at.eq(now)))
    .execute(&mut pooled)
    .await?;
    if affected == 0 {
        return Err(AppError::NotFound("player"));
    }
    tracing::info!(player_id, "Deleted player");
    Ok(())
}
