// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl, scoped_futures::ScopedFutureExt};
use serde::Deserialize;

use super::games::{GameWithSides, find_live_game, load_sides, lock_live_game, write_game};
use crate::{
    api::Context,
    db::{
        models::{DiscColor, GameSide, SideLabel},
        schema::game_sides,
    },
    error::{AppError, AppResult},
    lifecycle::{self, GameState, ScoreChange},
};

#[derive(Deserialize, Debug)]
pub struct SetColorInput {
    pub color: String,
}

#[derive(Deserialize, Debug)]
pub struct AddPointsInput {
    pub delta: i32,
}

#[derive(Deserialize, Debug)]
pub struct SetPointsInput {
    pub points: i32,
}

pub async fn list_sides(ctx: &Context, game_id: i64) -> AppResult<Vec<GameSide>> {
    let mut pooled = ctx.get_db_conn().await?;
    if find_live_game(&mut pooled, game_id).await?.is_none() {
        return Err(AppError::NotFound("game"));
    }
    load_sides(&mut pooled, game_id).await
}

pub async fn set_side_color(
    ctx: &Context,
    game_id: i64,
    side: SideLabel,
    input: SetColorInput,
) -> AppResult<GameSide> {
    ctx.require_authentication()?;
    let color: DiscColor = input.color.parse().map_err(AppError::Validation)?;

    let mut pooled = ctx.get_db_conn().await?;
    let conn: &mut AsyncPgConnection = &mut pooled;
    let updated = conn
        .transaction::<_, AppError, _>(move |conn| {
            async move {
                let game = lock_live_game(conn, game_id).await?;
                lifecycle::ensure_colors_editable(game.status)?;
                diesel::update(
                    game_sides::table
                        .filter(game_sides::game_id.eq(game_id))
                        .filter(game_sides::side.eq(side))
                        .filter(game_sides::deleted_at.is_null()),
                )
                .set((
                    game_sides::color.eq(color),
                    game_sides::updated_at.eq(Utc::now()),
                ))
                .returning(GameSide::as_returning())
                .get_result(conn)
                .await
                .optional()?
                .ok_or(AppError::NotFound("game side"))
            }
            .scope_boxed()
        })
        .await?;
    tracing::info!(game_id, side = side.as_str(), color = color.as_str(), "Set side color");
    Ok(updated)
}

/// Applies a score change under a row lock on the game. The first score
/// moves a scheduled game in progress.
pub async fn change_points(
    ctx: &Context,
    game_id: i64,
    side: SideLabel,
    change: ScoreChange,
) -> AppResult<GameWithSides> {
    ctx.require_authentication()?;
    let change = change.validate()?;

    let mut pooled = ctx.get_db_conn().await?;
    let conn: &mut AsyncPgConnection = &mut pooled;
    let result = conn
        .transaction::<_, AppError, _>(move |conn| {
            async move {
                let current = lock_live_game(conn, game_id).await?;
                let now = Utc::now();
                let state = GameState::from(&current);
                let next = lifecycle::on_score(&state, now)?;

                let scored: GameSide = game_sides::table
                    .filter(game_sides::game_id.eq(game_id))
                    .filter(game_sides::side.eq(side))
                    .filter(game_sides::deleted_at.is_null())
                    .select(GameSide::as_select())
                    .first(conn)
                    .await
                    .optional()?
                    .ok_or(AppError::NotFound("game side"))?;
                diesel::update(game_sides::table.filter(game_sides::id.eq(scored.id)))
                    .set((
                        game_sides::points.eq(change.apply(scored.points)),
                        game_sides::updated_at.eq(now),
                    ))
                    .execute(conn)
                    .await?;

                let game = if next != state {
                    write_game(conn, game_id, &next.into_changes(now)).await?
                } else {
                    current
                };
                let sides = load_sides(conn, game_id).await?;
                Ok(GameWithSides { game, sides })
            }
            .scope_boxed()
        })
        .await?;
    tracing::info!(
        game_id,
        side = side.as_str(),
        change = ?change,
        status = result.game.status.as_str(),
        "Changed points"
    );
    Ok(result)
}

pub async fn add_points(
    ctx: &Context,
    game_id: i64,
    side: SideLabel,
    input: AddPointsInput,
) -> AppResult<GameWithSides> {
    change_points(ctx, game_id, side, ScoreChange::Add(input.delta)).await
}

pub async fn set_points(
    ctx: &Context,
    game_id: i64,
    side: SideLabel,
    input: SetPointsInput,
) -> AppResult<GameWithSides> {
    change_points(ctx, game_id, side, ScoreChange::Set(input.points)).await
}
