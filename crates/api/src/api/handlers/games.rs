// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl, scoped_futures::ScopedFutureExt};
use serde::{Deserialize, Serialize};

use super::{
    DEFAULT_TIMEZONE, Paged, Pagination, double_option, optional_text,
    players::find_live_player, seasons::find_live_season, teams::find_live_team,
    validate_timezone,
};
use crate::{
    api::Context,
    db::{
        models::{
            DiscColor, Game, GameChanges, GameSide, GameStatus, MatchType, NewGame, NewGameSide,
            SideLabel,
        },
        schema::{game_sides, games},
    },
    error::{AppError, AppResult},
    lifecycle::{self, GameState},
};

const DEFAULT_TARGET_POINTS: i32 = 100;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInput {
    pub team_id: Option<i64>,
    pub player_id: Option<i64>,
    pub color: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameInput {
    pub season_id: Option<i64>,
    pub match_type: String,
    pub target_points: Option<i32>,
    pub scheduled_at: Option<String>,
    pub timezone: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub side_a: ParticipantInput,
    pub side_b: ParticipantInput,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGameInput {
    #[serde(default, deserialize_with = "double_option")]
    pub season_id: Option<Option<i64>>,
    pub target_points: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub scheduled_at: Option<Option<String>>,
    pub timezone: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub status: Option<String>,
    pub side_a_color: Option<String>,
    pub side_b_color: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CompleteGameInput {
    pub winner_side: String,
}

#[derive(Serialize, Debug)]
pub struct GameWithSides {
    pub game: Game,
    pub sides: Vec<GameSide>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participant {
    Team(i64),
    Player(i64),
}

/// A validated side, not yet checked against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideSpec {
    pub side: SideLabel,
    pub participant: Participant,
    pub color: DiscColor,
}

impl SideSpec {
    fn into_new(self, game_id: i64) -> NewGameSide {
        let (team_id, player_id) = match self.participant {
            Participant::Team(id) => (Some(id), None),
            Participant::Player(id) => (None, Some(id)),
        };
        NewGameSide {
            game_id,
            side: self.side,
            team_id,
            player_id,
            color: self.color,
            points: 0,
        }
    }
}

pub fn parse_color(value: Option<&str>) -> AppResult<DiscColor> {
    match value.map(str::trim) {
        None | Some("") => Ok(DiscColor::Natural),
        Some(v) => v.parse().map_err(AppError::Validation),
    }
}

/// Shared side builder: colour default, participant kind matches the game.
pub fn build_side(
    match_type: MatchType,
    side: SideLabel,
    input: &ParticipantInput,
) -> AppResult<SideSpec> {
    let color = parse_color(input.color.as_deref())
        .map_err(|e| AppError::validation(format!("side {}: {}", side.as_str(), e.public_message())))?;
    let positive = |id: Option<i64>| id.filter(|v| *v > 0);
    let participant = match match_type {
        MatchType::Teams => {
            if input.player_id.is_some() {
                return Err(AppError::validation(format!(
                    "side {}: playerId not allowed for teams match",
                    side.as_str()
                )));
            }
            let team_id = positive(input.team_id).ok_or_else(|| {
                AppError::validation(format!("side {}: teamId is required", side.as_str()))
            })?;
            Participant::Team(team_id)
        }
        MatchType::Players => {
            if input.team_id.is_some() {
                return Err(AppError::validation(format!(
                    "side {}: teamId not allowed for players match",
                    side.as_str()
                )));
            }
            let player_id = positive(input.player_id).ok_or_else(|| {
                AppError::validation(format!("side {}: playerId is required", side.as_str()))
            })?;
            Participant::Player(player_id)
        }
    };
    Ok(SideSpec {
        side,
        participant,
        color,
    })
}

pub fn build_sides(
    match_type: MatchType,
    side_a: &ParticipantInput,
    side_b: &ParticipantInput,
) -> AppResult<[SideSpec; 2]> {
    let a = build_side(match_type, SideLabel::A, side_a)?;
    let b = build_side(match_type, SideLabel::B, side_b)?;
    if a.participant == b.participant {
        return Err(AppError::validation("both sides cannot be the same participant"));
    }
    Ok([a, b])
}

pub(crate) fn parse_timestamp(value: &str, field: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| AppError::validation(format!("{field} must be an RFC3339 timestamp")))
}

fn validate_target_points(points: i32) -> AppResult<i32> {
    if points <= 0 {
        return Err(AppError::validation("targetPoints must be > 0"));
    }
    Ok(points)
}

async fn ensure_participant_live(conn: &mut AsyncPgConnection, planned: &SideSpec) -> AppResult<()> {
    let (exists, kind) = match planned.participant {
        Participant::Team(id) => (find_live_team(conn, id).await?.is_some(), "team"),
        Participant::Player(id) => (find_live_player(conn, id).await?.is_some(), "player"),
    };
    if !exists {
        return Err(AppError::validation(format!(
            "side {}: {kind} not found",
            planned.side.as_str()
        )));
    }
    Ok(())
}

pub(crate) async fn find_live_game(
    conn: &mut AsyncPgConnection,
    game_id: i64,
) -> AppResult<Option<Game>> {
    Ok(games::table
        .filter(games::id.eq(game_id))
        .filter(games::deleted_at.is_null())
        .select(Game::as_select())
        .first(conn)
        .await
        .optional()?)
}

/// Row-locks the game for the rest of the transaction.
pub(crate) async fn lock_live_game(conn: &mut AsyncPgConnection, game_id: i64) -> AppResult<Game> {
    games::table
        .filter(games::id.eq(game_id))
        .filter(games::deleted_at.is_null())
        .select(Game::as_select())
        .for_update()
        .first(conn)
        .await
        .optional()?
        .ok_or(AppError::NotFound("game"))
}

pub(crate) async fn load_sides(
    conn: &mut AsyncPgConnection,
    game_id: i64,
) -> AppResult<Vec<GameSide>> {
    Ok(game_sides::table
        .filter(game_sides::game_id.eq(game_id))
        .filter(game_sides::deleted_at.is_null())
        .order(game_sides::side.asc())
        .select(GameSide::as_select())
        .load(conn)
        .await?)
}

pub(crate) async fn write_game(
    conn: &mut AsyncPgConnection,
    game_id: i64,
    changes: &GameChanges,
) -> AppResult<Game> {
    Ok(diesel::update(games::table.filter(games::id.eq(game_id)))
        .set(changes)
        .returning(Game::as_returning())
        .get_result(conn)
        .await?)
}

pub async fn create_game(ctx: &Context, input: CreateGameInput) -> AppResult<GameWithSides> {
    ctx.require_authentication()?;
    let match_type: MatchType = input.match_type.parse().map_err(AppError::Validation)?;
    let specs = build_sides(match_type, &input.side_a, &input.side_b)?;
    let target_points = input
        .target_points
        .map(validate_target_points)
        .transpose()?
        .unwrap_or(DEFAULT_TARGET_POINTS);
    let scheduled_at = match input.scheduled_at.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(v) => Some(parse_timestamp(v, "scheduledAt")?),
    };
    let timezone = match input.timezone.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(tz) => Some(validate_timezone(tz)?),
    };

    let mut pooled = ctx.get_db_conn().await?;
    let conn: &mut AsyncPgConnection = &mut pooled;

    let season_timezone = match input.season_id {
        Some(season_id) => Some(
            find_live_season(conn, season_id)
                .await?
                .ok_or_else(|| AppError::validation("season not found"))?
                .timezone,
        ),
        None => None,
    };
    for planned in &specs {
        ensure_participant_live(conn, planned).await?;
    }

    let new_game = NewGame {
        season_id: input.season_id,
        match_type,
        target_points,
        status: GameStatus::Scheduled,
        scheduled_at,
        timezone: timezone
            .or(season_timezone)
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
        location: optional_text(input.location),
        description: optional_text(input.description),
    };

    let created = conn
        .transaction::<_, AppError, _>(move |conn| {
            async move {
                let game = diesel::insert_into(games::table)
                    .values(&new_game)
                    .returning(Game::as_returning())
                    .get_result(conn)
                    .await?;
                let new_sides: Vec<NewGameSide> =
                    specs.into_iter().map(|s| s.into_new(game.id)).collect();
                let sides = diesel::insert_into(game_sides::table)
                    .values(&new_sides)
                    .returning(GameSide::as_returning())
                    .get_results(conn)
                    .await?;
                Ok(GameWithSides { game, sides })
            }
            .scope_boxed()
        })
        .await?;
    tracing::info!(
        game_id = created.game.id,
        season_id = ?created.game.season_id,
        match_type = match_type.as_str(),
        "Created game"
    );
    Ok(created)
}

pub async fn get_game(ctx: &Context, game_id: i64) -> AppResult<Game> {
    let mut pooled = ctx.get_db_conn().await?;
    find_live_game(&mut pooled, game_id)
        .await?
        .ok_or(AppError::NotFound("game"))
}

pub async fn get_game_with_sides(ctx: &Context, game_id: i64) -> AppResult<GameWithSides> {
    let mut pooled = ctx.get_db_conn().await?;
    let game = find_live_game(&mut pooled, game_id)
        .await?
        .ok_or(AppError::NotFound("game"))?;
    let sides = load_sides(&mut pooled, game_id).await?;
    Ok(GameWithSides { game, sides })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOrderColumn {
    Id,
    ScheduledAt,
    StartedAt,
    EndedAt,
    CreatedAt,
    TargetPoints,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameOrder {
    pub column: GameOrderColumn,
    pub descending: bool,
}

impl Default for GameOrder {
    fn default() -> Self {
        Self {
            column: GameOrderColumn::Id,
            descending: true,
        }
    }
}

impl GameOrder {
    /// Parses `<column> [asc|desc]`, the column optionally qualified with `games.`.
    pub fn parse(value: &str) -> AppResult<Self> {
        let invalid = || AppError::validation(format!("invalid orderBy: {}", value.trim()));
        let mut parts = value.split_whitespace();
        let Some(column) = parts.next() else {
            return Ok(Self::default());
        };
        let column = column.to_ascii_lowercase();
        let column = match column.strip_prefix("games.").unwrap_or(&column) {
            "id" => GameOrderColumn::Id,
            "scheduled_at" => GameOrderColumn::ScheduledAt,
            "started_at" => GameOrderColumn::StartedAt,
            "ended_at" => GameOrderColumn::EndedAt,
            "created_at" => GameOrderColumn::CreatedAt,
            "target_points" => GameOrderColumn::TargetPoints,
            "status" => GameOrderColumn::Status,
            _ => return Err(invalid()),
        };
        let descending = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => false,
            Some("desc") => true,
            Some(_) => return Err(invalid()),
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self { column, descending })
    }

    fn apply(self, query: games::BoxedQuery<'static, Pg>) -> games::BoxedQuery<'static, Pg> {
        use GameOrderColumn::*;
        let query = match (self.column, self.descending) {
            (Id, true) => query.order_by(games::id.desc()),
            (Id, false) => query.order_by(games::id.asc()),
            (ScheduledAt, true) => query.order_by(games::scheduled_at.desc()),
            (ScheduledAt, false) => query.order_by(games::scheduled_at.asc()),
            (StartedAt, true) => query.order_by(games::started_at.desc()),
            (StartedAt, false) => query.order_by(games::started_at.asc()),
            (EndedAt, true) => query.order_by(games::ended_at.desc()),
            (EndedAt, false) => query.order_by(games::ended_at.asc()),
            (CreatedAt, true) => query.order_by(games::created_at.desc()),
            (CreatedAt, false) => query.order_by(games::created_at.asc()),
            (TargetPoints, true) => query.order_by(games::target_points.desc()),
            (TargetPoints, false) => query.order_by(games::target_points.asc()),
            (Status, true) => query.order_by(games::status.desc()),
            (Status, false) => query.order_by(games::status.asc()),
        };
        query.then_order_by(games::id.desc())
    }
}

#[derive(Debug, Default)]
pub struct GameFilter {
    pub season_id: Option<i64>,
    pub exhibition_only: bool,
    pub statuses: Vec<GameStatus>,
    pub match_type: Option<MatchType>,
    pub scheduled_from: Option<DateTime<Utc>>,
    pub scheduled_to: Option<DateTime<Utc>>,
    pub team_id: Option<i64>,
    pub player_id: Option<i64>,
}

fn filtered(filter: &GameFilter) -> games::BoxedQuery<'static, Pg> {
    let mut query = games::table.filter(games::deleted_at.is_null()).into_boxed();
    if let Some(season_id) = filter.season_id {
        query = query.filter(games::season_id.eq(season_id));
    } else if filter.exhibition_only {
        query = query.filter(games::season_id.is_null());
    }
    if !filter.statuses.is_empty() {
        query = query.filter(games::status.eq_any(filter.statuses.clone()));
    }
    if let Some(match_type) = filter.match_type {
        query = query.filter(games::match_type.eq(match_type));
    }
    if let Some(from) = filter.scheduled_from {
        query = query.filter(games::scheduled_at.ge(from));
    }
    if let Some(to) = filter.scheduled_to {
        query = query.filter(games::scheduled_at.le(to));
    }
    if let Some(team_id) = filter.team_id {
        query = query.filter(
            games::id.eq_any(
                game_sides::table
                    .filter(game_sides::team_id.eq(team_id))
                    .filter(game_sides::deleted_at.is_null())
                    .select(game_sides::game_id),
            ),
        );
    }
    if let Some(player_id) = filter.player_id {
        query = query.filter(
            games::id.eq_any(
                game_sides::table
                    .filter(game_sides::player_id.eq(player_id))
                    .filter(game_sides::deleted_at.is_null())
                    .select(game_sides::game_id),
            ),
        );
    }
    query
}

pub async fn list_games(
    ctx: &Context,
    filter: GameFilter,
    order: GameOrder,
    pagination: Pagination,
) -> AppResult<Paged<Game>> {
    let mut pooled = ctx.get_db_conn().await?;
    let total: i64 = filtered(&filter).count().get_result(&mut pooled).await?;
    let data = order
        .apply(filtered(&filter))
        .limit(pagination.size)
        .offset(pagination.offset())
        .select(Game::as_select())
        .load(&mut pooled)
        .await?;
    Ok(Paged::new(data, total, pagination))
}

pub async fn update_game(ctx: &Context, game_id: i64, input: UpdateGameInput) -> AppResult<Game> {
    ctx.require_authentication()?;
    let target_status: Option<GameStatus> = input
        .status
        .as_deref()
        .map(str::parse)
        .transpose()
        .map_err(AppError::Validation)?;
    let target_points = input.target_points.map(validate_target_points).transpose()?;
    let scheduled_at = match input.scheduled_at {
        None => None,
        Some(None) => Some(None),
        Some(Some(v)) if v.trim().is_empty() => Some(None),
        Some(Some(v)) => Some(Some(parse_timestamp(&v, "scheduledAt")?)),
    };
    let timezone = input.timezone.as_deref().map(validate_timezone).transpose()?;
    let mut colors: Vec<(SideLabel, DiscColor)> = Vec::new();
    for (side, color) in [
        (SideLabel::A, &input.side_a_color),
        (SideLabel::B, &input.side_b_color),
    ] {
        if let Some(color) = color {
            colors.push((side, color.parse().map_err(AppError::Validation)?));
        }
    }

    let mut pooled = ctx.get_db_conn().await?;
    let conn: &mut AsyncPgConnection = &mut pooled;
    let season_id = input.season_id;
    let location = input.location.map(optional_text);
    let description = input.description.map(optional_text);

    let game = conn
        .transaction::<_, AppError, _>(move |conn| {
            async move {
                let current = lock_live_game(conn, game_id).await?;
                if let Some(Some(season_id)) = season_id {
                    if find_live_season(conn, season_id).await?.is_none() {
                        return Err(AppError::validation("season not found"));
                    }
                }

                let now = Utc::now();
                let mut changes = match target_status {
                    Some(status) => {
                        lifecycle::on_status_update(&GameState::from(&current), status, now)
                            .into_changes(now)
                    }
                    None => GameChanges {
                        updated_at: Some(now),
                        ..Default::default()
                    },
                };
                if !colors.is_empty() {
                    lifecycle::ensure_colors_editable(target_status.unwrap_or(current.status))?;
                }
                changes.season_id = season_id;
                changes.target_points = target_points;
                changes.scheduled_at = scheduled_at;
                changes.timezone = timezone;
                changes.location = location;
                changes.description = description;

                let game = write_game(conn, game_id, &changes).await?;
                for (side, color) in colors {
                    diesel::update(
                        game_sides::table
                            .filter(game_sides::game_id.eq(game_id))
                            .filter(game_sides::side.eq(side))
                            .filter(game_sides::deleted_at.is_null()),
                    )
                    .set((game_sides::color.eq(color), game_sides::updated_at.eq(now)))
                    .execute(conn)
                    .await?;
                }
                Ok(game)
            }
            .scope_boxed()
        })
        .await?;
    tracing::info!(game_id, status = game.status.as_str(), "Updated game");
    Ok(game)
}

pub async fn complete_game(
    ctx: &Context,
    game_id: i64,
    input: CompleteGameInput,
) -> AppResult<Game> {
    ctx.require_authentication()?;
    let winner: SideLabel = input.winner_side.parse().map_err(AppError::Validation)?;

    let mut pooled = ctx.get_db_conn().await?;
    let conn: &mut AsyncPgConnection = &mut pooled;
    let game = conn
        .transaction::<_, AppError, _>(move |conn| {
            async move {
                let current = lock_live_game(conn, game_id).await?;
                let now = Utc::now();
                let next = lifecycle::on_complete(&GameState::from(&current), winner, now)?;
                write_game(conn, game_id, &next.into_changes(now)).await
            }
            .scope_boxed()
        })
        .await?;
    tracing::info!(game_id, winner = winner.as_str(), "Completed game");
    Ok(game)
}

pub async fn delete_game(ctx: &Context, game_id: i64) -> AppResult<()> {
    ctx.require_authentication()?;
    let mut pooled = ctx.get_db_conn().await?;
    let conn: &mut AsyncPgConnection = &mut pooled;
    conn.transaction::<_, AppError, _>(move |conn| {
        async move {
            let now = Utc::now();
            let affected = diesel::update(
                games::table
                    .filter(games::id.eq(game_id))
                    .filter(games::deleted_at.is_null()),
            )
            .set((games::deleted_at.eq(Some(now)), games::updated_at.eq(now)))
            .execute(conn)
            .await?;
            if affected == 0 {
                return Err(AppError::NotFound("game"));
            }
            diesel::update(
                game_sides::table
                    .filter(game_sides::game_id.eq(game_id))
                    .filter(game_sides::deleted_at.is_null()),
            )
            .set((game_sides::deleted_at.eq(Some(now)), game_sides::updated_at.eq(now)))
            .execute(conn)
            .await?;
            Ok(())
        }
        .scope_boxed()
    })
    .await?;
    tracing::info!(game_id, "Deleted game");
    Ok(())
}
