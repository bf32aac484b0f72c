// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::{collections::HashMap, error::Error as StdError, time::Instant};

use chrono::{DateTime, Utc};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::{
    Method, Request, Response, StatusCode,
    body::Body,
    header::{self, HeaderValue},
};
use serde::{Serialize, de::DeserializeOwned};

use super::{
    AuthenticatedUser, BaseContext, Context,
    auth::{AuthJwtPayload, parse_and_validate_jwt},
    handlers::{
        Pagination, game_sides,
        games::{self, GameFilter, GameOrder, parse_timestamp},
        leagues, players,
        seasons::{self, SeasonFilter},
        standings,
        team_seasons::{self, TeamSeasonFilter},
        teams::{self, TeamFilter},
        users,
    },
};
use crate::{
    db::models::{GameStatus, SideLabel},
    error::{AppError, AppResult},
};

const API_PREFIX: &str = "/api/v1";
const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS, PATCH";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization";
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Health,
    Register,
    Login,
    GetUser(i64),
    UpdateUserName(i64),
    UpdateUserRole(i64),

    CreateLeague,
    ListLeagues,
    GetLeague(i64),
    UpdateLeague(i64),
    DeleteLeague(i64),

    CreateSeason,
    ListSeasons,
    GetSeason(i64),
    UpdateSeason(i64),
    DeleteSeason(i64),
    TeamStandings(i64),
    PlayerStandings(i64),
    PlayerStats(i64),
    TeamStats(i64),
    TeamsOfSeason(i64),

    CreatePlayer,
    ListPlayers,
    GetPlayer(i64),
    UpdatePlayer(i64),
    DeletePlayer(i64),
    DuplicateGames(i64),

    CreateTeam,
    ListTeams,
    GetTeam(i64),
    UpdateTeam(i64),
    DeleteTeam(i64),
    SeasonsOfTeam(i64),

    LinkTeamSeason,
    ListTeamSeasons,
    SetTeamSeasonActive(i64, i64),
    UnlinkTeamSeason(i64, i64),

    CreateGame,
    ListGames,
    GetGame(i64),
    GetGameWithSides(i64),
    UpdateGame(i64),
    DeleteGame(i64),
    CompleteGame(i64),
    ListSides(i64),
    SetSideColor(i64, SideLabel),
    AddPoints(i64, SideLabel),
    SetPoints(i64, SideLabel),
}

impl Route {
    /// Every write and every `/users` route needs a token, except signing up and in.
    fn requires_auth(&self, method: &Method) -> bool {
        match self {
            Route::Health | Route::Register | Route::Login => false,
            Route::GetUser(_) | Route::UpdateUserName(_) | Route::UpdateUserRole(_) => true,
            _ => method != Method::GET,
        }
    }
}

fn path_id(segment: &str) -> AppResult<i64> {
    segment
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::validation("invalid id"))
}

fn path_side(segment: &str) -> AppResult<SideLabel> {
    segment.parse().map_err(AppError::Validation)
}

fn parse_route(method: &Method, path: &str) -> AppResult<Route> {
    let rest = path
        .strip_prefix(API_PREFIX)
        .ok_or(AppError::NotFound("route"))?;
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    use Route::*;
    let route = match (method, segments.as_slice()) {
        (&Method::GET, ["health"]) => Health,

        (&Method::POST, ["auth", "register"]) => Register,
        (&Method::POST, ["auth", "login"]) => Login,
        (&Method::GET, ["users", id]) => GetUser(path_id(id)?),
        (&Method::PUT, ["users", id, "name"]) => UpdateUserName(path_id(id)?),
        (&Method::PUT, ["users", id, "role"]) => UpdateUserRole(path_id(id)?),

        (&Method::POST, ["leagues"]) => CreateLeague,
        (&Method::GET, ["leagues"]) => ListLeagues,
        (&Method::GET, ["leagues", id]) => GetLeague(path_id(id)?),
        (&Method::PUT, ["leagues", id]) => UpdateLeague(path_id(id)?),
        (&Method::DELETE, ["leagues", id]) => DeleteLeague(path_id(id)?),

        (&Method::POST, ["seasons"]) => CreateSeason,
        (&Method::GET, ["seasons"]) => ListSeasons,
        (&Method::GET, ["seasons", id]) => GetSeason(path_id(id)?),
        (&Method::PUT, ["seasons", id]) => UpdateSeason(path_id(id)?),
        (&Method::DELETE, ["seasons", id]) => DeleteSeason(path_id(id)?),
        (&Method::GET, ["seasons", id, "standings"]) => TeamStandings(path_id(id)?),
        (&Method::GET, ["seasons", id, "standings", "players"]) => PlayerStandings(path_id(id)?),
        (&Method::GET, ["seasons", id, "stats", "players"]) => PlayerStats(path_id(id)?),
        (&Method::GET, ["seasons", id, "stats", "teams"]) => TeamStats(path_id(id)?),
        (&Method::GET, ["seasons", id, "teams"]) => TeamsOfSeason(path_id(id)?),

        (&Method::POST, ["players"]) => CreatePlayer,
        (&Method::GET, ["players"]) => ListPlayers,
        (&Method::GET, ["players", id]) => GetPlayer(path_id(id)?),
        (&Method::PUT, ["players", id]) => UpdatePlayer(path_id(id)?),
        (&Method::DELETE, ["players", id]) => DeletePlayer(path_id(id)?),
        (&Method::GET, ["players", id, "duplicate-games"]) => DuplicateGames(path_id(id)?),

        (&Method::POST, ["teams"]) => CreateTeam,
        (&Method::GET, ["teams"]) => ListTeams,
        (&Method::GET, ["teams", id]) => GetTeam(path_id(id)?),
        (&Method::PUT, ["teams", id]) => UpdateTeam(path_id(id)?),
        (&Method::DELETE, ["teams", id]) => DeleteTeam(path_id(id)?),
        (&Method::GET, ["teams", id, "seasons"]) => SeasonsOfTeam(path_id(id)?),

        (&Method::POST, ["team-seasons"]) => LinkTeamSeason,
        (&Method::GET, ["team-seasons"]) => ListTeamSeasons,
        (&Method::PUT, ["team-seasons", team, season, "active"]) => {
            SetTeamSeasonActive(path_id(team)?, path_id(season)?)
        }
        (&Method::DELETE, ["team-seasons", team, season]) => {
            UnlinkTeamSeason(path_id(team)?, path_id(season)?)
        }

        (&Method::POST, ["games"]) => CreateGame,
        (&Method::GET, ["games"]) => ListGames,
        (&Method::GET, ["games", id]) => GetGame(path_id(id)?),
        (&Method::GET, ["games", id, "with-sides"]) => GetGameWithSides(path_id(id)?),
        (&Method::PUT, ["games", id]) => UpdateGame(path_id(id)?),
        (&Method::DELETE, ["games", id]) => DeleteGame(path_id(id)?),
        (&Method::POST, ["games", id, "complete"]) => CompleteGame(path_id(id)?),
        (&Method::GET, ["games", id, "sides"]) => ListSides(path_id(id)?),
        (&Method::PUT, ["games", id, "sides", side, "color"]) => {
            SetSideColor(path_id(id)?, path_side(side)?)
        }
        (&Method::POST, ["games", id, "sides", side, "points", "add"]) => {
            AddPoints(path_id(id)?, path_side(side)?)
        }
        (&Method::PUT, ["games", id, "sides", side, "points"]) => {
            SetPoints(path_id(id)?, path_side(side)?)
        }

        _ => return Err(AppError::NotFound("route")),
    };
    Ok(route)
}

/// Accepts `true/false/1/0/yes/no/y/n` in any case.
pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub(crate) struct QueryParams(HashMap<String, String>);

impl QueryParams {
    /// The first occurrence of a key wins. Undecodable pairs are dropped.
    fn parse(raw: Option<&str>) -> Self {
        let mut params = HashMap::new();
        for pair in raw.unwrap_or_default().split('&') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let decode = |s: &str| {
                urlencoding::decode(&s.replace('+', " "))
                    .ok()
                    .map(|cow| cow.into_owned())
            };
            if let (Some(key), Some(value)) = (decode(key), decode(value)) {
                params.entry(key).or_insert(value);
            }
        }
        Self(params)
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn id(&self, key: &str) -> AppResult<Option<i64>> {
        self.get(key)
            .map(|v| {
                v.parse::<i64>()
                    .ok()
                    .filter(|id| *id > 0)
                    .ok_or_else(|| AppError::validation(format!("invalid {key}")))
            })
            .transpose()
    }

    /// Integer or nothing; junk falls back to the caller's default.
    fn lenient_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    fn flag(&self, key: &str) -> AppResult<Option<bool>> {
        self.get(key)
            .map(|v| parse_flag(v).ok_or_else(|| AppError::validation(format!("invalid {key}"))))
            .transpose()
    }

    fn timestamp(&self, key: &str) -> AppResult<Option<DateTime<Utc>>> {
        self.get(key).map(|v| parse_timestamp(v, key)).transpose()
    }

    fn pagination(&self) -> Pagination {
        Pagination::new(self.lenient_int("page"), self.lenient_int("size"))
    }

    fn q(&self) -> Option<String> {
        self.get("q").map(str::to_string)
    }

    fn game_filter(&self) -> AppResult<(GameFilter, GameOrder)> {
        let statuses = match self.get("status") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<GameStatus>().map_err(AppError::Validation))
                .collect::<AppResult<Vec<_>>>()?,
            None => Vec::new(),
        };
        let filter = GameFilter {
            season_id: self.id("seasonId")?,
            exhibition_only: self.flag("exhibitionOnly")?.unwrap_or(false),
            statuses,
            match_type: self
                .get("matchType")
                .map(str::parse)
                .transpose()
                .map_err(AppError::Validation)?,
            scheduled_from: self.timestamp("scheduledFrom")?,
            scheduled_to: self.timestamp("scheduledTo")?,
            team_id: self.id("teamId")?,
            player_id: self.id("playerId")?,
        };
        let order = self
            .get("orderBy")
            .map(GameOrder::parse)
            .transpose()?
            .unwrap_or_default();
        Ok((filter, order))
    }
}

struct Reply {
    status: StatusCode,
    body: String,
}

fn reply<T: Serialize>(status: StatusCode, value: &T) -> AppResult<Reply> {
    let body = serde_json::to_string(value).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Reply { status, body })
}

fn ok<T: Serialize>(value: AppResult<T>) -> AppResult<Reply> {
    reply(StatusCode::OK, &value?)
}

fn created<T: Serialize>(value: AppResult<T>) -> AppResult<Reply> {
    reply(StatusCode::CREATED, &value?)
}

fn no_content(value: AppResult<()>) -> AppResult<Reply> {
    value?;
    Ok(Reply {
        status: StatusCode::NO_CONTENT,
        body: String::new(),
    })
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> AppResult<T> {
    serde_json::from_slice(body).map_err(|e| AppError::validation(format!("invalid JSON body: {e}")))
}

async fn dispatch(ctx: Context, route: Route, query: QueryParams, body: Vec<u8>) -> AppResult<Reply> {
    use Route::*;
    let ctx = &ctx;
    match route {
        Health => reply(StatusCode::OK, &serde_json::json!({ "status": "ok" })),
        Register => created(users::register_user(ctx, decode(&body)?).await),
        Login => ok(users::login_user(ctx, decode(&body)?).await),
        GetUser(id) => ok(users::get_user(ctx, id).await),
        UpdateUserName(id) => ok(users::update_user_name(ctx, id, decode(&body)?).await),
        UpdateUserRole(id) => ok(users::update_user_role(ctx, id, decode(&body)?).await),

        CreateLeague => created(leagues::create_league(ctx, decode(&body)?).await),
        ListLeagues => ok(leagues::list_leagues(ctx, query.get("q"), query.pagination()).await),
        GetLeague(id) => ok(leagues::get_league(ctx, id).await),
        UpdateLeague(id) => ok(leagues::update_league(ctx, id, decode(&body)?).await),
        DeleteLeague(id) => no_content(leagues::delete_league(ctx, id).await),

        CreateSeason => created(seasons::create_season(ctx, decode(&body)?).await),
        ListSeasons => {
            let filter = SeasonFilter {
                q: query.q(),
                league_id: query.id("leagueId")?,
            };
            ok(seasons::list_seasons(ctx, filter, query.pagination()).await)
        }
        GetSeason(id) => ok(seasons::get_season(ctx, id).await),
        UpdateSeason(id) => ok(seasons::update_season(ctx, id, decode(&body)?).await),
        DeleteSeason(id) => no_content(seasons::delete_season(ctx, id).await),
        TeamStandings(id) => ok(standings::team_standings(ctx, id).await),
        PlayerStandings(id) => ok(standings::player_standings(
            ctx,
            id,
            query.lenient_int("limit"),
            query.get("cursor"),
        )
        .await),
        PlayerStats(id) => ok(standings::player_stats(ctx, id).await),
        TeamStats(id) => ok(standings::team_stats(ctx, id).await),
        TeamsOfSeason(id) => {
            let list = team_seasons::list_teams_for_season(ctx, id, query.flag("onlyActive")?).await;
            ok(list.map(|data| serde_json::json!({ "data": data })))
        }

        CreatePlayer => created(players::create_player(ctx, decode(&body)?).await),
        ListPlayers => ok(players::list_players(ctx, query.get("q"), query.pagination()).await),
        GetPlayer(id) => ok(players::get_player(ctx, id).await),
        UpdatePlayer(id) => ok(players::update_player(ctx, id, decode(&body)?).await),
        DeletePlayer(id) => no_content(players::delete_player(ctx, id).await),
        DuplicateGames(id) => ok(standings::duplicate_games(ctx, id).await),

        CreateTeam => created(teams::create_team(ctx, decode(&body)?).await),
        ListTeams => {
            let filter = TeamFilter {
                q: query.q(),
                player_id: query.id("playerId")?,
                season_id: query.id("seasonId")?,
                only_active: query.flag("onlyActive")?,
            };
            ok(teams::list_teams(ctx, filter, query.pagination()).await)
        }
        GetTeam(id) => ok(teams::get_team(ctx, id).await),
        UpdateTeam(id) => ok(teams::update_team(ctx, id, decode(&body)?).await),
        DeleteTeam(id) => no_content(teams::delete_team(ctx, id).await),
        SeasonsOfTeam(id) => {
            let list = team_seasons::list_seasons_for_team(ctx, id, query.flag("onlyActive")?).await;
            ok(list.map(|data| serde_json::json!({ "data": data })))
        }

        LinkTeamSeason => created(team_seasons::link_team_season(ctx, decode(&body)?).await),
        ListTeamSeasons => {
            let filter = TeamSeasonFilter {
                team_id: query.id("teamId")?,
                season_id: query.id("seasonId")?,
                only_active: query.flag("onlyActive")?,
            };
            ok(team_seasons::list_team_seasons(ctx, filter, query.pagination()).await)
        }
        SetTeamSeasonActive(team_id, season_id) => ok(team_seasons::set_team_season_active(
            ctx,
            team_id,
            season_id,
            decode(&body)?,
        )
        .await),
        UnlinkTeamSeason(team_id, season_id) => {
            no_content(team_seasons::unlink_team_season(ctx, team_id, season_id).await)
        }

        CreateGame => created(games::create_game(ctx, decode(&body)?).await),
        ListGames => {
            let (filter, order) = query.game_filter()?;
            ok(games::list_games(ctx, filter, order, query.pagination()).await)
        }
        GetGame(id) => ok(games::get_game(ctx, id).await),
        GetGameWithSides(id) => ok(games::get_game_with_sides(ctx, id).await),
        UpdateGame(id) => ok(games::update_game(ctx, id, decode(&body)?).await),
        DeleteGame(id) => no_content(games::delete_game(ctx, id).await),
        CompleteGame(id) => ok(games::complete_game(ctx, id, decode(&body)?).await),
        ListSides(id) => {
            let sides = game_sides::list_sides(ctx, id).await;
            ok(sides.map(|data| serde_json::json!({ "data": data })))
        }
        SetSideColor(id, side) => ok(game_sides::set_side_color(ctx, id, side, decode(&body)?).await),
        AddPoints(id, side) => ok(game_sides::add_points(ctx, id, side, decode(&body)?).await),
        SetPoints(id, side) => ok(game_sides::set_points(ctx, id, side, decode(&body)?).await),
    }
}

fn bearer_user(base: &BaseContext, headers: &hyper::HeaderMap) -> Option<AuthenticatedUser> {
    let auth_str = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?.trim();
    let jwt = match parse_and_validate_jwt::<AuthJwtPayload>(token, &base.keypair.verifying_key()) {
        Ok(jwt) => jwt,
        Err(e) => {
            tracing::debug!("Ignoring bearer token: {e}");
            return None;
        }
    };
    Some(AuthenticatedUser {
        user_id: jwt.sub.parse().ok()?,
        email: jwt.custom_fields.email,
        role: jwt.custom_fields.role,
    })
}

fn cors_origin(base: &BaseContext, origin: Option<&str>) -> String {
    match origin {
        Some(origin) if base.config.is_allowed_origin(origin) => origin.to_string(),
        _ => base.config.front_end_url.clone(),
    }
}

fn finish(status: StatusCode, body: String, origin: &str) -> Response<String> {
    let is_empty = body.is_empty();
    let mut resp = Response::new(body);
    *resp.status_mut() = status;
    let headers = resp.headers_mut();
    if let Ok(origin) = HeaderValue::from_str(origin) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    if !is_empty {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }
    resp
}

fn error_body(err: &AppError) -> String {
    serde_json::json!({ "error": err.public_message() }).to_string()
}

async fn read_body<B>(body: B) -> AppResult<Vec<u8>>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => Ok(collected.to_bytes().to_vec()),
        Err(e) if e.is::<LengthLimitError>() => Err(AppError::PayloadTooLarge),
        Err(e) => Err(AppError::validation(format!(
            "failed to read request body: {e}"
        ))),
    }
}

async fn route_request<B>(base: BaseContext, req: Request<B>) -> AppResult<Reply>
where
    B: Body + Send,
    B::Data: Send,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let route = parse_route(req.method(), req.uri().path())?;
    let user = bearer_user(&base, req.headers());
    if route.requires_auth(req.method()) && user.is_none() {
        return Err(AppError::Unauthorized);
    }
    let query = QueryParams::parse(req.uri().query());
    let has_body = matches!(*req.method(), Method::POST | Method::PUT | Method::PATCH);

    // The deadline covers reading the body as well as the handler.
    let timeout = base.config.request_timeout;
    let work = async move {
        let body = if has_body {
            read_body(req.into_body()).await?
        } else {
            Vec::new()
        };
        dispatch(Context::new(base, user), route, query, body).await
    };
    tokio::time::timeout(timeout, work)
        .await
        .map_err(|_| AppError::Internal("request timed out".to_string()))?
}

/// Entry point for every HTTP request.
pub async fn handle<B>(base: BaseContext, req: Request<B>) -> Response<String>
where
    B: Body + Send,
    B::Data: Send,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let origin = cors_origin(
        &base,
        req.headers()
            .get(header::ORIGIN)
            .and_then(|o| o.to_str().ok()),
    );

    if method == Method::OPTIONS {
        return finish(StatusCode::NO_CONTENT, String::new(), &origin);
    }

    let (status, body) = match route_request(base, req).await {
        Ok(reply) => (reply.status, reply.body),
        Err(err) => {
            if err.status().is_server_error() {
                tracing::error!(%method, %path, "Request failed: {err}");
            }
            (err.status(), error_body(&err))
        }
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    if status.is_server_error() {
        tracing::error!(%method, %path, status = status.as_u16(), elapsed_ms, "Handled request");
    } else if status.is_client_error() {
        tracing::warn!(%method, %path, status = status.as_u16(), elapsed_ms, "Handled request");
    } else {
        tracing::debug!(%method, %path, status = status.as_u16(), elapsed_ms, "Handled request");
    }
    finish(status, body, &origin)
}
