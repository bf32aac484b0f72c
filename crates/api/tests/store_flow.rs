// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! End-to-end flows against a real Postgres. They only run when
//! `DATABASE_URL` is set; the embedded migrations are applied once per run.

use std::{
    path::PathBuf,
    sync::{
        Arc, Once,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use diesel::Connection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use ed25519_dalek::SigningKey;
use hyper::{Method, Request, Response, StatusCode};
use league_api::{
    api::{
        self, BaseContext,
        auth::{AuthJwtPayload, JwtPayload, generate_jwt},
    },
    config::Config,
    db::{self, models::UserRole},
};
use rand::rngs::OsRng;
use serde_json::{Value, json};

static MIGRATED: Once = Once::new();
static SEQ: AtomicU64 = AtomicU64::new(0);

struct Store {
    ctx: BaseContext,
    token: String,
}

async fn store() -> Option<Store> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };
    MIGRATED.call_once(|| {
        let mut conn = diesel::pg::PgConnection::establish(&database_url)
            .expect("database should be reachable");
        db::run_migrations(&mut conn).expect("migrations should apply");
    });

    let config = Config {
        database_url,
        port: 0,
        front_end_url: "http://localhost:3000".to_string(),
        jwt_issuer: "league-api".to_string(),
        jwt_exp: Duration::from_secs(600),
        signing_key_file: PathBuf::from("unused.json"),
        db_pool_size: 2,
        db_connect_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(10),
    };
    let manager =
        AsyncDieselConnectionManager::<diesel_async::AsyncPgConnection>::new(&config.database_url);
    let db_pool = diesel_async::pooled_connection::bb8::Pool::builder()
        .max_size(config.db_pool_size)
        .connection_timeout(config.db_connect_timeout)
        .build(manager)
        .await
        .expect("pool should build");
    let ctx = BaseContext {
        db_pool,
        keypair: SigningKey::generate(&mut OsRng),
        config: Arc::new(config),
    };
    let payload = JwtPayload::new_with_duration(
        "1".to_string(),
        "league-api".to_string(),
        AuthJwtPayload {
            email: "scorekeeper@example.org".to_string(),
            role: UserRole::User,
        },
        Duration::from_secs(600),
    );
    let token = generate_jwt(&payload, &ctx.keypair).expect("token should sign");
    Some(Store { ctx, token })
}

/// Distinct per test run so parallel tests and reruns never collide.
fn unique(prefix: &str) -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{prefix}-{nanos}-{}", SEQ.fetch_add(1, Ordering::Relaxed))
}

impl Store {
    async fn raw(&self, method: Method, uri: &str, body: Option<Value>) -> Response<String> {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", format!("Bearer {}", self.token))
            .body(body.map(|b| b.to_string()).unwrap_or_default())
            .expect("request should build");
        api::handle(self.ctx.clone(), req).await
    }

    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let resp = self.raw(method, uri, body).await;
        let value = if resp.body().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(resp.body()).expect("response is JSON")
        };
        (resp.status(), value)
    }

    async fn create(&self, uri: &str, body: Value) -> Value {
        let (status, value) = self.call(Method::POST, uri, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "POST {uri}: {value}");
        value
    }

    async fn player(&self) -> i64 {
        let player = self
            .create("/api/v1/players", json!({ "nickname": unique("player") }))
            .await;
        player["id"].as_i64().expect("player id")
    }

    async fn team(&self) -> i64 {
        let (a, b) = (self.player().await, self.player().await);
        let team = self
            .create(
                "/api/v1/teams",
                json!({ "name": unique("team"), "playerAId": a, "playerBId": b }),
            )
            .await;
        team["id"].as_i64().expect("team id")
    }

    async fn season(&self) -> i64 {
        let league = self
            .create("/api/v1/leagues", json!({ "name": unique("league") }))
            .await;
        let season = self
            .create(
                "/api/v1/seasons",
                json!({ "leagueId": league["id"], "name": unique("season") }),
            )
            .await;
        season["id"].as_i64().expect("season id")
    }

    async fn team_game(&self, season_id: i64) -> i64 {
        let (a, b) = (self.team().await, self.team().await);
        let created = self
            .create(
                "/api/v1/games",
                json!({
                    "seasonId": season_id,
                    "matchType": "teams",
                    "sideA": { "teamId": a },
                    "sideB": { "teamId": b },
                }),
            )
            .await;
        created["game"]["id"].as_i64().expect("game id")
    }
}

#[tokio::test]
async fn test_reversed_player_pair_conflicts() {
    let Some(store) = store().await else { return };
    let (a, b) = (store.player().await, store.player().await);

    let team = store
        .create(
            "/api/v1/teams",
            json!({ "name": unique("team"), "playerAId": b, "playerBId": a }),
        )
        .await;
    assert_eq!(team["playerAId"].as_i64(), Some(a.min(b)));
    assert_eq!(team["playerBId"].as_i64(), Some(a.max(b)));

    let (status, body) = store
        .call(
            Method::POST,
            "/api/v1/teams",
            Some(json!({ "name": unique("team"), "playerAId": a, "playerBId": b })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "team for this player pair already exists");
}

#[tokio::test]
async fn test_relinking_revives_an_unlinked_team_season() {
    let Some(store) = store().await else { return };
    let (team_id, season_id) = (store.team().await, store.season().await);

    let link = store
        .create(
            "/api/v1/team-seasons",
            json!({ "teamId": team_id, "seasonId": season_id }),
        )
        .await;
    assert_eq!(link["isActive"], true);

    let unlink = format!("/api/v1/team-seasons/{team_id}/{season_id}");
    let (status, _) = store.call(Method::DELETE, &unlink, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = store.call(Method::DELETE, &unlink, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let listing = format!("/api/v1/team-seasons?teamId={team_id}");
    let (_, page) = store.call(Method::GET, &listing, None).await;
    assert_eq!(page["total"], 0);

    let revived = store
        .create(
            "/api/v1/team-seasons",
            json!({ "teamId": team_id, "seasonId": season_id, "isActive": false }),
        )
        .await;
    assert_eq!(revived["id"], link["id"]);
    assert_eq!(revived["isActive"], false);

    let (_, page) = store.call(Method::GET, &listing, None).await;
    assert_eq!(page["total"], 1);
}

#[tokio::test]
async fn test_game_is_stored_with_both_sides_or_not_at_all() {
    let Some(store) = store().await else { return };
    let season_id = store.season().await;
    let (a, b) = (store.team().await, store.team().await);

    let created = store
        .create(
            "/api/v1/games",
            json!({
                "seasonId": season_id,
                "matchType": "teams",
                "sideA": { "teamId": a },
                "sideB": { "teamId": b, "color": "black" },
            }),
        )
        .await;
    assert_eq!(created["game"]["status"], "scheduled");
    let sides = created["sides"].as_array().expect("sides");
    assert_eq!(sides.len(), 2);
    assert_eq!(sides[0]["side"], "A");
    assert_eq!(sides[0]["color"], "natural");
    assert_eq!(sides[1]["color"], "black");
    assert!(sides.iter().all(|s| s["points"] == 0));

    let (status, _) = store
        .call(
            Method::POST,
            "/api/v1/games",
            Some(json!({
                "seasonId": season_id,
                "matchType": "teams",
                "sideA": { "teamId": a },
                "sideB": { "teamId": i64::MAX },
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, page) = store
        .call(Method::GET, &format!("/api/v1/games?seasonId={season_id}"), None)
        .await;
    assert_eq!(page["total"], 1);
    let game_id = created["game"]["id"].as_i64().expect("game id");
    let (_, sides) = store
        .call(Method::GET, &format!("/api/v1/games/{game_id}/sides"), None)
        .await;
    assert_eq!(sides["data"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_first_score_starts_the_game_once() {
    let Some(store) = store().await else { return };
    let game_id = store.team_game(store.season().await).await;

    let (status, first) = store
        .call(
            Method::POST,
            &format!("/api/v1/games/{game_id}/sides/A/points/add"),
            Some(json!({ "delta": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{first}");
    assert_eq!(first["game"]["status"], "in_progress");
    let started_at = first["game"]["startedAt"].clone();
    assert!(started_at.is_string());

    let (_, second) = store
        .call(
            Method::POST,
            &format!("/api/v1/games/{game_id}/sides/B/points/add"),
            Some(json!({ "delta": 2 })),
        )
        .await;
    assert_eq!(second["game"]["status"], "in_progress");
    assert_eq!(second["game"]["startedAt"], started_at);
    assert_eq!(second["sides"][0]["points"], 3);
    assert_eq!(second["sides"][1]["points"], 2);

    let (_, stored) = store
        .call(Method::GET, &format!("/api/v1/games/{game_id}"), None)
        .await;
    assert_eq!(stored["startedAt"], started_at);
}

#[tokio::test]
async fn test_completion_stamps_the_end_once() {
    let Some(store) = store().await else { return };
    let game_id = store.team_game(store.season().await).await;
    let complete = format!("/api/v1/games/{game_id}/complete");

    let (status, done) = store
        .call(Method::POST, &complete, Some(json!({ "winnerSide": "A" })))
        .await;
    assert_eq!(status, StatusCode::OK, "{done}");
    assert_eq!(done["status"], "completed");
    assert_eq!(done["winnerSide"], "A");
    let ended_at = done["endedAt"].clone();
    assert!(ended_at.is_string());

    let (_, again) = store
        .call(Method::POST, &complete, Some(json!({ "winnerSide": "B" })))
        .await;
    assert_eq!(again["winnerSide"], "B");
    assert_eq!(again["endedAt"], ended_at);

    let (status, _) = store
        .call(
            Method::POST,
            &format!("/api/v1/games/{game_id}/sides/A/points/add"),
            Some(json!({ "delta": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_failures_share_one_response() {
    let Some(store) = store().await else { return };
    let email = format!("{}@example.org", unique("captain"));
    store
        .create(
            "/api/v1/auth/register",
            json!({ "email": email, "password": "hunter22" }),
        )
        .await;

    let wrong_password = store
        .raw(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": email, "password": "hunter23" })),
        )
        .await;
    let unknown_email = store
        .raw(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": format!("nobody-{email}"), "password": "hunter22" })),
        )
        .await;
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body(), unknown_email.body());

    let (status, session) = store
        .call(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": email.to_uppercase(), "password": "hunter22" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(session["token"].is_string());
    assert_eq!(session["user"]["email"], email);
}
