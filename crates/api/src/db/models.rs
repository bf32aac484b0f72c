// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::schema::*;

#[derive(
    diesel_derive_enum::DbEnum,
    Debug,
    PartialEq,
    Eq,
    Deserialize,
    Serialize,
    Clone,
    Copy,
    Ord,
    PartialOrd,
)]
#[DbValueStyle = "snake_case"]
#[ExistingTypePath = "crate::db::schema::sql_types::UserRole"]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(diesel_derive_enum::DbEnum, Debug, PartialEq, Eq, Deserialize, Serialize, Clone, Copy)]
#[DbValueStyle = "snake_case"]
#[ExistingTypePath = "crate::db::schema::sql_types::MatchType"]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Teams,
    Players,
}

#[derive(diesel_derive_enum::DbEnum, Debug, PartialEq, Eq, Deserialize, Serialize, Clone, Copy)]
#[DbValueStyle = "snake_case"]
#[ExistingTypePath = "crate::db::schema::sql_types::GameStatus"]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Scheduled,
    InProgress,
    Completed,
    Canceled,
}

#[derive(
    diesel_derive_enum::DbEnum,
    Debug,
    PartialEq,
    Eq,
    Deserialize,
    Serialize,
    Clone,
    Copy,
    Hash,
    Ord,
    PartialOrd,
)]
#[DbValueStyle = "verbatim"]
#[ExistingTypePath = "crate::db::schema::sql_types::SideLabel"]
pub enum SideLabel {
    A,
    B,
}

#[derive(diesel_derive_enum::DbEnum, Debug, PartialEq, Eq, Deserialize, Serialize, Clone, Copy, Hash)]
#[DbValueStyle = "snake_case"]
#[ExistingTypePath = "crate::db::schema::sql_types::DiscColor"]
#[serde(rename_all = "snake_case")]
pub enum DiscColor {
    White,
    Black,
    Natural,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

impl MatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchType::Teams => "teams",
            MatchType::Players => "players",
        }
    }
}

impl GameStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Scheduled => "scheduled",
            GameStatus::InProgress => "in_progress",
            GameStatus::Completed => "completed",
            GameStatus::Canceled => "canceled",
        }
    }

    /// Completed and canceled games are closed for scoring and colour edits.
    pub fn is_final(self) -> bool {
        matches!(self, GameStatus::Completed | GameStatus::Canceled)
    }
}

impl SideLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            SideLabel::A => "A",
            SideLabel::B => "B",
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            SideLabel::A => SideLabel::B,
            SideLabel::B => SideLabel::A,
        }
    }
}

impl DiscColor {
    pub fn as_str(self) -> &'static str {
        match self {
            DiscColor::White => "white",
            DiscColor::Black => "black",
            DiscColor::Natural => "natural",
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("invalid role: {other}")),
        }
    }
}

impl FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "teams" => Ok(MatchType::Teams),
            "players" => Ok(MatchType::Players),
            _ => Err("matchType must be 'teams' or 'players'".to_string()),
        }
    }
}

impl FromStr for GameStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Ok(GameStatus::Scheduled),
            "in_progress" => Ok(GameStatus::InProgress),
            "completed" => Ok(GameStatus::Completed),
            "canceled" => Ok(GameStatus::Canceled),
            other => Err(format!("invalid status: {other}")),
        }
    }
}

impl FromStr for SideLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(SideLabel::A),
            "B" | "b" => Ok(SideLabel::B),
            _ => Err("side must be 'A' or 'B'".to_string()),
        }
    }
}

impl FromStr for DiscColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" => Ok(DiscColor::White),
            "black" => Ok(DiscColor::Black),
            "natural" => Ok(DiscColor::Natural),
            _ => Err("color must be one of white, black, natural".to_string()),
        }
    }
}

/* =========================
 * USERS
 * ========================= */

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub role: UserRole,
}

/* =========================
 * LEAGUES
 * ========================= */

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone)]
#[diesel(table_name = leagues)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct League {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = leagues)]
pub struct NewLeague {
    pub name: String,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = leagues)]
pub struct LeagueChanges {
    pub name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/* =========================
 * SEASONS
 * ========================= */

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Debug, Clone)]
#[diesel(table_name = seasons)]
#[diesel(belongs_to(League))]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub id: i64,
    pub league_id: i64,
    pub name: String,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    pub timezone: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = seasons)]
pub struct NewSeason {
    pub league_id: i64,
    pub name: String,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    pub timezone: String,
    pub description: Option<String>,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = seasons)]
pub struct SeasonChanges {
    pub league_id: Option<i64>,
    pub name: Option<String>,
    pub starts_on: Option<Option<NaiveDate>>,
    pub ends_on: Option<Option<NaiveDate>>,
    pub timezone: Option<String>,
    pub description: Option<Option<String>>,
    pub updated_at: DateTime<Utc>,
}

/* =========================
 * PLAYERS
 * ========================= */

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone)]
#[diesel(table_name = players)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: i64,
    pub user_id: Option<i64>,
    pub nickname: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = players)]
pub struct NewPlayer {
    pub user_id: Option<i64>,
    pub nickname: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = players)]
pub struct PlayerChanges {
    pub user_id: Option<Option<i64>>,
    pub nickname: Option<String>,
    pub first_name: Option<Option<String>>,
    pub last_name: Option<Option<String>>,
    pub updated_at: DateTime<Utc>,
}

/* =========================
 * TEAMS
 * ========================= */

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone)]
#[diesel(table_name = teams)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub player_a_id: i64,
    pub player_b_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = teams)]
pub struct NewTeam {
    pub name: String,
    pub description: Option<String>,
    pub player_a_id: i64,
    pub player_b_id: i64,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = teams)]
pub struct TeamChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub player_a_id: Option<i64>,
    pub player_b_id: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

/* =========================
 * TEAM SEASONS
 * ========================= */

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Debug, Clone)]
#[diesel(table_name = team_seasons)]
#[diesel(belongs_to(Team))]
#[diesel(belongs_to(Season))]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct TeamSeason {
    pub id: i64,
    pub team_id: i64,
    pub season_id: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = team_seasons)]
pub struct NewTeamSeason {
    pub team_id: i64,
    pub season_id: i64,
    pub is_active: bool,
}

/* =========================
 * GAMES
 * ========================= */

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone)]
#[diesel(table_name = games)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: i64,
    pub season_id: Option<i64>,
    pub match_type: MatchType,
    pub target_points: i32,
    pub status: GameStatus,
    pub winner_side: Option<SideLabel>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub timezone: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = games)]
pub struct NewGame {
    pub season_id: Option<i64>,
    pub match_type: MatchType,
    pub target_points: i32,
    pub status: GameStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub timezone: String,
    pub location: Option<String>,
    pub description: Option<String>,
}

#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = games)]
pub struct GameChanges {
    pub season_id: Option<Option<i64>>,
    pub target_points: Option<i32>,
    pub status: Option<GameStatus>,
    pub winner_side: Option<Option<SideLabel>>,
    pub scheduled_at: Option<Option<DateTime<Utc>>>,
    pub started_at: Option<Option<DateTime<Utc>>>,
    pub ended_at: Option<Option<DateTime<Utc>>>,
    pub timezone: Option<String>,
    pub location: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/* =========================
 * GAME SIDES
 * ========================= */

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Debug, Clone)]
#[diesel(table_name = game_sides)]
#[diesel(belongs_to(Game))]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct GameSide {
    pub id: i64,
    pub game_id: i64,
    pub side: SideLabel,
    pub team_id: Option<i64>,
    pub player_id: Option<i64>,
    pub color: DiscColor,
    pub points: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = game_sides)]
pub struct NewGameSide {
    pub game_id: i64,
    pub side: SideLabel,
    pub team_id: Option<i64>,
    pub player_id: Option<i64>,
    pub color: DiscColor,
    pub points: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_parsing_accepts_wire_values() {
        assert_eq!("teams".parse::<MatchType>(), Ok(MatchType::Teams));
        assert_eq!(" Players ".parse::<MatchType>(), Ok(MatchType::Players));
        assert_eq!("in_progress".parse::<GameStatus>(), Ok(GameStatus::InProgress));
        assert_eq!("b".parse::<SideLabel>(), Ok(SideLabel::B));
        assert_eq!("NATURAL".parse::<DiscColor>(), Ok(DiscColor::Natural));
        assert!("doubles".parse::<MatchType>().is_err());
        assert!("C".parse::<SideLabel>().is_err());
        assert!("red".parse::<DiscColor>().is_err());
    }

    #[test]
    fn test_enum_wire_names_round_trip_through_serde() {
        for status in [
            GameStatus::Scheduled,
            GameStatus::InProgress,
            GameStatus::Completed,
            GameStatus::Canceled,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert_eq!(serde_json::to_string(&SideLabel::A).unwrap(), "\"A\"");
        assert_eq!(serde_json::to_string(&UserRole::Admin).unwrap(), "\"admin\"");
    }

    #[test]
    fn test_role_ordering() {
        assert!(UserRole::Admin > UserRole::User);
    }

    #[test]
    fn test_closed_statuses() {
        assert!(GameStatus::Completed.is_final());
        assert!(GameStatus::Canceled.is_final());
        assert!(!GameStatus::Scheduled.is_final());
        assert!(!GameStatus::InProgress.is_final());
        assert_eq!(SideLabel::A.opponent(), SideLabel::B);
    }
}
