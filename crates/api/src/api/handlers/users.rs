// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::{
    api::{
        Context,
        auth::{AuthJwtPayload, JwtPayload, generate_jwt, hash_password, verify_password},
    },
    db::{
        models::{NewUser, User, UserRole},
        schema::users,
    },
    error::{AppError, AppResult},
};

const EMAIL_IN_USE: &str = "email already in use";

#[derive(Deserialize, Debug)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct UpdateNameInput {
    pub name: String,
}

#[derive(Deserialize, Debug)]
pub struct UpdateRoleInput {
    pub role: String,
}

#[derive(Serialize, Debug)]
pub struct UserEnvelope {
    pub user: User,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionCredentials {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Lowercases and sanity-checks an address. Full RFC 5322 parsing is not attempted.
pub fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(AppError::validation("invalid email"));
    }
    Ok(email)
}

pub fn validate_password(password: &str) -> AppResult<()> {
    let len = password.chars().count();
    if !(6..=128).contains(&len) {
        return Err(AppError::validation("password must be 6-128 characters"));
    }
    Ok(())
}

pub fn validate_display_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    let len = name.chars().count();
    if !(2..=100).contains(&len) {
        return Err(AppError::validation("name must be 2-100 characters"));
    }
    Ok(name.to_string())
}

/// Runs argon2 work on the blocking pool so it does not stall request workers.
async fn off_runtime<T, F>(work: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("password task failed: {e}")))?
}

/// Decides a login attempt. An unknown email still pays for one hash, and
/// both failures produce the same error.
pub fn authenticate(user: Option<User>, password: &str) -> AppResult<User> {
    let Some(user) = user else {
        let _ = hash_password(password);
        return Err(AppError::InvalidCredentials);
    };
    if !verify_password(password, &user.password_hash) {
        tracing::warn!(user_id = user.id, "Rejected login");
        return Err(AppError::InvalidCredentials);
    }
    Ok(user)
}

async fn find_user(conn: &mut AsyncPgConnection, user_id: i64) -> AppResult<User> {
    users::table
        .filter(users::id.eq(user_id))
        .select(User::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or(AppError::NotFound("user"))
}

pub async fn register_user(ctx: &Context, input: RegisterInput) -> AppResult<UserEnvelope> {
    let email = normalize_email(&input.email)?;
    validate_password(&input.password)?;
    let name = match input.name.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(name) => Some(validate_display_name(name)?),
    };

    let mut pooled = ctx.get_db_conn().await?;
    let taken: i64 = users::table
        .filter(users::email.eq(&email))
        .count()
        .get_result(&mut pooled)
        .await?;
    if taken > 0 {
        return Err(AppError::Conflict(EMAIL_IN_USE.to_string()));
    }
    let user_count: i64 = users::table.count().get_result(&mut pooled).await?;
    let role = if user_count == 0 {
        UserRole::Admin
    } else {
        UserRole::User
    };

    let password = input.password;
    let password_hash = off_runtime(move || Ok(hash_password(&password)?)).await?;
    let new_user = NewUser {
        email,
        name,
        password_hash,
        role,
    };
    let user = diesel::insert_into(users::table)
        .values(&new_user)
        .returning(User::as_returning())
        .get_result(&mut pooled)
        .await
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::Conflict(EMAIL_IN_USE.to_string())
            }
            other => other.into(),
        })?;
    tracing::info!(user_id = user.id, role = user.role.as_str(), "Registered user");
    Ok(UserEnvelope { user })
}

pub async fn login_user(ctx: &Context, input: LoginInput) -> AppResult<SessionCredentials> {
    let email = input.email.trim().to_lowercase();
    let mut pooled = ctx.get_db_conn().await?;
    let user = users::table
        .filter(users::email.eq(&email))
        .select(User::as_select())
        .first(&mut pooled)
        .await
        .optional()?;
    drop(pooled);

    let password = input.password;
    let user = off_runtime(move || authenticate(user, &password)).await?;

    let config = ctx.config();
    let payload = JwtPayload::new_with_duration(
        user.id.to_string(),
        config.jwt_issuer.clone(),
        AuthJwtPayload {
            email: user.email.clone(),
            role: user.role,
        },
        config.jwt_exp,
    );
    let token = generate_jwt(&payload, ctx.get_signing_key())?;
    let expires_at = DateTime::from_timestamp(payload.exp, 0)
        .ok_or_else(|| AppError::Internal("token expiry out of range".to_string()))?;
    tracing::info!(user_id = user.id, "User logged in");
    Ok(SessionCredentials {
        token,
        expires_at,
        user,
    })
}

pub async fn get_user(ctx: &Context, user_id: i64) -> AppResult<User> {
    ctx.require_authentication()?;
    let mut pooled = ctx.get_db_conn().await?;
    find_user(&mut pooled, user_id).await
}

pub async fn update_user_name(
    ctx: &Context,
    user_id: i64,
    input: UpdateNameInput,
) -> AppResult<User> {
    let current = ctx.require_authentication()?;
    if current.user_id != user_id && current.role < UserRole::Admin {
        return Err(AppError::Forbidden);
    }
    let name = validate_display_name(&input.name)?;

    let mut pooled = ctx.get_db_conn().await?;
    diesel::update(users::table.filter(users::id.eq(user_id)))
        .set((users::name.eq(Some(name)), users::updated_at.eq(Utc::now())))
        .returning(User::as_returning())
        .get_result(&mut pooled)
        .await
        .optional()?
        .ok_or(AppError::NotFound("user"))
}

pub async fn update_user_role(
    ctx: &Context,
    user_id: i64,
    input: UpdateRoleInput,
) -> AppResult<User> {
    ctx.require_role_min(UserRole::Admin)?;
    let role: UserRole = input.role.parse().map_err(AppError::Validation)?;

    let mut pooled = ctx.get_db_conn().await?;
    let user = diesel::update(users::table.filter(users::id.eq(user_id)))
        .set((users::role.eq(role), users::updated_at.eq(Utc::now())))
        .returning(User::as_returning())
        .get_result(&mut pooled)
        .await
        .optional()?
        .ok_or(AppError::NotFound("user"))?;
    tracing::info!(user_id, role = role.as_str(), "Changed user role");
    Ok(user)
}
