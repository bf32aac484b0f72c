// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::Arc;

use crate::{
    config::Config,
    db::models::UserRole,
    error::{AppError, AppResult},
};

pub mod auth;
pub mod handlers;
mod router;

pub use router::handle;

pub type DbPool = diesel_async::pooled_connection::bb8::Pool<diesel_async::AsyncPgConnection>;

#[derive(Clone)]
pub struct BaseContext {
    pub db_pool: DbPool,
    pub keypair: ed25519_dalek::SigningKey,
    pub config: Arc<Config>,
}

pub struct Context {
    base: BaseContext,
    user: Option<AuthenticatedUser>,
}

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub email: String,
    pub role: UserRole,
}

impl Context {
    pub fn new(base: BaseContext, user_details: Option<AuthenticatedUser>) -> Self {
        Self {
            base,
            user: user_details,
        }
    }

    pub(crate) async fn get_db_conn(
        &self,
    ) -> AppResult<
        diesel_async::pooled_connection::bb8::PooledConnection<'_, diesel_async::AsyncPgConnection>,
    > {
        Ok(self.base.db_pool.get().await?)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn role(&self) -> Option<UserRole> {
        self.user.as_ref().map(|u| u.role)
    }

    pub fn require_role_min(&self, required_role: UserRole) -> AppResult<()> {
        match self.role() {
            Some(user_role) if user_role >= required_role => Ok(()),
            Some(_) => Err(AppError::Forbidden),
            None => Err(AppError::Unauthorized),
        }
    }

    pub fn require_authentication(&self) -> AppResult<AuthenticatedUser> {
        self.user.clone().ok_or(AppError::Unauthorized)
    }

    pub fn get_signing_key(&self) -> &ed25519_dalek::SigningKey {
        &self.base.keypair
    }

    pub fn config(&self) -> &Config {
        &self.base.config
    }
}
