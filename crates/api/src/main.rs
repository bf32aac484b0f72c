// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::{convert::Infallible, error::Error, net::SocketAddr, sync::Arc};

use diesel::Connection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use league_api::{
    api::{self, BaseContext, auth::load_or_create_signing_key},
    config::Config,
    db,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let signing_key = load_or_create_signing_key(&config.signing_key_file)?;

    {
        let mut pg_connection = diesel::pg::PgConnection::establish(&config.database_url)?;
        db::run_migrations(&mut pg_connection)?;
    }

    let manager =
        AsyncDieselConnectionManager::<diesel_async::AsyncPgConnection>::new(&config.database_url);
    let db_pool = diesel_async::pooled_connection::bb8::Pool::builder()
        .max_size(config.db_pool_size)
        .connection_timeout(config.db_connect_timeout)
        .build(manager)
        .await?;

    let addr = SocketAddr::from(([0, 0, 0, 0, 0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    let ctx = BaseContext {
        db_pool,
        keypair: signing_key,
        config: Arc::new(config),
    };
    tracing::info!("Listening on http://{addr}");
    loop {
        let (stream, remote_addr) = listener.accept().await?;

        let io = TokioIo::new(stream);
        let ctx = ctx.clone();

        tokio::spawn(async move {
            if let Err(e) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                .serve_connection(
                    io,
                    service_fn(move |req| {
                        let ctx = ctx.clone();
                        async move { Ok::<_, Infallible>(api::handle(ctx, req).await) }
                    }),
                )
                .await
            {
                tracing::error!(%remote_addr, "Error serving connection: {e}");
            }
        });
    }
}
