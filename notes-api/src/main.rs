mod config;

mod app;
mod auth;
mod ctx;
mod db;
mod errors;
mod notes;
mod openapi;
mod shared;
mod state;
mod users;

use std::net::SocketAddr;

use aide::axum::ApiRouter;
use app::AppParams;
pub use config::config;
pub use db::{init_db, DB};
pub use errors::{Error, Result};
use shared::tracing::{add_tracing_layer, setup_tracing};
use tokio::net::TcpListener;

#[derive(thiserror::Error, Debug)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] config::Error),
    #[error(transparent)]
    Db(#[from] db::Error),
    #[error(transparent)]
    App(#[from] Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> std::result::Result<(), StartupError> {
    let config = config::init()?;
    setup_tracing(config.json_logs());

    let conn = init_db().await?;

    let (app, _api) = app::create(AppParams {
        db: conn,
        router: |state| {
            ApiRouter::new()
                .merge(auth::router(state.clone()))
                .merge(notes::router(state))
        },
    })
    .await?;

    let app = add_tracing_layer(app);

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

#[cfg(test)]
pub mod tests {
    use crate::{
        app::{create, AppParams},
        config::config_override,
        errors::Result,
        state::AppState,
        DB,
    };
    use aide::axum::ApiRouter;
    use axum_test::{TestServer, TestServerConfig};

    pub async fn test_server<R>(db: DB, router: R) -> Result<TestServer>
    where
        R: FnOnce(AppState) -> ApiRouter,
    {
        config_override(|config| config);

        let (app, _) = create(AppParams { db, router }).await?;

        let config = TestServerConfig::builder().mock_transport().build();

        TestServer::new_with_config(app, config).map_err(|e| crate::Error::Unexpected(e.to_string()))
    }
}
