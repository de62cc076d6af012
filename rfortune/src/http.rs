//! HTTP Adapter
//!
//! Every path answers `GET` with one random fortune as an HTML fragment.
//!
//! ```text
//! GET /[anything][?module=<m>]
//!   200 text/html   <div id="fortunes/<m>/<id>"><pre>TEXT</pre></div>
//!   500 text/plain  diagnostic message
//! ```

use std::future::Future;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use rfortune_core::{FortuneContext, KvConnection, ManageConnection};
use serde::Deserialize;
use tokio::net::TcpListener;

use crate::HTTP_REQUEST_TIMEOUT_MS_DEFAULT;

/// Query string accepted on every path.
#[derive(Debug, Default, Deserialize)]
pub struct FortuneQuery {
    /// Only draw from this module
    pub module: Option<String>,
}

/// Router serving random fortunes from `ctx`.
pub fn router<M>(ctx: FortuneContext<M>) -> Router
where
    M: ManageConnection,
    M::Connection: KvConnection,
{
    Router::new()
        .route("/", get(random_fortune::<M>))
        .route("/*path", get(random_fortune::<M>))
        .with_state(ctx)
}

/// Serve until `shutdown` resolves, then finish in-flight requests.
///
/// # Errors
/// I/O errors from the listener.
pub async fn serve<M, F>(ctx: FortuneContext<M>, listener: TcpListener, shutdown: F) -> std::io::Result<()>
where
    M: ManageConnection,
    M::Connection: KvConnection,
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown requested"),
        Err(e) => {
            // Without a signal handler, serve until killed.
            tracing::warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}

async fn random_fortune<M>(
    State(ctx): State<FortuneContext<M>>,
    Query(query): Query<FortuneQuery>,
) -> Response
where
    M: ManageConnection,
    M::Connection: KvConnection,
{
    let deadline = Duration::from_millis(HTTP_REQUEST_TIMEOUT_MS_DEFAULT);
    let module = query.module.as_deref();

    match tokio::time::timeout(deadline, ctx.pick_random(module)).await {
        Ok(Ok(fortune)) => {
            tracing::debug!(module = %fortune.module, id = fortune.id, "served fortune");
            Html(fortune.as_html_fragment()).into_response()
        }
        Ok(Err(e)) => {
            if e.is_integrity_violation() {
                tracing::error!(error = %e, "request failed");
            } else {
                tracing::warn!(error = %e, "request failed");
            }
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(_) => {
            tracing::warn!(timeout_ms = HTTP_REQUEST_TIMEOUT_MS_DEFAULT, "request timed out");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("request timed out after {HTTP_REQUEST_TIMEOUT_MS_DEFAULT}ms"),
            )
                .into_response()
        }
    }
}
