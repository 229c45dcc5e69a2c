mod error;
mod routes;
mod state;

use axum::http::Request;
use axum::{Router, body::Body};
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::cors::{self, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::prelude::*;

use state::AppState;

async fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", axum::routing::get(routes::health::health))
        .merge(routes::submit::router())
        .merge(routes::webhooks::router())
        .merge(routes::results::router())
        .merge(routes::debug::router())
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods(cors::Any)
                .allow_headers(cors::Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let path = request.uri().path();
                    if path == "/health" {
                        return tracing::Span::none();
                    }
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %path,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<Body>, latency: std::time::Duration, span: &tracing::Span| {
                        if span.is_disabled() {
                            return;
                        }
                        tracing::info!(
                            parent: span,
                            status = %response.status().as_u16(),
                            latency_ms = %latency.as_millis(),
                            "http_request_finished"
                        );
                    },
                )
                .on_failure(
                    |failure: ServerErrorsFailureClass, latency: std::time::Duration, span: &tracing::Span| {
                        if span.is_disabled() {
                            return;
                        }
                        tracing::error!(
                            parent: span,
                            failure = ?failure,
                            latency_ms = %latency.as_millis(),
                            "http_request_failed"
                        );
                    },
                ),
        )
}

fn main() -> std::io::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = env::env();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async {
            let state = AppState::build(config).await;

            let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
            tracing::info!(addr = %addr, "server_listening");

            let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
            let file_sessions = state.file_sessions.clone();

            file_sessions::spawn_periodic_cleanup(
                file_sessions,
                std::time::Duration::from_secs_f64(config.session_cleanup_sweep_minutes * 60.0),
            );

            coordination::spawn_periodic_sweep(
                state.coordinator.clone(),
                std::time::Duration::from_secs_f64(config.session_cleanup_sweep_minutes * 60.0),
                std::time::Duration::from_secs_f64(config.coordination_sweep_max_age_minutes * 60.0),
            );

            axum::serve(listener, app(state).await)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .unwrap();
        });

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("shutdown_signal_received");
}
