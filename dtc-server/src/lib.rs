// Copyright 2025 DTC Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod proxy;

use anyhow::Result;
use axum::{
    extract::Request,
    routing::{any, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::{
    clear_history, get_history, get_settings, health_check, move_gen_next, move_gen_prev,
    remove_gen, AppState,
};
use config::GatewayConfig;
use proxy::{GenerationConverter, ProxyRoute};

pub async fn run_server(config: GatewayConfig) -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "dtc_server=info,dtc_storage=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting DTC gateway");
    tracing::info!("Configuration: {:#?}", config);

    config.validate()?;
    bootstrap::prepare(&config)?;

    let addr = config.socket_addr()?;
    tracing::info!("Results directory: {:?}", config.storage.results_dir);
    tracing::info!("Web UI directory: {:?}", config.storage.web_dir);
    tracing::info!("Backend: {}", config.backend.base_url());

    let state = AppState::new(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Mount a [`ProxyRoute`] as a handler for every method.
fn forward_to(route: ProxyRoute) -> axum::routing::MethodRouter<AppState> {
    let route = Arc::new(route);
    any(move |request: Request| {
        let route = route.clone();
        async move { route.forward(request).await }
    })
}

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();
    let max_body = config.server.max_body_bytes;

    let parameters = ProxyRoute::new(state.backend.clone(), config.backend.base_url(), max_body);
    let generate = ProxyRoute::new(state.backend.clone(), config.backend.generate_url(), max_body)
        .with_response_converter(GenerationConverter::new(state.ledger.clone()));

    Router::new()
        // Backend
        .route("/parameters", forward_to(parameters))
        .route("/generate", forward_to(generate))
        // History ledger
        .route("/get-history", get(get_history).post(get_history))
        .route("/move-gen-prev", post(move_gen_prev))
        .route("/move-gen-next", post(move_gen_next))
        .route("/remove-gen", post(remove_gen))
        .route("/remove-generation", post(remove_gen))
        .route("/clear-history", get(clear_history).post(clear_history))
        // Settings and health
        .route("/settings", get(get_settings).post(get_settings))
        .route("/health", get(health_check))
        // Static files
        .nest_service("/results", ServeDir::new(&config.storage.results_dir))
        .fallback_service(ServeDir::new(&config.storage.web_dir))
        .with_state(state)
        .layer(if config.server.enable_cors {
            tracing::warn!("CORS: Allowing all origins");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            CorsLayer::new()
        })
        .layer(TraceLayer::new_for_http())
}
