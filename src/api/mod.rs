mod extractor;
mod handlers;
mod middleware;

use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::service::TicketService;

pub use middleware::{RateLimiter, SecurityConfig};

pub fn create_router(service: TicketService) -> Router {
    create_router_with_config(service, SecurityConfig::disabled())
}

pub fn create_router_with_config(service: TicketService, security: SecurityConfig) -> Router {
    let mut tickets = Router::new()
        .route(
            "/tickets",
            get(handlers::list_tickets).post(handlers::create_ticket),
        )
        .route(
            "/tickets/{id}",
            get(handlers::get_ticket).patch(handlers::patch_ticket),
        )
        .route("/tickets/{id}/status", post(handlers::update_status))
        .route("/tickets/{id}/agent-note", post(handlers::add_note))
        .route("/dashboard", get(handlers::dashboard));

    if let Some(limiter) = security.rate_limiter.clone() {
        tickets = tickets.layer(from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }
    // Added last so it runs before the rate limiter.
    let tickets = tickets.layer(from_fn_with_state(
        security.clone(),
        middleware::auth_middleware,
    ));

    let api = Router::new()
        .route("/health", get(handlers::health))
        .merge(tickets);

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&security)),
        )
        .with_state(service)
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let Some(origins) = &security.cors_origins else {
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
