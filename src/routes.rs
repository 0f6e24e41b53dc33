// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Router assembly.

use crate::config::HttpConfig;
use crate::delivery::MailTransport;
use crate::handlers::{self, ContactHandler};
use crate::limiter::{self, RateLimiter};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::any::Any;
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::warn;

/// Build the full application router.
///
/// The rate limiter only wraps `POST /api/email/send-contact` and needs
/// `ConnectInfo<SocketAddr>`, so serve with
/// `into_make_service_with_connect_info`.
pub fn router<T: MailTransport>(
    handler: Arc<ContactHandler<T>>,
    rate_limiter: RateLimiter,
    http: &HttpConfig,
    expose_error_details: bool,
) -> Router {
    let email_routes = Router::new()
        .route(
            "/send-contact",
            post(handlers::send_contact::<T>)
                .route_layer(middleware::from_fn_with_state(rate_limiter, limiter::rate_limit)),
        )
        .route("/health", get(handlers::health::<T>))
        .with_state(handler);

    Router::new()
        .route("/", get(handlers::root))
        .nest("/api/email", email_routes)
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(http.body_limit_bytes))
        .layer(cors_layer(&http.allowed_origins))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(CatchPanicLayer::custom(move |panic: Box<dyn Any + Send + 'static>| {
            handlers::panic_response(panic, expose_error_details)
        }))
        .layer(TraceLayer::new_for_http())
}

/// Restrictive CORS: only the configured origins, with credentials.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true)
}
