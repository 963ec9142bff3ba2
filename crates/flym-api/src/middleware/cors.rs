//! CORS layer configuration.

use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use flym_auth::session::client::CLIENT_DEVICE_HEADER;
use flym_core::config::CorsConfig;

use crate::extractors::auth::GUEST_TOKEN_HEADER;

/// Builds a CORS tower layer from configuration.
///
/// Session cookies need credentialed requests, so origins are always listed
/// explicitly. `"*"` mirrors the request origin; config validation keeps it
/// out of production.
pub fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins = if config.allows_any() {
        AllowOrigin::mirror_request()
    } else {
        let list: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        AllowOrigin::list(list)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static(CLIENT_DEVICE_HEADER),
            HeaderName::from_static(GUEST_TOKEN_HEADER),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(config.max_age_seconds))
}
