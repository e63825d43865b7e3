//! Security headers middleware.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;

pub mod headers {
    pub const X_CONTENT_TYPE_OPTIONS: &str = "x-content-type-options";
    pub const X_FRAME_OPTIONS: &str = "x-frame-options";
    pub const REFERRER_POLICY: &str = "referrer-policy";
    pub const CACHE_CONTROL_NO_STORE: &str = "no-store";
}

/// Adds nosniff, frame denial, referrer policy and `Cache-Control: no-store`
/// to every response; HSTS only when `security.hsts` is on.
pub async fn security_headers_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    let response_headers = response.headers_mut();

    response_headers.insert(
        header::HeaderName::from_static(headers::X_CONTENT_TYPE_OPTIONS),
        HeaderValue::from_static("nosniff"),
    );
    response_headers.insert(
        header::HeaderName::from_static(headers::X_FRAME_OPTIONS),
        HeaderValue::from_static("DENY"),
    );
    response_headers.insert(
        header::HeaderName::from_static(headers::REFERRER_POLICY),
        HeaderValue::from_static("no-referrer"),
    );
    response_headers
        .entry(header::CACHE_CONTROL)
        .or_insert(HeaderValue::from_static(headers::CACHE_CONTROL_NO_STORE));

    if state.config.security.hsts {
        response_headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_names_are_valid_lowercase() {
        for name in [headers::X_CONTENT_TYPE_OPTIONS, headers::X_FRAME_OPTIONS, headers::REFERRER_POLICY] {
            assert_eq!(name, name.to_lowercase());
            assert!(header::HeaderName::from_bytes(name.as_bytes()).is_ok());
        }
    }
}
