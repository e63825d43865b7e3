//! Page/size query extractor.

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use shared::pagination::PageRequest;

use crate::error::ApiError;

/// Validated `page`/`size` query parameters.
#[derive(Debug, Clone, Copy)]
pub struct Paging(pub PageRequest);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Paging {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(request) = Query::<PageRequest>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?;
        Ok(Paging(request.validated()?))
    }
}
