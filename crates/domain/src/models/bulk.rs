//! Per-item results for bulk endpoints.

use serde::Serialize;
use uuid::Uuid;

/// Per-item outcome of a bulk operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkItemResult<T> {
    pub id: Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> BulkItemResult<T> {
    pub fn ok(id: Uuid, result: T) -> Self {
        Self {
            id,
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(id: Uuid, error: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Summary wrapper for a bulk response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResponse<T> {
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BulkItemResult<T>>,
}

impl<T> From<Vec<BulkItemResult<T>>> for BulkResponse<T> {
    fn from(results: Vec<BulkItemResult<T>>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_response_counts() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let response: BulkResponse<&str> =
            vec![BulkItemResult::ok(a, "done"), BulkItemResult::failed(b, "nope")].into();
        assert_eq!(response.succeeded, 1);
        assert_eq!(response.failed, 1);
    }
}
