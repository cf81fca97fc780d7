//! Success envelope shared by the JSON endpoints.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// `{ "success": true, "data": ..., "timestamp": ... }`
///
/// Failures go through [`crate::error::ApiError`], which renders the matching
/// `success: false` shape.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let json = serde_json::to_value(ApiResponse::success(serde_json::json!({"removed": 2})))
            .unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["removed"], 2);
        assert!(json["timestamp"].is_string());
    }
}
