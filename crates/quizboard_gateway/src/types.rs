use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use quizboard_core::{AchievementDefinition, LeaderboardEntry, ProgressError, SubmissionReceipt};
use serde::{Deserialize, Serialize};

/// Body returned by `POST /api/save_game`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveGameResponse {
    pub success: bool,
    pub outcome_id: i64,
    pub percentage: f64,
    pub new_achievements: Vec<AchievementDefinition>,
    pub duplicate: bool,
    /// Saved, but a bonus step failed. Details are in `warnings`.
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl From<SubmissionReceipt> for SaveGameResponse {
    fn from(r: SubmissionReceipt) -> Self {
        Self {
            success: true,
            outcome_id: r.outcome_id,
            percentage: r.percentage,
            new_achievements: r.new_achievements,
            duplicate: r.duplicate,
            degraded: r.degraded,
            warnings: r.warnings,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub category: String,
    pub entries: Vec<LeaderboardEntry>,
}

/// JSON error body: `{"error": kind, "message": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
}

/// Engine failure on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiFailure(pub ProgressError);

impl ApiFailure {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ProgressError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ProgressError::NotFound(_) => StatusCode::NOT_FOUND,
            ProgressError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ProgressError::ConflictIgnored(_) | ProgressError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ProgressError> for ApiFailure {
    fn from(e: ProgressError) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiFailure {
    fn from(rejection: JsonRejection) -> Self {
        Self(ProgressError::invalid(rejection.body_text()))
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed ({}): {}", status, self.0);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self.0);
        }
        let body = ApiError {
            error: self.0.kind().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (ProgressError::invalid("x"), StatusCode::BAD_REQUEST),
            (ProgressError::not_found("x"), StatusCode::NOT_FOUND),
            (
                ProgressError::StoreUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (ProgressError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiFailure(err).status(), status);
        }
    }

    #[test]
    fn test_save_game_response_hides_empty_warnings() {
        let resp = SaveGameResponse::from(SubmissionReceipt {
            outcome_id: 7,
            percentage: 90.0,
            new_achievements: vec![],
            duplicate: false,
            degraded: false,
            warnings: vec![],
        });
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["outcome_id"], 7);
        assert!(json.get("warnings").is_none());
    }
}
