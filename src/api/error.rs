use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use hr_ledger::{ErrorKind, HrError};
use serde_json::json;
use tracing::error;

/// Engine failure rendered as `{ "message", "kind" }`.
#[derive(Debug)]
pub struct ApiError(pub HrError);

impl From<HrError> for ApiError {
    fn from(err: HrError) -> Self {
        ApiError(err)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::ResourceExhausted => match self.0 {
                HrError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            },
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let kind = self.0.kind();
        let message = match kind {
            ErrorKind::Internal => {
                error!(error = %self.0, "Request failed");
                "Internal Server Error".to_string()
            }
            ErrorKind::Transient => "Service busy, try again".to_string(),
            _ => self.0.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({
            "message": message,
            "kind": kind.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hr_ledger::StoreError;

    fn status(err: HrError) -> StatusCode {
        ApiError(err).status_code()
    }

    #[test]
    fn kinds_map_to_status_codes() {
        assert_eq!(status(HrError::InvalidDays(0)), StatusCode::BAD_REQUEST);
        assert_eq!(status(HrError::OverlappingRequest), StatusCode::CONFLICT);
        assert_eq!(
            status(HrError::InsufficientBalance {
                requested: 5,
                remaining: 2
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status(HrError::TooManyRequests), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status(HrError::TokenExpired), StatusCode::NOT_FOUND);
        assert_eq!(
            status(HrError::NotSupervisor {
                approver: 1,
                employee: 2
            }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(StoreError::Transient("deadlock".into()).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(StoreError::Corrupt("bad enum".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn internal_details_are_not_leaked() {
        let resp = ApiError(StoreError::Backend("password=hunter2".into()).into()).error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["message"], "Internal Server Error");
        assert_eq!(body["kind"], "internal");
    }
}
