//! Mapping from the shared error type onto Problem Details HTTP responses.
//!
//! Every error leaving a handler goes through [`ApiError`]: the body is an
//! RFC 9457 problem document, the detail string is sanitized, internal
//! kinds are logged server-side and surfaced without detail, and 429s carry
//! a `Retry-After` header.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};

use arcp_auth::sanitize_str;
use arcp_domain::error::Error;
use arcp_protocol::problem::{ProblemDetails, PROBLEM_CONTENT_TYPE};

pub struct ApiError(pub Error);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        if matches!(
            err,
            Error::Storage(_)
                | Error::BackendTransient(_)
                | Error::Embedding(_)
                | Error::Http(_)
                | Error::Timeout(_)
                | Error::Io(_)
                | Error::Json(_)
                | Error::Internal(_)
                | Error::Config(_)
        ) {
            tracing::error!(error = %err, "request failed with internal error");
        }

        let mut problem = ProblemDetails::from(&err);
        problem.detail = problem.detail.map(|d| sanitize_str(&d));

        let status =
            StatusCode::from_u16(problem.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let retry_after = problem.retry_after;

        let mut response = (status, Json(&problem)).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(PROBLEM_CONTENT_TYPE),
        );
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&format!("{}", secs.ceil() as u64)) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_response_has_retry_after_header() {
        let response = ApiError(Error::RateLimited {
            retry_after: 61.2,
            detail: "locked".into(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "62"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            PROBLEM_CONTENT_TYPE
        );
    }

    #[test]
    fn not_found_maps_to_404_problem() {
        let response = ApiError(Error::AgentNotFound("sec-1".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            PROBLEM_CONTENT_TYPE
        );
    }

    #[test]
    fn internal_error_hides_detail() {
        let response = ApiError(Error::Storage("redis: ECONNREFUSED 10.0.0.5".into()))
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
