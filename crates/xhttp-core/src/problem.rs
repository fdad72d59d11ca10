//! Problem details for HTTP APIs.
//!
//! Every failure a handler can report to a client is a [`Problem`]. A problem
//! knows its status code, its problem type URI and its title, and can write
//! itself to a [`ResponseSink`] as an `application/problem+json` document.
//!
//! | Variant | Status | Title |
//! |---|---|---|
//! | `BadRequest` | 400 | `Request parameters did not validate` |
//! | `Unauthorized` | 401 | caller message |
//! | `Forbidden` | 403 | caller message |
//! | `NotFound` | 404 | caller message |
//! | `UnsupportedMediaType` | 415 | `unsupported media type` |
//! | `InternalServerError` | 500 | `Internal Server Error` |
//! | `ServiceUnavailable` | 503 | `The server is unavailable` |
//!
//! Server-fault variants keep their cause for logs; it never reaches the body.

use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::RequestContext;
use crate::error::WriteError;
use crate::sink::ResponseSink;

/// Content type of problem documents.
pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

/// Problem type URIs, one per status category.
pub mod problem_types {
    /// 400 Bad Request.
    pub const BAD_REQUEST: &str = "https://datatracker.ietf.org/doc/html/rfc7231#section-6.5.1";
    /// 401 Unauthorized.
    pub const UNAUTHORIZED: &str = "https://datatracker.ietf.org/doc/html/rfc7235#section-3.1";
    /// 403 Forbidden.
    pub const FORBIDDEN: &str = "https://datatracker.ietf.org/doc/html/rfc7231#section-6.5.3";
    /// 404 Not Found.
    pub const NOT_FOUND: &str = "https://datatracker.ietf.org/doc/html/rfc7231#section-6.5.4";
    /// 415 Unsupported Media Type.
    pub const UNSUPPORTED_MEDIA_TYPE: &str =
        "https://datatracker.ietf.org/doc/html/rfc7231#section-6.5.13";
    /// 500 Internal Server Error.
    pub const INTERNAL_SERVER_ERROR: &str =
        "https://datatracker.ietf.org/doc/html/rfc7231#section-6.6.1";
    /// 503 Service Unavailable.
    pub const SERVICE_UNAVAILABLE: &str =
        "https://datatracker.ietf.org/doc/html/rfc7231#section-6.6.4";
}

const BAD_REQUEST_TITLE: &str = "Request parameters did not validate";
const UNSUPPORTED_MEDIA_TYPE_TITLE: &str = "unsupported media type";
const INTERNAL_SERVER_ERROR_TITLE: &str = "Internal Server Error";
const SERVICE_UNAVAILABLE_TITLE: &str = "The server is unavailable";

/// A problem document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDetail {
    /// HTTP status code; equal to the status line of the response.
    pub status: u16,
    /// URI identifying the problem category.
    #[serde(rename = "type")]
    pub problem_type: String,
    /// Human-readable summary.
    pub title: String,
}

impl ProblemDetail {
    /// Creates a problem document.
    #[must_use]
    pub fn new(status: StatusCode, problem_type: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            problem_type: problem_type.into(),
            title: title.into(),
        }
    }
}

/// A single failed field-level validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidParam {
    /// Name of the offending parameter.
    pub name: String,
    /// Why it did not validate.
    pub reason: String,
}

impl InvalidParam {
    /// Creates an invalid parameter entry.
    #[must_use]
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for InvalidParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.reason)
    }
}

/// A problem document listing the parameters that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationProblemDetail {
    /// The base problem fields.
    #[serde(flatten)]
    pub detail: ProblemDetail,
    /// Failed validations in the order they were reported.
    #[serde(rename = "invalid-params")]
    pub invalid_params: Vec<InvalidParam>,
}

/// Body of a problem response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProblemBody {
    /// A plain problem document.
    Detail(ProblemDetail),
    /// A validation problem document.
    Validation(ValidationProblemDetail),
}

impl ProblemBody {
    /// Returns the base problem fields.
    #[must_use]
    pub const fn detail(&self) -> &ProblemDetail {
        match self {
            Self::Detail(detail) => detail,
            Self::Validation(validation) => &validation.detail,
        }
    }
}

/// A failure that can be rendered as a problem response.
///
/// # Example
///
/// ```
/// use http::StatusCode;
/// use xhttp_core::{InvalidParam, Problem};
///
/// let problem = Problem::bad_request(vec![InvalidParam::new("email", "must not be empty")]);
/// assert_eq!(problem.status(), StatusCode::BAD_REQUEST);
/// assert_eq!(problem.to_string(), "[email: must not be empty]");
/// ```
#[derive(Debug, Error)]
pub enum Problem {
    /// Request parameters failed validation.
    #[error("{}", format_params(.0))]
    BadRequest(Vec<InvalidParam>),

    /// The caller is not authenticated.
    #[error("{0}")]
    Unauthorized(String),

    /// The caller may not perform the operation.
    #[error("{0}")]
    Forbidden(String),

    /// The addressed resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The request body has a media type the handler does not accept.
    #[error("unsupported media type")]
    UnsupportedMediaType,

    /// An unexpected failure; the cause is kept out of the response body.
    #[error("{0}")]
    InternalServerError(anyhow::Error),

    /// A dependency is unavailable; the cause is kept out of the response body.
    #[error("{0}")]
    ServiceUnavailable(anyhow::Error),
}

fn format_params(params: &[InvalidParam]) -> String {
    let rendered: Vec<String> = params.iter().map(ToString::to_string).collect();
    format!("[{}]", rendered.join(", "))
}

impl Problem {
    /// Creates a bad request problem.
    #[must_use]
    pub fn bad_request(invalid_params: impl IntoIterator<Item = InvalidParam>) -> Self {
        Self::BadRequest(invalid_params.into_iter().collect())
    }

    /// Creates an unauthorized problem.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Creates a forbidden problem.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Creates a not found problem.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Creates an unsupported media type problem.
    #[must_use]
    pub const fn unsupported_media_type() -> Self {
        Self::UnsupportedMediaType
    }

    /// Creates an internal server error problem wrapping `cause`.
    #[must_use]
    pub fn internal(cause: impl Into<anyhow::Error>) -> Self {
        Self::InternalServerError(cause.into())
    }

    /// Creates a service unavailable problem wrapping `cause`.
    #[must_use]
    pub fn service_unavailable(cause: impl Into<anyhow::Error>) -> Self {
        Self::ServiceUnavailable(cause.into())
    }

    /// Returns the status code written for this problem.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Returns the problem type URI.
    #[must_use]
    pub const fn problem_type(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => problem_types::BAD_REQUEST,
            Self::Unauthorized(_) => problem_types::UNAUTHORIZED,
            Self::Forbidden(_) => problem_types::FORBIDDEN,
            Self::NotFound(_) => problem_types::NOT_FOUND,
            Self::UnsupportedMediaType => problem_types::UNSUPPORTED_MEDIA_TYPE,
            Self::InternalServerError(_) => problem_types::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => problem_types::SERVICE_UNAVAILABLE,
        }
    }

    /// Returns the title exposed to the client.
    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::BadRequest(_) => BAD_REQUEST_TITLE,
            Self::Unauthorized(message) | Self::Forbidden(message) | Self::NotFound(message) => {
                message
            }
            Self::UnsupportedMediaType => UNSUPPORTED_MEDIA_TYPE_TITLE,
            Self::InternalServerError(_) => INTERNAL_SERVER_ERROR_TITLE,
            Self::ServiceUnavailable(_) => SERVICE_UNAVAILABLE_TITLE,
        }
    }

    /// Returns the underlying cause of a server-fault problem.
    #[must_use]
    pub fn cause(&self) -> Option<&anyhow::Error> {
        match self {
            Self::InternalServerError(cause) | Self::ServiceUnavailable(cause) => Some(cause),
            _ => None,
        }
    }

    /// Returns `true` for 5xx problems.
    #[must_use]
    pub const fn is_server_fault(&self) -> bool {
        matches!(
            self,
            Self::InternalServerError(_) | Self::ServiceUnavailable(_)
        )
    }

    /// Builds the document sent to the client.
    #[must_use]
    pub fn body(&self) -> ProblemBody {
        let detail = ProblemDetail::new(self.status(), self.problem_type(), self.title());
        match self {
            Self::BadRequest(params) => ProblemBody::Validation(ValidationProblemDetail {
                detail,
                invalid_params: params.clone(),
            }),
            _ => ProblemBody::Detail(detail),
        }
    }

    /// Writes this problem as the response.
    ///
    /// Sets `Content-Type: application/problem+json`, commits the status and
    /// writes the JSON document followed by a newline. Calling it twice makes
    /// two write attempts; the sink decides what a second status write means.
    pub fn write_problem(
        &self,
        ctx: &RequestContext,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), WriteError> {
        let mut encoded = serde_json::to_vec(&self.body())?;
        encoded.push(b'\n');

        if self.is_server_fault() {
            tracing::debug!(
                request_id = %ctx.request_id(),
                status = self.status().as_u16(),
                cause = %self,
                "writing server-fault problem"
            );
        }

        sink.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static(APPLICATION_PROBLEM_JSON),
        );
        sink.write_header(self.status());
        sink.write(&encoded)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{ResponseBuffer, SinkError};
    use http::HeaderMap;

    fn write(problem: &Problem) -> ResponseBuffer {
        let mut sink = ResponseBuffer::new();
        problem
            .write_problem(&RequestContext::new(), &mut sink)
            .expect("problem should be written");
        sink
    }

    fn detail_of(sink: &ResponseBuffer) -> ProblemDetail {
        serde_json::from_slice(sink.body()).expect("body should be a problem document")
    }

    #[test]
    fn test_every_variant_writes_documented_status() {
        let cases = [
            (Problem::bad_request(Vec::new()), 400),
            (Problem::unauthorized("who are you"), 401),
            (Problem::forbidden("not yours"), 403),
            (Problem::not_found("no such user"), 404),
            (Problem::unsupported_media_type(), 415),
            (Problem::internal(anyhow::anyhow!("db down")), 500),
            (Problem::service_unavailable(anyhow::anyhow!("maintenance")), 503),
        ];

        for (problem, status) in cases {
            let sink = write(&problem);
            assert_eq!(sink.effective_status().as_u16(), status, "{problem:?}");
            assert_eq!(sink.headers()[CONTENT_TYPE], APPLICATION_PROBLEM_JSON);

            let detail = detail_of(&sink);
            assert_eq!(detail.status, status, "{problem:?}");
            assert_eq!(detail.problem_type, problem.problem_type());
        }
    }

    #[test]
    fn test_unsupported_media_type_body_status_matches_status_line() {
        let sink = write(&Problem::unsupported_media_type());
        let detail = detail_of(&sink);
        assert_eq!(sink.effective_status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(detail.status, 415);
        assert_eq!(detail.title, "unsupported media type");
    }

    #[test]
    fn test_bad_request_body_lists_invalid_params_in_order() {
        let problem = Problem::bad_request([
            InvalidParam::new("param1", "error1"),
            InvalidParam::new("param2", "error2"),
        ]);
        let sink = write(&problem);

        let value: serde_json::Value = serde_json::from_slice(sink.body()).unwrap();
        assert_eq!(value["title"], "Request parameters did not validate");
        assert_eq!(value["invalid-params"][0]["name"], "param1");
        assert_eq!(value["invalid-params"][0]["reason"], "error1");
        assert_eq!(value["invalid-params"][1]["name"], "param2");

        let validation: ValidationProblemDetail = serde_json::from_slice(sink.body()).unwrap();
        assert_eq!(validation.detail.status, 400);
        assert_eq!(validation.invalid_params.len(), 2);
    }

    #[test]
    fn test_bad_request_without_params_still_has_empty_list() {
        let sink = write(&Problem::bad_request(Vec::new()));
        let value: serde_json::Value = serde_json::from_slice(sink.body()).unwrap();
        assert_eq!(value["invalid-params"], serde_json::json!([]));
    }

    #[test]
    fn test_client_fault_titles_are_caller_messages() {
        assert_eq!(Problem::unauthorized("token expired").title(), "token expired");
        assert_eq!(Problem::forbidden("read only").title(), "read only");
        assert_eq!(Problem::not_found("user 7 not found").title(), "user 7 not found");
    }

    #[test]
    fn test_server_fault_cause_stays_out_of_body() {
        let problem = Problem::internal(anyhow::anyhow!("password=hunter2"));
        assert_eq!(problem.to_string(), "password=hunter2");

        let sink = write(&problem);
        let body = String::from_utf8(sink.body().to_vec()).unwrap();
        assert!(!body.contains("hunter2"));
        assert_eq!(detail_of(&sink).title, "Internal Server Error");
    }

    #[test]
    fn test_service_unavailable_message_is_cause() {
        let problem = Problem::service_unavailable(anyhow::anyhow!("replica lag"));
        assert_eq!(problem.to_string(), "replica lag");
        assert_eq!(problem.title(), "The server is unavailable");
        assert!(problem.cause().is_some());

        let body = String::from_utf8(write(&problem).body().to_vec()).unwrap();
        assert!(!body.contains("replica lag"));
    }

    #[test]
    fn test_unsupported_media_type_message() {
        assert_eq!(
            Problem::unsupported_media_type().to_string(),
            "unsupported media type"
        );
    }

    #[test]
    fn test_body_ends_with_newline() {
        let sink = write(&Problem::not_found("gone"));
        assert_eq!(sink.body().last(), Some(&b'\n'));
    }

    #[test]
    fn test_writing_twice_keeps_first_status() {
        let ctx = RequestContext::new();
        let mut sink = ResponseBuffer::new();
        Problem::not_found("first").write_problem(&ctx, &mut sink).unwrap();
        Problem::forbidden("second").write_problem(&ctx, &mut sink).unwrap();

        assert_eq!(sink.effective_status(), StatusCode::NOT_FOUND);
        // Both documents reach the body; only the status line is write-once.
        let body = String::from_utf8(sink.body().to_vec()).unwrap();
        assert_eq!(body.lines().count(), 2);
    }

    struct RejectingSink {
        headers: HeaderMap,
        status: Option<StatusCode>,
    }

    impl ResponseSink for RejectingSink {
        fn headers_mut(&mut self) -> &mut HeaderMap {
            &mut self.headers
        }

        fn write_header(&mut self, status: StatusCode) {
            self.status.get_or_insert(status);
        }

        fn write(&mut self, _buf: &[u8]) -> Result<usize, SinkError> {
            Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "client went away",
            )))
        }

        fn status(&self) -> Option<StatusCode> {
            self.status
        }
    }

    #[test]
    fn test_write_failure_is_returned() {
        let mut sink = RejectingSink {
            headers: HeaderMap::new(),
            status: None,
        };
        let err = Problem::forbidden("nope")
            .write_problem(&RequestContext::new(), &mut sink)
            .unwrap_err();

        assert!(matches!(err, WriteError::Sink(SinkError::Io(_))));
        assert_eq!(sink.status, Some(StatusCode::FORBIDDEN));
    }
}
