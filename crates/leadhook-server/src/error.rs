use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use leadhook_core::error::LeadAdsError;

/// JSON error envelope: `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

fn status_for(err: &LeadAdsError) -> StatusCode {
    match err {
        LeadAdsError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        LeadAdsError::Verification | LeadAdsError::Signature => StatusCode::FORBIDDEN,
        LeadAdsError::InvalidMode | LeadAdsError::Payload(_) | LeadAdsError::Validation(_) => {
            StatusCode::BAD_REQUEST
        }
        LeadAdsError::NotFound(_) => StatusCode::NOT_FOUND,
        LeadAdsError::Subscription(_) | LeadAdsError::OAuth(_) | LeadAdsError::Platform(_) => {
            StatusCode::BAD_GATEWAY
        }
        LeadAdsError::Persistence(_) | LeadAdsError::Other(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<LeadAdsError> for ApiError {
    fn from(err: LeadAdsError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::error!(error = %err, "Request failed");
        }
        Self::new(status, err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        LeadAdsError::Other(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// HTML page for routes a browser or the platform hits directly.
#[derive(Debug)]
pub struct ErrorPage {
    pub status: StatusCode,
    pub title: String,
    pub message: String,
}

impl ErrorPage {
    pub fn new(status: StatusCode, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            title: title.into(),
            message: message.into(),
        }
    }
}

impl From<LeadAdsError> for ErrorPage {
    fn from(err: LeadAdsError) -> Self {
        let title = match &err {
            LeadAdsError::Configuration(_) => "Configuration Error",
            LeadAdsError::Verification => "Verification Failed",
            LeadAdsError::InvalidMode => "Invalid Request",
            LeadAdsError::OAuth(_) => "OAuth Error",
            _ => "Error",
        };
        Self::new(status_for(&err), title, err.to_string())
    }
}

impl From<anyhow::Error> for ErrorPage {
    fn from(err: anyhow::Error) -> Self {
        LeadAdsError::Other(err).into()
    }
}

impl IntoResponse for ErrorPage {
    fn into_response(self) -> Response {
        (self.status, render_page(&self.title, &self.message)).into_response()
    }
}

pub fn render_page(title: &str, message: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body>\n<h1>{title}</h1>\n<p>{message}</p>\n</body>\n</html>\n",
        title = escape_html(title),
        message = escape_html(message),
    ))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
