use crate::api::AppState;
use axum::{extract::State, http::HeaderValue, response::IntoResponse};
use std::sync::Arc;

/// GET /admin/metrics
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.prometheus_handle.as_ref().map_or_else(
        || "Metrics not enabled or failed to initialize".to_string(),
        metrics_exporter_prometheus::PrometheusHandle::render,
    )
}

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

/// Markers of script or SQL injection attempts. Matching requests are only
/// logged.
const SUSPICIOUS_PATTERNS: &[&str] = &[
    "script",
    "javascript:",
    "vbscript:",
    "onload",
    "onerror",
    "eval(",
    "document.cookie",
    "<script",
    "</script>",
    "union select",
    "drop table",
    "delete from",
    "--",
    "/*",
    "*/",
    "xp_cmdshell",
    "sp_executesql",
];

pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().to_string();
    let uri = req.uri().path().to_string();

    let matched_path = req
        .extensions()
        .get::<axum::extract::MatchedPath>()
        .map(|mp| mp.as_str().to_string());

    let user_agent = req
        .headers()
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %uri,
        route = matched_path.clone(),
        user_id = tracing::field::Empty,
    );

    async move {
        let response = next.run(req).await;

        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let status = response.status().as_u16();

        let outcome = if status >= 500 {
            "error"
        } else if status >= 400 {
            "client_error"
        } else {
            "success"
        };

        // Matched route keeps label cardinality bounded.
        let metrics_path = matched_path.as_deref().unwrap_or(&uri);

        let labels = [
            ("method", method.clone()),
            ("path", metrics_path.to_string()),
            ("status", status.to_string()),
        ];

        metrics::counter!("http_requests_total", &labels).increment(1);
        metrics::histogram!("http_request_duration_seconds", &labels)
            .record(start.elapsed().as_secs_f64());

        info!(
            event = "http_request_finished",
            duration_ms = duration_ms,
            status_code = status,
            user_agent = %user_agent,
            outcome = %outcome,
            "Request finished"
        );

        response
    }
    .instrument(span)
    .await
}

/// Query parameters carrying a suspicious marker, as `(name, value)` pairs.
#[must_use]
pub fn suspicious_params(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.as_bytes())
        .filter(|(_, value)| {
            let lowered = value.to_lowercase();
            SUSPICIOUS_PATTERNS
                .iter()
                .any(|pattern| lowered.contains(pattern))
        })
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect()
}

pub async fn suspicious_params_middleware(req: Request, next: Next) -> Response {
    if let Some(query) = req.uri().query() {
        for (name, value) in suspicious_params(query) {
            warn!(param = %name, value = %value, path = %req.uri().path(), "Suspicious query parameter");
        }
    }
    next.run(req).await
}

pub async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert("x-xss-protection", HeaderValue::from_static("1; mode=block"));
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_injection_markers_case_insensitively() {
        let hits = suspicious_params("q=hello&next=%3CSCRIPT%3Ealert(1)&id=1%20UNION%20SELECT");
        let names: Vec<_> = hits.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["next", "id"]);
    }

    #[test]
    fn clean_queries_pass() {
        assert!(suspicious_params("redirect=admin-panel&page=2").is_empty());
    }
}
