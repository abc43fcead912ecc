use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

const KNOWN_ROOTS: [&str; 3] = ["api", "health", "metrics"];

/// Records request count and latency per method, path and status.
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}

/// Keeps the path label set bounded: paths outside the API collapse to
/// "/other" and id-like segments become "{id}".
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    let mut segments = trimmed.split('/').skip(1).peekable();

    match segments.peek() {
        Some(root) if KNOWN_ROOTS.contains(root) => {}
        _ => return "/other".to_string(),
    }

    segments
        .map(|segment| {
            if is_id_like(segment) {
                "{id}"
            } else {
                segment
            }
        })
        .fold(String::new(), |mut acc, segment| {
            acc.push('/');
            acc.push_str(segment);
            acc
        })
}

/// UUIDs and numeric ids.
fn is_id_like(segment: &str) -> bool {
    let uuid = segment.len() == 36 && segment.chars().all(|c| c.is_ascii_hexdigit() || c == '-');
    let numeric = !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit());
    uuid || numeric
}
