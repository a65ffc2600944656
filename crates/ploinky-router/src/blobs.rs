//! Blob storage: `POST /blobs/<agent>` streams an upload to disk and
//! returns a manifest `{id, url, size, mime}`; `GET|HEAD /blobs/<agent>/<id>`
//! streams it back, honoring a single `Range: bytes=start-end` request.

use std::path::{Path, PathBuf};

use axum::body::Bytes;
use axum::extract::{Path as AxumPath, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;

use crate::server::RouterState;

#[derive(Debug, Serialize)]
pub struct BlobManifest {
    pub id: String,
    pub url: String,
    pub size: u64,
    pub mime: String,
}

fn blob_dir(blobs_root: &Path, agent: &str) -> PathBuf {
    blobs_root.join(agent)
}

pub async fn upload(
    State(state): State<RouterState>,
    AxumPath(agent): AxumPath<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let dir = blob_dir(&state.blobs_root, &agent);
    if let Err(e) = tokio::fs::create_dir_all(&dir).await {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    let id = Uuid::new_v4().to_string();
    let path = dir.join(&id);
    if let Err(e) = tokio::fs::write(&path, &body).await {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    let mime_path = dir.join(format!("{id}.mime"));
    let _ = tokio::fs::write(&mime_path, &mime).await;

    let manifest = BlobManifest { id: id.clone(), url: format!("/blobs/{agent}/{id}"), size: body.len() as u64, mime };
    axum::Json(manifest).into_response()
}

pub async fn download(
    State(state): State<RouterState>,
    AxumPath((agent, id)): AxumPath<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let dir = blob_dir(&state.blobs_root, &agent);
    let path = dir.join(&id);
    let Ok(data) = tokio::fs::read(&path).await else {
        return (StatusCode::NOT_FOUND, "unknown blob").into_response();
    };
    let mime = tokio::fs::read_to_string(dir.join(format!("{id}.mime")))
        .await
        .unwrap_or_else(|_| "application/octet-stream".to_string());

    let total = data.len() as u64;
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok()).and_then(|v| parse_range(v, total));

    match range {
        Some((start, end)) => {
            let slice = data[start as usize..=end as usize].to_vec();
            let mut response = (
                StatusCode::PARTIAL_CONTENT,
                [
                    (header::CONTENT_TYPE, mime),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                    (header::CONTENT_RANGE, format!("bytes {start}-{end}/{total}")),
                ],
                slice,
            )
                .into_response();
            if let Ok(value) = (end - start + 1).to_string().parse() {
                response.headers_mut().insert(header::CONTENT_LENGTH, value);
            }
            response
        }
        None => {
            (StatusCode::OK, [(header::CONTENT_TYPE, mime), (header::ACCEPT_RANGES, "bytes".to_string())], data)
                .into_response()
        }
    }
}

/// Parse a single `bytes=start-end` range header. Multi-range requests and
/// malformed headers fall back to a full (non-ranged) response.
fn parse_range(header: &str, total: u64) -> Option<(u64, u64)> {
    let spec = header.strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }
    let (start_s, end_s) = spec.split_once('-')?;
    let start: u64 = start_s.parse().ok()?;
    let end: u64 = if end_s.is_empty() { total.checked_sub(1)? } else { end_s.parse().ok()? };
    if start > end || end >= total {
        return None;
    }
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bounded_range() {
        assert_eq!(parse_range("bytes=3-5", 10), Some((3, 5)));
    }

    #[test]
    fn parses_open_ended_range() {
        assert_eq!(parse_range("bytes=3-", 10), Some((3, 9)));
    }

    #[test]
    fn rejects_out_of_bounds_range() {
        assert_eq!(parse_range("bytes=3-20", 10), None);
    }

    #[test]
    fn rejects_multi_range() {
        assert_eq!(parse_range("bytes=0-1,3-4", 10), None);
    }
}
