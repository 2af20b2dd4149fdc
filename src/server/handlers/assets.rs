use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::TryStreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::io::{StreamReader, SyncIoBridge};
use tracing::{debug, warn};

use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::dto::AssetsListResponse;
use crate::server::range::ByteRange;
use crate::server::response::{ApiError, StatusResponse, blocking};
use crate::server::validation::validate_asset_name;

const CHUNK_SIZE: usize = 64 * 1024;
const CHUNKS_IN_FLIGHT: usize = 4;

pub async fn list_assets(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> Result<Json<AssetsListResponse>, ApiError> {
    let services = state.services.clone();
    let owner = auth.0.owner_uuid;
    let assets = blocking(move || services.assets.list(&owner)).await?;
    Ok(Json(AssetsListResponse { assets }))
}

/// Fails reads once more than `limit` bytes have gone through, and records
/// that it did.
struct LimitedReader<R> {
    inner: R,
    remaining: u64,
    exceeded: Arc<AtomicBool>,
}

impl<R: Read> Read for LimitedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n as u64 > self.remaining {
            self.exceeded.store(true, Ordering::Relaxed);
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "request body exceeds the size limit",
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

fn too_large(limit: usize) -> ApiError {
    ApiError::new(
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("body size exceeds the limit in {limit} bytes"),
    )
}

pub async fn upload_asset(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, ApiError> {
    validate_asset_name(&name)?;

    let limit = state.body_limit;
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit as u64) {
        return Err(too_large(limit));
    }

    let exceeded = Arc::new(AtomicBool::new(false));
    let stream = body.into_data_stream().map_err(io::Error::other);
    let reader = LimitedReader {
        inner: SyncIoBridge::new(StreamReader::new(stream)),
        remaining: limit as u64,
        exceeded: exceeded.clone(),
    };

    let services = state.services.clone();
    let owner = auth.0.owner_uuid;
    let result = blocking(move || services.assets.create(&name, &owner, reader)).await;

    if exceeded.load(Ordering::Relaxed) {
        return Err(too_large(limit));
    }
    result?;

    Ok((StatusCode::CREATED, Json(StatusResponse::ok())))
}

pub async fn delete_asset(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    validate_asset_name(&name)?;

    let services = state.services.clone();
    let owner = auth.0.owner_uuid;
    blocking(move || services.assets.delete(&name, &owner)).await?;

    Ok(Json(StatusResponse::ok()))
}

/// Nobody awaits the download task once the response has started, so its
/// outcome is only visible here.
fn report_download(name: &str, streaming: bool, result: &crate::error::Result<()>) {
    if !streaming {
        return;
    }
    if let Err(e) = result {
        warn!(asset = %name, error = ?e, "Asset download did not complete cleanly");
    }
}

/// What the blocking reader found once the asset was open.
struct DownloadPlan {
    total: u64,
    range: ByteRange,
}

/// Streams an asset, honouring a single `Range` request.
///
/// The read transaction lives on a blocking thread for as long as the body
/// is being sent; chunks cross over through a bounded channel. A client that
/// disconnects closes the channel, which ends the transaction.
pub async fn download_asset(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    validate_asset_name(&name)?;

    let range_header = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let (plan_tx, plan_rx) = oneshot::channel::<DownloadPlan>();
    let (chunk_tx, mut chunk_rx) = mpsc::channel::<io::Result<Bytes>>(CHUNKS_IN_FLIGHT);

    let services = state.services.clone();
    let owner = auth.0.owner_uuid;
    let task = tokio::task::spawn_blocking(move || {
        let mut streaming = false;
        let result = services.assets.get(&name, &owner, |reader| {
            let total = reader.len();
            let range = ByteRange::resolve(range_header.as_deref(), total);
            if plan_tx.send(DownloadPlan { total, range }).is_err() || range == ByteRange::Unsatisfiable {
                return Ok(());
            }
            streaming = true;

            reader.seek(SeekFrom::Start(range.start()))?;
            let mut remaining = range.len(total);
            let mut buf = vec![0u8; CHUNK_SIZE];

            while remaining > 0 {
                let want = usize::try_from(remaining).map_or(CHUNK_SIZE, |r| r.min(CHUNK_SIZE));
                let n = match reader.read(&mut buf[..want]) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => {
                        let _ = chunk_tx.blocking_send(Err(io::Error::new(e.kind(), e.to_string())));
                        return Err(e.into());
                    }
                };
                remaining -= n as u64;

                if chunk_tx.blocking_send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                    debug!(asset = %name, "Client went away mid-stream");
                    break;
                }
            }
            Ok(())
        });

        report_download(&name, streaming, &result);
        result
    });

    let Ok(plan) = plan_rx.await else {
        // the asset was never opened
        return match task.await {
            Ok(Err(e)) => Err(e.into()),
            Ok(Ok(())) => Err(ApiError::internal()),
            Err(e) => {
                tracing::error!(error = %e, "Download task failed");
                Err(ApiError::internal())
            }
        };
    };

    let DownloadPlan { total, range } = plan;
    let builder = Response::builder()
        .header(header::ACCEPT_RANGES, "bytes")
        .header("X-Content-Type-Options", "nosniff");

    let response = match range {
        ByteRange::Unsatisfiable => builder
            .status(StatusCode::RANGE_NOT_SATISFIABLE)
            .header(header::CONTENT_RANGE, format!("bytes */{total}"))
            .body(Body::empty()),
        ByteRange::Full | ByteRange::Partial { .. } => {
            let body = Body::from_stream(futures::stream::poll_fn(move |cx| chunk_rx.poll_recv(cx)));
            let builder = builder
                .header(header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"))
                .header(header::CONTENT_LENGTH, range.len(total));

            match range {
                ByteRange::Partial { start, end } => builder
                    .status(StatusCode::PARTIAL_CONTENT)
                    .header(header::CONTENT_RANGE, format!("bytes {start}-{end}/{total}"))
                    .body(body),
                _ => builder.status(StatusCode::OK).body(body),
            }
        }
    };

    response.map_err(|e| {
        tracing::error!(error = %e, "Failed to build download response");
        ApiError::internal()
    })
}
