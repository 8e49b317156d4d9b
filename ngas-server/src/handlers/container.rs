//! Multipart container archive handler (§6: `Content-Type: multipart/mixed`
//! body, parsed by C3, each leaf file then run through the same archive
//! pipeline as a standalone `QARCHIVE` push so every part gets its own
//! staging pass, checksum, and catalog row).

use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use tracing::info;
use walkdir::WalkDir;

use ngas_core::fetch::FileByteSource;
use ngas_core::multipart::ContainerReader;
use ngas_core::request::ArchiveRequest;

use crate::infra::app_state::AppState;
use crate::infra::errors::{AppError, AppResult};
use crate::xml::container_status_document;

pub async fn archive_container(
    State(state): State<AppState>,
    request: Request<Body>,
) -> AppResult<Response> {
    let body = request.into_body();
    let reader = tokio_util::io::StreamReader::new(
        futures_util::TryStreamExt::map_err(body.into_data_stream(), |e| {
            std::io::Error::new(std::io::ErrorKind::Other, e)
        }),
    );

    let scratch = tempfile::tempdir()
        .map_err(|e| AppError::internal(format!("failed to create scratch directory: {e}")))?;

    ContainerReader::new(reader)
        .parse_into(scratch.path())
        .await
        .map_err(|e| AppError::bad_request(format!("failed to parse container body: {e}")))?;

    // Picked once so every leaf file of this container lands on the same
    // volume (§8 scenario 4), rather than each leaf's own `archive_push`
    // call picking independently.
    let volume = state.coordinator.pick_volume().await?;

    let mut archived = Vec::new();
    for entry in WalkDir::new(scratch.path())
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let relative = entry
            .path()
            .strip_prefix(scratch.path())
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");

        let leaf_request = ArchiveRequest {
            file_uri: relative.clone(),
            mime_type: None,
            size: None,
            checksum: None,
            no_replication: false,
            bbcp: None,
            file_version_override: None,
            pinned_volume: Some(volume.clone()),
        };

        let (source, size) = FileByteSource::open(entry.path())
            .await
            .map_err(|e| AppError::internal(format!("failed to open container leaf file: {e}")))?;

        info!(relative, "archiving container leaf file");
        let outcome = state
            .coordinator
            .archive_push(leaf_request, Box::new(source), Some(size))
            .await?;
        archived.push((
            outcome.file_id,
            outcome.file_version,
            outcome.disk_id,
            outcome.checksum,
        ));
    }

    let body = container_status_document(&archived);
    Ok((
        axum::http::StatusCode::OK,
        [("content-type", "text/xml")],
        body,
    )
        .into_response())
}
