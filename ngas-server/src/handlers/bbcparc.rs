//! `BBCPARC` handler: a pull archived via the external `bbcp` tool (§6, §4.8).

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::response::Response;
use tracing::info;

use ngas_core::request::{ArchiveRequest, BbcpParams};

use super::archive::render_success;
use crate::infra::app_state::AppState;
use crate::infra::errors::{AppError, AppResult};

pub async fn bbcparc(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Response> {
    let file_uri = params
        .get("fileUri")
        .cloned()
        .ok_or_else(|| AppError::bad_request("missing required query parameter fileUri"))?;

    let bbcp = BbcpParams {
        port: params.get("bport").and_then(|v| v.parse().ok()),
        winsize: params.get("bwinsize").cloned(),
        num_streams: params.get("bnum_streams").and_then(|v| v.parse().ok()),
    };
    let checksum = params.get("bchecksum").and_then(|v| v.parse().ok());
    let file_version_override = ArchiveRequest::parse_file_version(&file_uri).or_else(|| {
        params
            .get("file_version")
            .and_then(|v| v.parse::<i32>().ok())
    });

    let request = ArchiveRequest {
        file_uri,
        mime_type: params.get("mimeType").cloned(),
        size: None,
        checksum,
        no_replication: false,
        bbcp: Some(bbcp),
        file_version_override,
        pinned_volume: None,
    };

    info!(file_uri = %request.file_uri, "handling BBCPARC request");
    let outcome = state.coordinator.archive_pull(request).await?;
    render_success(outcome)
}
