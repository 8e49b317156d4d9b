use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{archive, bbcparc, container};
use crate::infra::app_state::AppState;
use crate::xml::server_status_document;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/QARCHIVE", post(archive::qarchive_push).get(archive::qarchive_pull))
        .route("/BBCPARC", get(bbcparc::bbcparc))
        .route("/CARCHIVE", post(container::archive_container))
        .route("/STATUS", get(status))
}

/// A minimal `STATUS` command: reports whether the server currently
/// permits archiving, for operators and smoke tests.
async fn status(State(state): State<AppState>) -> Response {
    let body = server_status_document(state.context.archiving_allowed());
    (axum::http::StatusCode::OK, [("content-type", "text/xml")], body).into_response()
}
