pub mod v1;

use axum::Router;

use crate::infra::app_state::AppState;

/// Builds the full HTTP router. NGAS's command names live at the root
/// rather than nested under a version prefix — clients speak the original
/// command set directly — but the module stays named `v1` to leave room
/// for a future incompatible command set the way the teacher's
/// `routes::v1` leaves room for `v2`.
pub fn create_api_router(state: AppState) -> Router<()> {
    Router::new().merge(v1::create_router()).with_state(state)
}
