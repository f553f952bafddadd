use axum::routing::post;
use axum::Router;

use crate::handlers::callback;
use crate::state::AppState;

/// Routes merged into `/api/v1`.
///
/// ```text
/// POST   /callback            -> receive_callback
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/callback", post(callback::receive_callback))
}
