//! Route definitions for the `/templates` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::template;
use crate::state::AppState;

/// Routes mounted at `/templates`.
///
/// ```text
/// GET    /                 -> list
/// POST   /                 -> create
/// POST   /seed             -> seed
/// POST   /validate         -> validate
/// GET    /code/{code}      -> get_by_code
/// GET    /{id}             -> get
/// PUT    /{id}             -> update
/// DELETE /{id}             -> delete
/// POST   /{id}/render      -> render
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(template::list).post(template::create))
        .route("/seed", post(template::seed))
        .route("/validate", post(template::validate))
        .route("/code/{code}", get(template::get_by_code))
        .route(
            "/{id}",
            get(template::get).put(template::update).delete(template::delete),
        )
        .route("/{id}/render", post(template::render))
}
