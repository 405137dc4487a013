mod health;
mod review_states;

use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::Router;

use crate::response::AppError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let review_routes = Router::new()
        .route("/due", get(review_states::list_due))
        .route("/session", get(review_states::session))
        .route("/stats", get(review_states::stats))
        .route(
            "/:wordId",
            get(review_states::get_state)
                .post(review_states::enroll)
                .delete(review_states::remove),
        )
        .route("/:wordId/outcome", post(review_states::record_outcome))
        .route("/:wordId/milestones", post(review_states::toggle_milestone))
        .route("/:wordId/mode", put(review_states::switch_mode))
        .route("/:wordId/reset", post(review_states::reset));

    Router::new()
        .nest("/health", health::router())
        .nest("/api/review-states", review_routes)
        .fallback(fallback_handler)
        .with_state(state)
}

async fn fallback_handler() -> Response {
    AppError::not_found("接口不存在").into_response()
}
