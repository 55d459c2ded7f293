mod bindings;
mod handlers;
mod helpers;
mod queries;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_exam).get(handlers::list_exams))
        .route("/statuses", get(handlers::list_statuses))
        .route(
            "/:exam_id",
            get(handlers::get_exam).patch(handlers::update_exam).delete(handlers::delete_exam),
        )
        .route("/:exam_id/publish", post(handlers::publish_exam))
        .route("/:exam_id/unpublish", post(handlers::unpublish_exam))
        .route("/:exam_id/archive", post(handlers::archive_exam))
        .route("/:exam_id/duplicate", post(handlers::duplicate_exam))
        .route(
            "/:exam_id/questions",
            get(bindings::list_bindings)
                .post(bindings::attach_question)
                .put(bindings::replace_bindings),
        )
        .route("/:exam_id/questions/:question_id", delete(bindings::detach_question))
        .route("/:exam_id/attempts", get(handlers::list_exam_attempts))
}
