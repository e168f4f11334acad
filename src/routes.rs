use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tower_http::services::ServeDir;
use uuid::Uuid;

use crate::credential::{validate::ValidationResult, IssueResult};
use crate::engine::Engine;
use crate::enrollment::{CompletionOutcome, QuizOutcome, ReviewOutcome};
use crate::error::AppResult;
use crate::models::*;
use crate::notify::Notifier;
use crate::store::Store;

pub fn router<S, N>(engine: Engine<S, N>) -> Router
where
    S: Store,
    N: Notifier + Sync + 'static,
{
    let static_dir = engine.files.root().to_path_buf();
    Router::new()
        // progress + completion
        .route("/api/enrollments/:student_id/:course_id/progress", get(progress::<S, N>))
        .route(
            "/api/enrollments/:student_id/:course_id/modules/:module_id/complete",
            post(complete_module::<S, N>),
        )
        .route("/api/enrollments/:student_id/:course_id/quiz/:module_id", post(submit_quiz::<S, N>))
        .route("/api/evidences/:evidence_id/review", post(review_evidence::<S, N>))
        // credentials
        .route("/api/credentials/issue", post(issue_credential::<S, N>))
        .route("/api/public/validar/:numero", get(validate_credential::<S, N>))
        // issued PDFs and uploaded photos
        .nest_service("/storage", ServeDir::new(static_dir))
        .with_state(engine)
}

async fn progress<S: Store, N: Notifier + Sync + 'static>(
    State(engine): State<Engine<S, N>>,
    Path((student_id, course_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ProgressView>> {
    let progress = engine.course_progress(student_id, course_id).await?;
    Ok(Json(ProgressView {
        progress: progress.percentage(),
        completed: progress.is_complete(),
        next_activity: progress.next_activity(),
    }))
}

async fn complete_module<S: Store, N: Notifier + Sync + 'static>(
    State(engine): State<Engine<S, N>>,
    Path((student_id, course_id, module_id)): Path<(Uuid, Uuid, Uuid)>,
) -> AppResult<Json<CompletionOutcome>> {
    let outcome = engine.mark_module_complete(student_id, module_id, course_id).await?;
    Ok(Json(outcome))
}

async fn submit_quiz<S: Store, N: Notifier + Sync + 'static>(
    State(engine): State<Engine<S, N>>,
    Path((student_id, course_id, module_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(req): Json<SubmitQuizReq>,
) -> AppResult<Json<QuizOutcome>> {
    let outcome = engine.submit_quiz(student_id, course_id, module_id, req.answers).await?;
    Ok(Json(outcome))
}

async fn review_evidence<S: Store, N: Notifier + Sync + 'static>(
    State(engine): State<Engine<S, N>>,
    Path(evidence_id): Path<Uuid>,
    Json(req): Json<ReviewEvidenceReq>,
) -> AppResult<Json<ReviewOutcome>> {
    let outcome = engine
        .review_evidence(evidence_id, req.approved, req.feedback, req.reviewer_id)
        .await?;
    Ok(Json(outcome))
}

async fn issue_credential<S: Store, N: Notifier + Sync + 'static>(
    State(engine): State<Engine<S, N>>,
    Json(req): Json<IssueCredentialReq>,
) -> AppResult<Json<IssueResult>> {
    let result = engine
        .issue_credential(req.student_id, req.course_id, req.force, req.issued_by)
        .await?;
    Ok(Json(result))
}

async fn validate_credential<S: Store, N: Notifier + Sync + 'static>(
    State(engine): State<Engine<S, N>>,
    Path(numero): Path<String>,
) -> AppResult<Json<ValidationResult>> {
    Ok(Json(engine.validate_credential(&numero).await?))
}
