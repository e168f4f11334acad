//! Completion ledger updates and what follows them: cached progress,
//! enrollment state and automatic credential issuance.

use crate::engine::Engine;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::notify::Notifier;
use crate::progress::CourseProgress;
use crate::store::Store;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CompletionOutcome {
    pub progress: i32,
    pub state: EnrollmentState,
    pub course_completed: bool,
    /// True only when this call created the credential.
    pub credential_issued: bool,
    pub credential_numero: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
pub struct QuestionFeedback {
    pub question_id: Uuid,
    pub correct: bool,
    pub chosen: i32, // -1 when unanswered
    pub expected: i32,
    pub explanation: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
pub struct QuizOutcome {
    pub score: f64,
    pub passed: bool,
    pub correct: usize,
    pub total: usize,
    pub feedback: Vec<QuestionFeedback>,
    pub completion: Option<CompletionOutcome>,
}

#[derive(Serialize, Debug, Clone)]
pub struct ReviewOutcome {
    pub evidence: Evidence,
    pub completion: Option<CompletionOutcome>,
}

/// Percentage of correct answers; a quiz without questions scores 0.
pub fn grade(questions: &[Question], answers: &HashMap<Uuid, i32>) -> (usize, Vec<QuestionFeedback>) {
    let feedback: Vec<QuestionFeedback> = questions
        .iter()
        .map(|q| {
            let chosen = answers.get(&q.id).copied();
            QuestionFeedback {
                question_id: q.id,
                correct: chosen == Some(q.correct_option),
                chosen: chosen.unwrap_or(-1),
                expected: q.correct_option,
                explanation: q.explanation.clone(),
            }
        })
        .collect();
    let correct = feedback.iter().filter(|f| f.correct).count();
    (correct, feedback)
}

fn score(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    correct as f64 * 100.0 / total as f64
}

impl<S, N> Engine<S, N>
where
    S: Store,
    N: Notifier + Sync + 'static,
{
    /// Records that the student satisfied `module_id`, refreshes the cached
    /// progress and state, and issues the credential once the course is done.
    pub async fn mark_module_complete(
        &self,
        student_id: Uuid,
        module_id: Uuid,
        course_id: Uuid,
    ) -> AppResult<CompletionOutcome> {
        let mut enrollment = self
            .store
            .enrollment(student_id, course_id)
            .await?
            .ok_or(AppError::NotFound("enrollment"))?;
        let module = self.store.module(module_id).await?;
        if module.map(|m| m.course_id) != Some(course_id) {
            return Err(AppError::NotFound("module"));
        }

        if self.store.mark_complete(student_id, module_id, course_id).await? {
            tracing::info!(student_id = %student_id, module_id = %module_id, "module completed");
        }

        let progress = CourseProgress::load(&self.store, student_id, course_id).await?;
        let before = enrollment.state;
        enrollment.apply(&progress, Utc::now());
        self.store.save_enrollment(&enrollment).await?;
        if before != enrollment.state {
            tracing::info!(
                student_id = %student_id,
                course_id = %course_id,
                from = ?before,
                to = ?enrollment.state,
                "enrollment state changed"
            );
        }

        let mut outcome = CompletionOutcome {
            progress: enrollment.progress,
            state: enrollment.state,
            course_completed: progress.is_complete(),
            credential_issued: false,
            credential_numero: None,
        };

        if outcome.course_completed {
            match self.issue_credential(student_id, course_id, false, None).await {
                Ok(issued) => {
                    outcome.credential_issued = !issued.already_existed;
                    outcome.credential_numero = Some(issued.credential.numero);
                }
                Err(e) => {
                    // completion stands; issuance can be re-driven later
                    tracing::error!(error = %e, student_id = %student_id, course_id = %course_id, "automatic credential issuance failed");
                }
            }
        }
        Ok(outcome)
    }

    pub async fn submit_quiz(
        &self,
        student_id: Uuid,
        course_id: Uuid,
        module_id: Uuid,
        answers: HashMap<Uuid, i32>,
    ) -> AppResult<QuizOutcome> {
        let module = self.store.module(module_id).await?.ok_or(AppError::NotFound("module"))?;
        if module.course_id != course_id {
            return Err(AppError::NotFound("module"));
        }
        if module.kind != ModuleKind::Quiz {
            return Err(AppError::BadRequest("module is not a quiz".into()));
        }
        if self.store.enrollment(student_id, course_id).await?.is_none() {
            return Err(AppError::NotFound("enrollment"));
        }

        let questions = self.store.questions(module_id).await?;
        let (correct, feedback) = grade(&questions, &answers);
        let score = score(correct, questions.len());
        let passed = score >= self.config.quiz_pass_score;

        self.store
            .record_quiz_attempt(&QuizAttempt {
                id: Uuid::new_v4(),
                student_id,
                module_id,
                score,
                passed,
                answers,
            })
            .await?;
        tracing::info!(student_id = %student_id, module_id = %module_id, score, passed, "quiz graded");

        let completion = if passed {
            let mut outcome = self.mark_module_complete(student_id, module_id, course_id).await?;
            if outcome.course_completed && outcome.credential_numero.is_some() {
                outcome.state = self.approve(student_id, course_id).await?;
            }
            Some(outcome)
        } else {
            None
        };

        Ok(QuizOutcome { score, passed, correct, total: questions.len(), feedback, completion })
    }

    async fn approve(&self, student_id: Uuid, course_id: Uuid) -> AppResult<EnrollmentState> {
        let mut enrollment = self
            .store
            .enrollment(student_id, course_id)
            .await?
            .ok_or(AppError::NotFound("enrollment"))?;
        let next = enrollment.state.approve();
        if next != enrollment.state {
            enrollment.state = next;
            self.store.save_enrollment(&enrollment).await?;
            tracing::info!(student_id = %student_id, course_id = %course_id, "enrollment approved");
        }
        Ok(enrollment.state)
    }

    /// Approves or rejects one evidence. Approving the last outstanding
    /// photo-required task of a practical module completes that module.
    pub async fn review_evidence(
        &self,
        evidence_id: Uuid,
        approved: bool,
        feedback: Option<String>,
        reviewer_id: Option<Uuid>,
    ) -> AppResult<ReviewOutcome> {
        if self.store.evidence(evidence_id).await?.is_none() {
            return Err(AppError::NotFound("evidence"));
        }
        let state = if approved { EvidenceState::Approved } else { EvidenceState::Rejected };
        let evidence = self.store.review_evidence(evidence_id, state, feedback, reviewer_id).await?;

        if !approved {
            return Ok(ReviewOutcome { evidence, completion: None });
        }

        let task = self.store.task(evidence.task_id).await?.ok_or(AppError::NotFound("task"))?;
        let module = self.store.module(task.module_id).await?.ok_or(AppError::NotFound("module"))?;
        let tasks = self.store.tasks(module.id).await?;
        let approved_tasks = self.store.approved_tasks(evidence.student_id, module.id).await?;
        let satisfied = !tasks.is_empty()
            && tasks.iter().filter(|t| t.requires_photo).all(|t| approved_tasks.contains(&t.id));

        let completion = if satisfied {
            Some(self.mark_module_complete(evidence.student_id, module.id, module.course_id).await?)
        } else {
            None
        };
        Ok(ReviewOutcome { evidence, completion })
    }
}
