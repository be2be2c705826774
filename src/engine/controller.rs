// src/engine/controller.rs

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use rand::{SeedableRng, rngs::StdRng};
use serde::Serialize;
use tokio::{
    sync::{Mutex, watch},
    time::Instant,
};

use crate::{
    engine::{
        Clock, EngineError, SessionContext, SystemClock,
        assembler::{self, QuestionSet, SetRequest},
        policy::QuizRunConfiguration,
        timer::{QuestionTimer, TimerTarget},
    },
    models::{
        attempt::{ALL_TOPICS, AnswerRecord, Attempt, AttemptRecord, QuestionRef},
        question::{OptionLetter, PublicQuestion, selected_option},
    },
    store::{StoreError, Stores},
};

const TICK: Duration = Duration::from_secs(1);

/// Where a run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "questionIndex", rename_all = "camelCase")]
pub enum Phase {
    NotStarted,
    /// Waiting for an answer to this question.
    InProgress(usize),
    /// Answer recorded and persisted; the explanation is on screen.
    AwaitingReveal(usize),
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::NotStarted => f.write_str("no quiz is running"),
            Phase::InProgress(i) => write!(f, "question {} is being answered", i + 1),
            Phase::AwaitingReveal(i) => write!(f, "question {} is being reviewed", i + 1),
            Phase::Complete => f.write_str("the quiz is complete"),
        }
    }
}

/// Shown after an answer is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reveal {
    #[serde(with = "selected_option")]
    pub selected_option: Option<OptionLetter>,
    pub correct_option: OptionLetter,
    pub is_correct: bool,
    pub points: i64,
    pub explanation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation_image: Option<String>,
}

/// Observable state of a controller, republished on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub phase: Phase,
    pub attempt_id: Option<String>,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub question_index: Option<usize>,
    pub question_count: usize,
    pub question: Option<PublicQuestion>,
    pub time_remaining: Option<u64>,
    pub score: i64,
    pub max_score: i64,
    pub correct_answers: usize,
    pub total_time_taken: Option<i64>,
    pub reveal: Option<Reveal>,
    /// Set when the last answer could not be saved; submitting again retries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Snapshot {
    fn idle(phase: Phase) -> Self {
        Self {
            phase,
            attempt_id: None,
            subject: None,
            topic: None,
            question_index: None,
            question_count: 0,
            question: None,
            time_remaining: None,
            score: 0,
            max_score: 0,
            correct_answers: 0,
            total_time_taken: None,
            reveal: None,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Recorded(Snapshot),
    /// Another submission for this question was already in flight, or the
    /// question it targeted has already been answered.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    Resumed(Snapshot),
    NothingToResume,
}

struct Run {
    attempt_id: String,
    attempt: Attempt,
    set: QuestionSet,
}

struct State {
    session: SessionContext,
    phase: Phase,
    run: Option<Run>,
    reveal: Option<Reveal>,
    time_remaining: Option<u64>,
    /// Question whose time ran out; it can only be answered blank.
    expired: Option<usize>,
    last_error: Option<String>,
    question_shown_at: Instant,
    timer: Option<QuestionTimer>,
    rng: StdRng,
    discarded: bool,
}

struct Shared {
    config: QuizRunConfiguration,
    stores: Stores,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
    submitting: AtomicBool,
    snapshot: watch::Sender<Snapshot>,
}

/// Releases the re-entrancy flag when a submission ends, however it ends.
struct PendingSubmission<'a>(&'a AtomicBool);

impl Drop for PendingSubmission<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives one player's attempt from start to completion.
///
/// Cheap to clone; clones share the same run. Transitions are serialized, and
/// a second submission arriving while one is pending is ignored, so a click
/// racing the timer's auto-submit records exactly one answer.
#[derive(Clone)]
pub struct AttemptController {
    shared: Arc<Shared>,
}

impl AttemptController {
    pub fn new(session: SessionContext, config: QuizRunConfiguration, stores: Stores) -> Self {
        Self::with_parts(
            session,
            config,
            stores,
            Arc::new(SystemClock),
            StdRng::from_os_rng(),
        )
    }

    pub fn with_parts(
        session: SessionContext,
        config: QuizRunConfiguration,
        stores: Stores,
        clock: Arc<dyn Clock>,
        rng: StdRng,
    ) -> Self {
        let (snapshot, _) = watch::channel(Snapshot::idle(Phase::NotStarted));
        let state = State {
            session,
            phase: Phase::NotStarted,
            run: None,
            reveal: None,
            time_remaining: None,
            expired: None,
            last_error: None,
            question_shown_at: Instant::now(),
            timer: None,
            rng,
            discarded: false,
        };

        Self {
            shared: Arc::new(Shared {
                config,
                stores,
                clock,
                state: Mutex::new(state),
                submitting: AtomicBool::new(false),
                snapshot,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.shared.snapshot.subscribe()
    }

    /// Latest published state.
    pub fn snapshot(&self) -> Snapshot {
        self.shared.snapshot.borrow().clone()
    }

    /// Whether both handles drive the same run.
    pub fn is_same(&self, other: &AttemptController) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Stops the run for good: the timer is cancelled and every later
    /// transition fails with `Discarded`. Waits for a write in flight.
    pub async fn discard(&self) {
        let mut state = self.shared.state.lock().await;
        state.discarded = true;
        drop(state.timer.take());
    }

    pub async fn phase(&self) -> Phase {
        self.shared.state.lock().await.phase
    }

    pub async fn session(&self) -> SessionContext {
        self.shared.state.lock().await.session.clone()
    }

    /// The attempt document as last persisted by this controller.
    pub async fn attempt(&self) -> Option<AttemptRecord> {
        let state = self.shared.state.lock().await;
        state.run.as_ref().map(|run| AttemptRecord {
            id: run.attempt_id.clone(),
            attempt: run.attempt.clone(),
        })
    }

    /// Assembles a question set, creates the attempt and shows question 0.
    pub async fn start(&self, request: SetRequest) -> Result<Snapshot, EngineError> {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;
        if state.discarded {
            return Err(EngineError::Discarded);
        }
        if state.phase != Phase::NotStarted {
            return Err(EngineError::InvalidTransition {
                action: "start a quiz",
                phase: state.phase,
            });
        }

        let now = shared.clock.now();
        let set =
            assembler::assemble(shared.stores.content.as_ref(), &request, &mut state.rng, now)
                .await?;

        let attempt = Attempt {
            user_id: state.session.user_id.clone(),
            quiz_id: set.quiz_id.clone(),
            subject: request.subject.trim().to_string(),
            topic: request.topic.to_string(),
            start_time: now,
            end_time: None,
            total_time_taken: 0,
            score: 0,
            max_score: shared.config.scoring.max_score(set.len()),
            answers: Vec::new(),
            question_refs: set.refs(),
        };

        let attempt_id = shared
            .stores
            .attempts
            .create_attempt(&attempt)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create attempt: {:?}", e);
                EngineError::Persistence(e)
            })?;

        if let Err(e) = shared
            .stores
            .markers
            .set_marker(&attempt.user_id, &attempt_id)
            .await
        {
            tracing::warn!(attempt = %attempt_id, "Failed to store resume marker: {}", e);
        }
        state.session.resumable_attempt_id = Some(attempt_id.clone());

        tracing::info!(
            attempt = %attempt_id,
            user = %attempt.user_id,
            subject = %attempt.subject,
            topic = %attempt.topic,
            questions = set.len(),
            "attempt started"
        );

        state.run = Some(Run {
            attempt_id,
            attempt,
            set,
        });
        shared.enter_question(&mut state, 0);
        Ok(shared.publish(&state))
    }

    /// Records an answer for the current question. `None` is the
    /// "time expired, nothing selected" answer and always scores as wrong.
    pub async fn submit_answer(
        &self,
        selection: Option<OptionLetter>,
    ) -> Result<SubmitOutcome, EngineError> {
        self.shared.submit(selection, None).await
    }

    /// Moves from the revealed answer to the next question.
    pub async fn advance(&self) -> Result<Snapshot, EngineError> {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;
        if state.discarded {
            return Err(EngineError::Discarded);
        }
        let index = match state.phase {
            Phase::AwaitingReveal(index) => index,
            phase => {
                return Err(EngineError::InvalidTransition {
                    action: "advance",
                    phase,
                });
            }
        };

        let total = state.run.as_ref().map_or(0, |run| run.set.len());
        if index + 1 >= total {
            return Err(EngineError::InvalidTransition {
                action: "advance past the last question",
                phase: state.phase,
            });
        }

        shared.enter_question(&mut state, index + 1);
        Ok(shared.publish(&state))
    }

    /// Leaves the reveal of the last question for the final score.
    pub async fn finish(&self) -> Result<Snapshot, EngineError> {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;
        if state.discarded {
            return Err(EngineError::Discarded);
        }
        let last = state
            .run
            .as_ref()
            .filter(|run| run.attempt.is_finished())
            .map(|run| run.set.len().saturating_sub(1));

        match state.phase {
            Phase::AwaitingReveal(index) if Some(index) == last => {
                state.phase = Phase::Complete;
                state.reveal = None;
                Ok(shared.publish(&state))
            }
            phase => Err(EngineError::InvalidTransition {
                action: "finish",
                phase,
            }),
        }
    }

    /// Picks up the attempt referenced by the session's resume marker.
    ///
    /// The resumed question gets the full timer duration. A marker pointing
    /// at a missing or already finished attempt is cleared.
    pub async fn resume(&self) -> Result<ResumeOutcome, EngineError> {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;
        if state.discarded {
            return Err(EngineError::Discarded);
        }
        if state.phase != Phase::NotStarted {
            return Err(EngineError::InvalidTransition {
                action: "resume",
                phase: state.phase,
            });
        }

        let Some(attempt_id) = state.session.resumable_attempt_id.clone() else {
            return Ok(ResumeOutcome::NothingToResume);
        };

        let attempt = match shared.stores.attempts.get_attempt(&attempt_id).await? {
            Some(attempt) if !attempt.is_finished() && attempt.user_id == state.session.user_id => {
                attempt
            }
            _ => {
                tracing::info!(attempt = %attempt_id, "Clearing stale resume marker");
                shared.forget_marker(&mut state).await;
                return Ok(ResumeOutcome::NothingToResume);
            }
        };

        let tag_topics = attempt.topic == ALL_TOPICS;
        let set = match assembler::rebuild(
            shared.stores.content.as_ref(),
            &attempt.quiz_id,
            &attempt.question_refs,
            tag_topics,
        )
        .await
        {
            Ok(set) if !set.is_empty() => set,
            Ok(_) | Err(EngineError::NotFound(_)) => {
                tracing::warn!(attempt = %attempt_id, "Questions of unfinished attempt are gone");
                shared.forget_marker(&mut state).await;
                return Ok(ResumeOutcome::NothingToResume);
            }
            Err(e) => return Err(e),
        };

        let answered = attempt.answers.len();
        let mut run = Run {
            attempt_id: attempt_id.clone(),
            attempt,
            set,
        };

        if answered >= run.set.len() {
            run.attempt.finalize(shared.clock.now());
            shared
                .stores
                .attempts
                .put_attempt(&attempt_id, &run.attempt)
                .await?;
            state.run = Some(run);
            state.phase = Phase::Complete;
            shared.forget_marker(&mut state).await;
        } else {
            state.run = Some(run);
            shared.enter_question(&mut state, answered);
        }

        tracing::info!(attempt = %attempt_id, question = answered, "attempt resumed");
        Ok(ResumeOutcome::Resumed(shared.publish(&state)))
    }
}

impl Shared {
    fn enter_question(self: &Arc<Self>, state: &mut State, index: usize) {
        state.phase = Phase::InProgress(index);
        state.reveal = None;
        state.expired = None;
        state.last_error = None;
        state.question_shown_at = Instant::now();
        state.time_remaining = self.config.timer.map(|limit| limit.as_secs());
        state.timer = self
            .config
            .timer
            .map(|_| QuestionTimer::start(Arc::downgrade(self), index, TICK));
    }

    fn time_taken(&self, state: &State) -> u64 {
        match (self.config.timer, state.time_remaining) {
            (Some(limit), Some(remaining)) => {
                let limit = limit.as_secs();
                limit.saturating_sub(remaining).min(limit)
            }
            _ => state.question_shown_at.elapsed().as_secs(),
        }
    }

    async fn submit(
        &self,
        selection: Option<OptionLetter>,
        expected: Option<usize>,
    ) -> Result<SubmitOutcome, EngineError> {
        if self.submitting.swap(true, Ordering::AcqRel) {
            tracing::debug!("Submission already pending, ignoring");
            return Ok(SubmitOutcome::Ignored);
        }
        let _pending = PendingSubmission(&self.submitting);

        let mut state = self.state.lock().await;
        if state.discarded {
            return Err(EngineError::Discarded);
        }
        let index = match state.phase {
            Phase::InProgress(index) => index,
            phase => {
                return match expected {
                    Some(_) => Ok(SubmitOutcome::Ignored),
                    None => Err(EngineError::InvalidTransition {
                        action: "submit an answer",
                        phase,
                    }),
                };
            }
        };
        if expected.is_some_and(|expected| expected != index) {
            return Ok(SubmitOutcome::Ignored);
        }
        let selection = if state.expired == Some(index) {
            None
        } else {
            selection
        };

        let time_taken = self.time_taken(&state);
        let Some(run) = state.run.as_ref() else {
            return Err(EngineError::InvalidTransition {
                action: "submit an answer",
                phase: state.phase,
            });
        };
        let Some(current) = run.set.get(index) else {
            return Err(EngineError::NotFound(format!("Question {} is missing", index)));
        };

        let is_correct = current.question.is_correct(selection);
        let points = self.config.scoring.points(is_correct);
        let origin = current.origin.clone();
        let reveal = Reveal {
            selected_option: selection,
            correct_option: current.question.correct_option,
            is_correct,
            points,
            explanation: current.question.explanation.clone(),
            explanation_image: current.question.explanation_image.clone(),
        };

        let attempt_id = run.attempt_id.clone();
        let mut updated = run.attempt.clone();
        updated.answers.push(AnswerRecord {
            question_index: index,
            selected_option: selection,
            is_correct,
            time_taken,
        });
        updated.score += points;
        let finished = updated.answers.len() == run.set.len();
        if finished {
            updated.finalize(self.clock.now());
        }

        if let Err(e) = self.stores.attempts.put_attempt(&attempt_id, &updated).await {
            tracing::error!(attempt = %attempt_id, question = index, "Failed to record answer: {}", e);
            state.last_error = Some(format!(
                "The answer to question {} was not saved, submit it again",
                index + 1
            ));
            self.publish(&state);
            return Err(EngineError::Persistence(e));
        }

        drop(state.timer.take());
        state.last_error = None;
        if let Some(run) = state.run.as_mut() {
            run.attempt = updated;
        }
        state.phase = Phase::AwaitingReveal(index);
        state.reveal = Some(reveal);

        if finished {
            self.forget_marker(&mut state).await;
            tracing::info!(attempt = %attempt_id, "attempt finished");
        }

        let snapshot = self.publish(&state);
        drop(state);

        self.record_difficulty(&origin, is_correct).await;
        Ok(SubmitOutcome::Recorded(snapshot))
    }

    /// Feeds the answer back into the question's difficulty signal. The
    /// attempt is already persisted, so a failure here is only logged.
    async fn record_difficulty(&self, origin: &QuestionRef, is_correct: bool) {
        let content = &self.stores.content;
        let result: Result<Option<i32>, StoreError> = async {
            let Some(mut quiz) = content.get_quiz(&origin.quiz_id).await? else {
                return Ok(None);
            };
            let Some(question) = quiz.questions.get_mut(origin.index) else {
                return Ok(None);
            };
            question.score = self.config.difficulty.adjust(question.score, is_correct);
            let score = question.score;

            if content
                .merge_questions(&quiz.id, &quiz.questions, quiz.updated_at)
                .await?
            {
                Ok(Some(score))
            } else {
                Ok(None)
            }
        }
        .await;

        match result {
            Ok(Some(score)) => {
                tracing::debug!(quiz = %origin.quiz_id, question = origin.index, score, "difficulty updated");
            }
            Ok(None) => {
                tracing::warn!(quiz = %origin.quiz_id, question = origin.index, "Question vanished before its difficulty could be updated");
            }
            Err(e) => {
                tracing::warn!(quiz = %origin.quiz_id, question = origin.index, "Failed to update difficulty: {}", e);
            }
        }
    }

    async fn forget_marker(&self, state: &mut State) {
        state.session.resumable_attempt_id = None;
        if let Err(e) = self.stores.markers.clear_marker(&state.session.user_id).await {
            tracing::warn!(user = %state.session.user_id, "Failed to clear resume marker: {}", e);
        }
    }

    fn snapshot_of(&self, state: &State) -> Snapshot {
        let Some(run) = state.run.as_ref() else {
            return Snapshot::idle(state.phase);
        };

        let index = match state.phase {
            Phase::InProgress(i) | Phase::AwaitingReveal(i) => Some(i),
            Phase::NotStarted | Phase::Complete => None,
        };

        Snapshot {
            phase: state.phase,
            attempt_id: Some(run.attempt_id.clone()),
            subject: Some(run.attempt.subject.clone()),
            topic: Some(run.attempt.topic.clone()),
            question_index: index,
            question_count: run.set.len(),
            question: index
                .and_then(|i| run.set.get(i))
                .map(|q| PublicQuestion::from(&q.question)),
            time_remaining: match state.phase {
                Phase::InProgress(_) => state.time_remaining,
                _ => None,
            },
            score: run.attempt.score,
            max_score: run.attempt.max_score,
            correct_answers: run.attempt.correct_answers(),
            total_time_taken: run.attempt.end_time.map(|_| run.attempt.total_time_taken),
            reveal: match state.phase {
                Phase::AwaitingReveal(_) => state.reveal.clone(),
                _ => None,
            },
            last_error: state.last_error.clone(),
        }
    }

    fn publish(&self, state: &State) -> Snapshot {
        let snapshot = self.snapshot_of(state);
        self.snapshot.send_replace(snapshot.clone());
        snapshot
    }
}

#[async_trait]
impl TimerTarget for Shared {
    async fn tick(&self, index: usize) -> Option<u64> {
        let mut state = self.state.lock().await;
        if state.phase != Phase::InProgress(index) {
            return None;
        }

        let remaining = state.time_remaining?.saturating_sub(1);
        state.time_remaining = Some(remaining);
        if remaining == 0 {
            state.expired = Some(index);
            // The task is about to submit on its own behalf; it must not be
            // aborted by that submission.
            if let Some(timer) = state.timer.take() {
                timer.detach();
            }
        }
        self.publish(&state);
        Some(remaining)
    }

    async fn expire(&self, index: usize) {
        match self.submit(None, Some(index)).await {
            Ok(SubmitOutcome::Recorded(_)) => {
                tracing::info!(question = index, "Unanswered question submitted on timeout");
            }
            Ok(SubmitOutcome::Ignored) => {
                tracing::debug!(question = index, "Timeout lost the race to a manual answer");
            }
            Err(e) => {
                tracing::warn!(question = index, "Timeout submission failed: {}", e);
            }
        }
    }
}
