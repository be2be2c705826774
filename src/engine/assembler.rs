// src/engine/assembler.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::{
    engine::EngineError,
    models::{
        attempt::{QuestionCount, QuestionRef, TopicSelection},
        question::Question,
        quiz::{Quiz, QuizFilter},
    },
    store::ContentStore,
};

/// What a player asked to be quizzed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetRequest {
    pub subject: String,
    pub topic: TopicSelection,
    pub count: QuestionCount,
}

/// A question of a derived set, with the quiz it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetQuestion {
    pub question: Question,
    pub origin: QuestionRef,
}

/// The ordered questions of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSet {
    /// The chosen quiz's id, or a synthetic id for an "all topics" run.
    pub quiz_id: String,
    pub questions: Vec<SetQuestion>,
}

impl QuestionSet {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SetQuestion> {
        self.questions.get(index)
    }

    pub fn refs(&self) -> Vec<QuestionRef> {
        self.questions.iter().map(|q| q.origin.clone()).collect()
    }
}

/// Fisher-Yates: walk from the last index down to 1, swapping each element
/// with a uniformly chosen one at or below it.
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

/// Number of questions a run gets, always within `[1, available]`.
pub fn clamp_count(count: QuestionCount, available: usize) -> usize {
    match count {
        QuestionCount::All => available,
        QuestionCount::Limit(n) => n.clamp(1, available.max(1)).min(available),
    }
}

/// Synthetic quiz id for runs spanning several stored quizzes.
pub fn combined_quiz_id(now: DateTime<Utc>) -> String {
    format!("all-{}", now.timestamp_millis())
}

/// Builds the question set for a run. Read-only against the content store.
pub async fn assemble<R: Rng + Send>(
    content: &dyn ContentStore,
    request: &SetRequest,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<QuestionSet, EngineError> {
    let subject = request.subject.trim();
    if subject.is_empty() {
        return Err(EngineError::Validation("Select a subject.".to_string()));
    }

    match &request.topic {
        TopicSelection::All => {
            let quizzes = content.list_quizzes(&QuizFilter::subject(subject)).await?;
            let mut pool: Vec<SetQuestion> = quizzes
                .iter()
                .flat_map(|quiz| tagged_questions(quiz, true))
                .collect();

            if pool.is_empty() {
                return Err(EngineError::NotFound(format!(
                    "No questions found for subject '{}'",
                    subject
                )));
            }

            shuffle(&mut pool, rng);
            pool.truncate(clamp_count(request.count, pool.len()));

            Ok(QuestionSet {
                quiz_id: combined_quiz_id(now),
                questions: pool,
            })
        }
        TopicSelection::Topic(topic) => {
            let topic = topic.trim();
            if topic.is_empty() {
                return Err(EngineError::Validation("Select a topic.".to_string()));
            }

            let mut candidates = content
                .list_quizzes(&QuizFilter::subject_topic(subject, topic))
                .await?;

            if candidates.is_empty() {
                return Err(EngineError::NotFound(format!(
                    "No quiz found for '{}' / '{}'",
                    subject, topic
                )));
            }

            let pick = rng.random_range(0..candidates.len());
            let quiz = candidates.swap_remove(pick);
            if quiz.questions.is_empty() {
                return Err(EngineError::NotFound(format!(
                    "Quiz '{}' has no questions",
                    quiz.id
                )));
            }

            let mut questions = tagged_questions(&quiz, false);
            questions.truncate(clamp_count(request.count, questions.len()));

            Ok(QuestionSet {
                quiz_id: quiz.id,
                questions,
            })
        }
    }
}

/// Rebuilds the set of a stored attempt from its question references.
pub async fn rebuild(
    content: &dyn ContentStore,
    quiz_id: &str,
    refs: &[QuestionRef],
    tag_topics: bool,
) -> Result<QuestionSet, EngineError> {
    let mut quizzes: HashMap<String, Quiz> = HashMap::new();
    let mut questions = Vec::with_capacity(refs.len());

    for origin in refs {
        if !quizzes.contains_key(&origin.quiz_id) {
            let quiz = content.get_quiz(&origin.quiz_id).await?.ok_or_else(|| {
                EngineError::NotFound(format!("Quiz '{}' no longer exists", origin.quiz_id))
            })?;
            quizzes.insert(origin.quiz_id.clone(), quiz);
        }

        let quiz = &quizzes[&origin.quiz_id];
        let mut question = quiz.questions.get(origin.index).cloned().ok_or_else(|| {
            EngineError::NotFound(format!(
                "Question {} of quiz '{}' no longer exists",
                origin.index, origin.quiz_id
            ))
        })?;
        if tag_topics {
            question.topic = Some(quiz.topic.clone());
        }

        questions.push(SetQuestion {
            question,
            origin: origin.clone(),
        });
    }

    Ok(QuestionSet {
        quiz_id: quiz_id.to_string(),
        questions,
    })
}

fn tagged_questions(quiz: &Quiz, tag_topic: bool) -> Vec<SetQuestion> {
    quiz.questions
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let mut question = question.clone();
            if tag_topic {
                question.topic = Some(quiz.topic.clone());
            }
            SetQuestion {
                question,
                origin: QuestionRef {
                    quiz_id: quiz.id.clone(),
                    index,
                },
            }
        })
        .collect()
}
