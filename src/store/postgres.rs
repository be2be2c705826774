// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};
use uuid::Uuid;

use crate::{
    models::{
        attempt::{AnswerRecord, Attempt, AttemptRecord, QuestionRef},
        question::Question,
        quiz::{Quiz, QuizFilter},
        user::User,
    },
    store::{AttemptStore, ContentStore, MarkerStore, StoreError, UserStore},
};

/// Postgres-backed store. Quiz questions and attempt answers live in JSONB
/// columns, so each row reads back as one document.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Represents the 'quizzes' table in the database.
#[derive(FromRow)]
struct QuizRow {
    id: String,
    subject: String,
    topic: String,
    questions: Json<Vec<Question>>,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<QuizRow> for Quiz {
    fn from(row: QuizRow) -> Self {
        Quiz {
            id: row.id,
            subject: row.subject,
            topic: row.topic,
            questions: row.questions.0,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Represents the 'attempts' table in the database.
#[derive(FromRow)]
struct AttemptRow {
    id: String,
    user_id: String,
    quiz_id: String,
    subject: String,
    topic: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    total_time_taken: i64,
    score: i64,
    max_score: i64,
    answers: Json<Vec<AnswerRecord>>,
    question_refs: Json<Vec<QuestionRef>>,
}

impl From<AttemptRow> for AttemptRecord {
    fn from(row: AttemptRow) -> Self {
        AttemptRecord {
            id: row.id,
            attempt: Attempt {
                user_id: row.user_id,
                quiz_id: row.quiz_id,
                subject: row.subject,
                topic: row.topic,
                start_time: row.start_time,
                end_time: row.end_time,
                total_time_taken: row.total_time_taken,
                score: row.score,
                max_score: row.max_score,
                answers: row.answers.0,
                question_refs: row.question_refs.0,
            },
        }
    }
}

const QUIZ_COLUMNS: &str = "id, subject, topic, questions, created_by, created_at, updated_at";

const ATTEMPT_COLUMNS: &str = "id, user_id, quiz_id, subject, topic, start_time, end_time, \
     total_time_taken, score, max_score, answers, question_refs";

#[async_trait]
impl ContentStore for PgStore {
    async fn list_quizzes(&self, filter: &QuizFilter) -> Result<Vec<Quiz>, StoreError> {
        let rows = sqlx::query_as::<_, QuizRow>(&format!(
            r#"
            SELECT {QUIZ_COLUMNS}
            FROM quizzes
            WHERE ($1::TEXT IS NULL OR subject = $1)
              AND ($2::TEXT IS NULL OR topic = $2)
              AND ($3::TEXT IS NULL OR created_by = $3)
            ORDER BY created_at
            "#
        ))
        .bind(filter.subject.as_deref())
        .bind(filter.topic.as_deref())
        .bind(filter.created_by.as_deref())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Quiz::from).collect())
    }

    async fn get_quiz(&self, id: &str) -> Result<Option<Quiz>, StoreError> {
        let row = sqlx::query_as::<_, QuizRow>(&format!(
            "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Quiz::from))
    }

    async fn put_quiz(&self, quiz: &Quiz) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO quizzes (id, subject, topic, questions, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                subject = EXCLUDED.subject,
                topic = EXCLUDED.topic,
                questions = EXCLUDED.questions,
                created_by = EXCLUDED.created_by,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&quiz.id)
        .bind(&quiz.subject)
        .bind(&quiz.topic)
        .bind(Json(&quiz.questions))
        .bind(&quiz.created_by)
        .bind(quiz.created_at)
        .bind(quiz.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn merge_questions(
        &self,
        id: &str,
        questions: &[Question],
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE quizzes SET questions = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(Json(questions))
            .bind(updated_at)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_quiz(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AttemptStore for PgStore {
    async fn create_attempt(&self, attempt: &Attempt) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.put_attempt(&id, attempt).await?;
        Ok(id)
    }

    async fn get_attempt(&self, id: &str) -> Result<Option<Attempt>, StoreError> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| AttemptRecord::from(r).attempt))
    }

    async fn put_attempt(&self, id: &str, attempt: &Attempt) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO attempts
                (id, user_id, quiz_id, subject, topic, start_time, end_time,
                 total_time_taken, score, max_score, answers, question_refs)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                quiz_id = EXCLUDED.quiz_id,
                subject = EXCLUDED.subject,
                topic = EXCLUDED.topic,
                start_time = EXCLUDED.start_time,
                end_time = EXCLUDED.end_time,
                total_time_taken = EXCLUDED.total_time_taken,
                score = EXCLUDED.score,
                max_score = EXCLUDED.max_score,
                answers = EXCLUDED.answers,
                question_refs = EXCLUDED.question_refs
            "#,
        )
        .bind(id)
        .bind(&attempt.user_id)
        .bind(&attempt.quiz_id)
        .bind(&attempt.subject)
        .bind(&attempt.topic)
        .bind(attempt.start_time)
        .bind(attempt.end_time)
        .bind(attempt.total_time_taken)
        .bind(attempt.score)
        .bind(attempt.max_score)
        .bind(Json(&attempt.answers))
        .bind(Json(&attempt.question_refs))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_attempts(&self, user_id: &str) -> Result<Vec<AttemptRecord>, StoreError> {
        let rows = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE user_id = $1 ORDER BY start_time DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AttemptRecord::from).collect())
    }

    async fn delete_attempt(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM attempts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_attempts_for(&self, user_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM attempts WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl MarkerStore for PgStore {
    async fn get_marker(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        let marker: Option<(String,)> =
            sqlx::query_as("SELECT attempt_id FROM attempt_markers WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(marker.map(|(id,)| id))
    }

    async fn set_marker(&self, user_id: &str, attempt_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO attempt_markers (user_id, attempt_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET attempt_id = EXCLUDED.attempt_id
            "#,
        )
        .bind(user_id)
        .bind(attempt_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear_marker(&self, user_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM attempt_markers WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password)
            VALUES ($1, $2)
            RETURNING id, username, password, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let duplicate = matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
            if duplicate {
                StoreError::Conflict(format!("Username '{}' already exists", username))
            } else {
                StoreError::from(e)
            }
        })
    }
}
