// src/store/memory.rs

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicI64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    models::{
        attempt::{Attempt, AttemptRecord},
        question::Question,
        quiz::{Quiz, QuizFilter},
        user::User,
    },
    store::{AttemptStore, ContentStore, MarkerStore, StoreError, UserStore},
};

/// In-process document store. Used when no database is configured and in tests.
///
/// Writes can be made to fail or to lag, which lets tests exercise the
/// engine's retry and re-entrancy behaviour.
#[derive(Default)]
pub struct MemoryStore {
    quizzes: RwLock<Vec<Quiz>>,
    attempts: RwLock<HashMap<String, Attempt>>,
    markers: RwLock<HashMap<String, String>>,
    users: RwLock<Vec<User>>,
    next_user_id: AtomicI64,
    fail_attempt_writes: AtomicBool,
    fail_quiz_writes: AtomicBool,
    write_delay: RwLock<Option<Duration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every attempt write fail until switched back off.
    pub fn fail_attempt_writes(&self, fail: bool) {
        self.fail_attempt_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every quiz write fail until switched back off.
    pub fn fail_quiz_writes(&self, fail: bool) {
        self.fail_quiz_writes.store(fail, Ordering::SeqCst);
    }

    /// Delays every attempt write by `delay`.
    pub async fn set_write_delay(&self, delay: Option<Duration>) {
        *self.write_delay.write().await = delay;
    }

    async fn attempt_write_gate(&self) -> Result<(), StoreError> {
        let delay = *self.write_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_attempt_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("attempt writes disabled".to_string()));
        }
        Ok(())
    }

    fn quiz_write_gate(&self) -> Result<(), StoreError> {
        if self.fail_quiz_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("quiz writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn list_quizzes(&self, filter: &QuizFilter) -> Result<Vec<Quiz>, StoreError> {
        let quizzes = self.quizzes.read().await;
        Ok(quizzes.iter().filter(|q| filter.matches(q)).cloned().collect())
    }

    async fn get_quiz(&self, id: &str) -> Result<Option<Quiz>, StoreError> {
        let quizzes = self.quizzes.read().await;
        Ok(quizzes.iter().find(|q| q.id == id).cloned())
    }

    async fn put_quiz(&self, quiz: &Quiz) -> Result<(), StoreError> {
        self.quiz_write_gate()?;
        let mut quizzes = self.quizzes.write().await;
        match quizzes.iter_mut().find(|q| q.id == quiz.id) {
            Some(existing) => *existing = quiz.clone(),
            None => quizzes.push(quiz.clone()),
        }
        Ok(())
    }

    async fn merge_questions(
        &self,
        id: &str,
        questions: &[Question],
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.quiz_write_gate()?;
        let mut quizzes = self.quizzes.write().await;
        let Some(quiz) = quizzes.iter_mut().find(|q| q.id == id) else {
            return Ok(false);
        };
        quiz.questions = questions.to_vec();
        quiz.updated_at = updated_at;
        Ok(true)
    }

    async fn delete_quiz(&self, id: &str) -> Result<bool, StoreError> {
        self.quiz_write_gate()?;
        let mut quizzes = self.quizzes.write().await;
        let before = quizzes.len();
        quizzes.retain(|q| q.id != id);
        Ok(quizzes.len() != before)
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn create_attempt(&self, attempt: &Attempt) -> Result<String, StoreError> {
        self.attempt_write_gate().await?;
        let id = Uuid::new_v4().to_string();
        self.attempts
            .write()
            .await
            .insert(id.clone(), attempt.clone());
        Ok(id)
    }

    async fn get_attempt(&self, id: &str) -> Result<Option<Attempt>, StoreError> {
        Ok(self.attempts.read().await.get(id).cloned())
    }

    async fn put_attempt(&self, id: &str, attempt: &Attempt) -> Result<(), StoreError> {
        self.attempt_write_gate().await?;
        self.attempts
            .write()
            .await
            .insert(id.to_string(), attempt.clone());
        Ok(())
    }

    async fn list_attempts(&self, user_id: &str) -> Result<Vec<AttemptRecord>, StoreError> {
        let attempts = self.attempts.read().await;
        let mut records: Vec<AttemptRecord> = attempts
            .iter()
            .filter(|(_, a)| a.user_id == user_id)
            .map(|(id, a)| AttemptRecord {
                id: id.clone(),
                attempt: a.clone(),
            })
            .collect();
        records.sort_by(|a, b| b.attempt.start_time.cmp(&a.attempt.start_time));
        Ok(records)
    }

    async fn delete_attempt(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.attempts.write().await.remove(id).is_some())
    }

    async fn delete_attempts_for(&self, user_id: &str) -> Result<u64, StoreError> {
        let mut attempts = self.attempts.write().await;
        let before = attempts.len();
        attempts.retain(|_, a| a.user_id != user_id);
        Ok((before - attempts.len()) as u64)
    }
}

#[async_trait]
impl MarkerStore for MemoryStore {
    async fn get_marker(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.markers.read().await.get(user_id).cloned())
    }

    async fn set_marker(&self, user_id: &str, attempt_id: &str) -> Result<(), StoreError> {
        self.markers
            .write()
            .await
            .insert(user_id.to_string(), attempt_id.to_string());
        Ok(())
    }

    async fn clear_marker(&self, user_id: &str) -> Result<(), StoreError> {
        self.markers.write().await.remove(user_id);
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.username == username) {
            return Err(StoreError::Conflict(format!(
                "Username '{}' already exists",
                username
            )));
        }

        let user = User {
            id: self.next_user_id.fetch_add(1, Ordering::SeqCst) + 1,
            username: username.to_string(),
            password: password_hash.to_string(),
            created_at: Some(Utc::now()),
        };
        users.push(user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;

    fn attempt(user: &str, offset_secs: i64) -> Attempt {
        Attempt {
            user_id: user.to_string(),
            quiz_id: "q".to_string(),
            subject: "s".to_string(),
            topic: "t".to_string(),
            start_time: Utc::now() + ChronoDuration::seconds(offset_secs),
            end_time: None,
            total_time_taken: 0,
            score: 0,
            max_score: 4,
            answers: Vec::new(),
            question_refs: Vec::new(),
        }
    }

    #[tokio::test]
    async fn attempts_list_newest_first_and_bulk_delete() {
        let store = MemoryStore::new();
        let older = store.create_attempt(&attempt("u1", -60)).await.unwrap();
        let newer = store.create_attempt(&attempt("u1", 0)).await.unwrap();
        store.create_attempt(&attempt("u2", 0)).await.unwrap();

        let listed = store.list_attempts("u1").await.unwrap();
        let ids: Vec<_> = listed.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![newer, older]);

        assert_eq!(store.delete_attempts_for("u1").await.unwrap(), 2);
        assert!(store.list_attempts("u1").await.unwrap().is_empty());
        assert_eq!(store.list_attempts("u2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failing_writes_surface_as_unavailable() {
        let store = MemoryStore::new();
        store.fail_attempt_writes(true);

        let err = store.create_attempt(&attempt("u1", 0)).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let store = MemoryStore::new();
        let first = store.create_user("alice", "hash").await.unwrap();
        assert_eq!(first.id, 1);

        let err = store.create_user("alice", "hash").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
