// src/store/mod.rs

//! Document-store collaborators consumed by the engine and the handlers.
//!
//! Each concern is its own trait so the engine only sees what it needs.
//! [`MemoryStore`] and [`PgStore`] implement all of them.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    attempt::{Attempt, AttemptRecord},
    question::Question,
    quiz::{Quiz, QuizFilter},
    user::User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("document encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("duplicate document: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Quiz documents.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn list_quizzes(&self, filter: &QuizFilter) -> Result<Vec<Quiz>, StoreError>;

    async fn get_quiz(&self, id: &str) -> Result<Option<Quiz>, StoreError>;

    /// Full write: inserts or replaces the whole document.
    async fn put_quiz(&self, quiz: &Quiz) -> Result<(), StoreError>;

    /// Merge write: only the question list and `updated_at` change.
    /// Returns `false` when no quiz has this id.
    async fn merge_questions(
        &self,
        id: &str,
        questions: &[Question],
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn delete_quiz(&self, id: &str) -> Result<bool, StoreError>;
}

/// Attempt documents.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn create_attempt(&self, attempt: &Attempt) -> Result<String, StoreError>;

    async fn get_attempt(&self, id: &str) -> Result<Option<Attempt>, StoreError>;

    /// Full overwrite of the document stored under `id`.
    async fn put_attempt(&self, id: &str, attempt: &Attempt) -> Result<(), StoreError>;

    /// Attempts of one user, newest first.
    async fn list_attempts(&self, user_id: &str) -> Result<Vec<AttemptRecord>, StoreError>;

    async fn delete_attempt(&self, id: &str) -> Result<bool, StoreError>;

    async fn delete_attempts_for(&self, user_id: &str) -> Result<u64, StoreError>;
}

/// Per-user pointer to the attempt that can be resumed.
#[async_trait]
pub trait MarkerStore: Send + Sync {
    async fn get_marker(&self, user_id: &str) -> Result<Option<String>, StoreError>;

    async fn set_marker(&self, user_id: &str, attempt_id: &str) -> Result<(), StoreError>;

    async fn clear_marker(&self, user_id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the username is taken.
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError>;
}

/// The set of stores the application runs against.
#[derive(Clone)]
pub struct Stores {
    pub content: Arc<dyn ContentStore>,
    pub attempts: Arc<dyn AttemptStore>,
    pub markers: Arc<dyn MarkerStore>,
    pub users: Arc<dyn UserStore>,
}

impl Stores {
    /// Uses one backend for every concern.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: ContentStore + AttemptStore + MarkerStore + UserStore + 'static,
    {
        Self {
            content: backend.clone(),
            attempts: backend.clone(),
            markers: backend.clone(),
            users: backend,
        }
    }
}
