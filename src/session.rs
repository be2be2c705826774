// src/session.rs

//! One attempt controller per signed-in user.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;

use crate::{
    engine::{
        AttemptController, EngineError, Phase, QuizRunConfiguration, ResumeOutcome,
        SessionContext, Snapshot, assembler::SetRequest,
    },
    store::Stores,
};

#[derive(Clone)]
pub struct SessionRegistry {
    controllers: Arc<RwLock<HashMap<String, AttemptController>>>,
    stores: Stores,
    config: QuizRunConfiguration,
}

impl SessionRegistry {
    pub fn new(stores: Stores, config: QuizRunConfiguration) -> Self {
        Self {
            controllers: Arc::new(RwLock::new(HashMap::new())),
            stores,
            config,
        }
    }

    pub fn run_configuration(&self) -> &QuizRunConfiguration {
        &self.config
    }

    /// The user's controller. Created on first use, picking up the attempt
    /// the user left unfinished if there is one.
    pub async fn controller(&self, user_id: &str) -> Result<AttemptController, EngineError> {
        if let Some(controller) = self.controllers.read().await.get(user_id) {
            return Ok(controller.clone());
        }

        // Opened without the map lock; a concurrent open of the same user
        // loses to whichever controller was inserted first.
        let opened = self.open(user_id).await?;
        let mut controllers = self.controllers.write().await;
        Ok(controllers
            .entry(user_id.to_string())
            .or_insert(opened)
            .clone())
    }

    /// Starts a new run. A completed run is replaced; one still in flight
    /// makes this fail with `InvalidTransition`.
    pub async fn start(&self, user_id: &str, request: SetRequest) -> Result<Snapshot, EngineError> {
        let current = self.controller(user_id).await?;
        let controller = if current.phase().await == Phase::Complete {
            self.replace(user_id, &current, self.fresh(user_id, None))
                .await
        } else {
            current
        };

        controller.start(request).await
    }

    /// Leaves the final reveal for the score screen. The finished
    /// controller is released once its final snapshot has been returned.
    pub async fn finish(&self, user_id: &str) -> Result<Snapshot, EngineError> {
        let controller = self.controller(user_id).await?;
        let snapshot = controller.finish().await?;
        self.release(user_id, &controller).await;
        Ok(snapshot)
    }

    /// Stops the user's controller when it is running `attempt_id`, or any
    /// controller when no id is given. Used before attempts are deleted.
    pub async fn discard(&self, user_id: &str, attempt_id: Option<&str>) {
        let current = self.controllers.read().await.get(user_id).cloned();

        if let Some(controller) = current {
            let running = controller.attempt().await.map(|record| record.id);
            let matches = match attempt_id {
                Some(id) => running.as_deref() == Some(id),
                None => true,
            };
            if !matches {
                return;
            }
            controller.discard().await;
            self.release(user_id, &controller).await;
        } else if let Some(id) = attempt_id {
            match self.stores.markers.get_marker(user_id).await {
                Ok(Some(marker)) if marker == id => {}
                _ => return,
            }
        }

        if let Err(e) = self.stores.markers.clear_marker(user_id).await {
            tracing::warn!(user = %user_id, "Failed to clear resume marker: {}", e);
        }
    }

    /// Installs `next` unless `current` was already replaced by someone else.
    async fn replace(
        &self,
        user_id: &str,
        current: &AttemptController,
        next: AttemptController,
    ) -> AttemptController {
        let mut controllers = self.controllers.write().await;
        match controllers.get(user_id) {
            Some(existing) if !existing.is_same(current) => existing.clone(),
            _ => {
                controllers.insert(user_id.to_string(), next.clone());
                next
            }
        }
    }

    async fn release(&self, user_id: &str, controller: &AttemptController) {
        let mut controllers = self.controllers.write().await;
        if controllers
            .get(user_id)
            .is_some_and(|existing| existing.is_same(controller))
        {
            controllers.remove(user_id);
        }
    }

    async fn open(&self, user_id: &str) -> Result<AttemptController, EngineError> {
        let marker = self.stores.markers.get_marker(user_id).await?;
        let controller = self.fresh(user_id, marker);

        if let ResumeOutcome::Resumed(snapshot) = controller.resume().await? {
            tracing::info!(user = %user_id, phase = %snapshot.phase, "Picked up unfinished attempt");
        }
        Ok(controller)
    }

    fn fresh(&self, user_id: &str, marker: Option<String>) -> AttemptController {
        AttemptController::new(
            SessionContext::new(user_id).with_marker(marker),
            self.config.clone(),
            self.stores.clone(),
        )
    }
}
