use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    context::Context,
    error::Result,
    funnel::{Funnel, FunnelStage},
};

/// One customer's loan application conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub customer_id: String,
    pub funnel: Funnel,
    pub context: Context,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(customer_id: impl Into<String>) -> Self {
        Self::with_context(customer_id, Context::new())
    }

    pub fn with_context(customer_id: impl Into<String>, context: Context) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            customer_id: customer_id.into(),
            funnel: Funnel::new(),
            context,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn stage(&self) -> FunnelStage {
        self.funnel.stage
    }

    pub fn is_active(&self) -> bool {
        !self.funnel.stage.is_terminal()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Trait for storing and retrieving sessions
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, session: Session) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Session>>;
    async fn delete(&self, id: &str) -> Result<()>;
    /// Most recently created session for the customer that is not yet terminal.
    async fn find_active(&self, customer_id: &str) -> Result<Option<Session>>;
    fn backend(&self) -> &'static str;
}

/// In-memory implementation of SessionStorage
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, Session>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for InMemorySessionStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: Session) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }

    async fn find_active(&self, customer_id: &str) -> Result<Option<Session>> {
        Ok(self
            .sessions
            .iter()
            .filter(|entry| entry.customer_id == customer_id && entry.is_active())
            .max_by_key(|entry| entry.created_at)
            .map(|entry| entry.value().clone()))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
