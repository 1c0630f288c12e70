//! In-memory session store: one prepared dataset plus its question history
//! per session id.
//!
//! Sessions live until they are removed; nothing is evicted.

use crate::assistant::QueryAssistant;
use crate::dataset::Dataset;
use crate::error::{QaError, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    #[serde(rename = "q")]
    pub question: String,
    #[serde(rename = "a")]
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Session {
    dataset: Arc<Dataset>,
    history: Vec<HistoryEntry>,
}

pub struct SessionStore {
    sessions: DashMap<Uuid, Session>,
    assistant: QueryAssistant,
}

impl SessionStore {
    pub fn new(assistant: QueryAssistant) -> Self {
        Self {
            sessions: DashMap::new(),
            assistant,
        }
    }

    /// Prepare `frame` and open a session for it.
    pub fn create(&self, frame: DataFrame) -> Result<Uuid> {
        let dataset = Dataset::prepare(frame)?;
        Ok(self.insert(dataset))
    }

    /// Open a session for an already prepared dataset.
    pub fn insert(&self, dataset: Dataset) -> Uuid {
        let id = Uuid::new_v4();
        info!("Created session {} ({} rows)", id, dataset.height());
        self.sessions.insert(
            id,
            Session {
                dataset: Arc::new(dataset),
                history: Vec::new(),
            },
        );
        id
    }

    /// Answer a question within a session and record it. Returns the answer
    /// and the full history, in arrival order.
    pub fn ask(&self, id: &Uuid, question: &str) -> Result<(String, Vec<HistoryEntry>)> {
        let asked_at = Utc::now();
        // The dataset is read-only, so the map lock is not held while answering.
        let dataset = self
            .sessions
            .get(id)
            .map(|session| Arc::clone(&session.dataset))
            .ok_or(QaError::SessionNotFound(*id))?;

        let answer = self.assistant.answer(&dataset, question);

        let history = self.record(
            id,
            HistoryEntry {
                question: question.to_string(),
                answer: answer.clone(),
                asked_at,
            },
        )?;
        Ok((answer, history))
    }

    /// Insert `entry` by arrival time. Answers can finish out of order.
    fn record(&self, id: &Uuid, entry: HistoryEntry) -> Result<Vec<HistoryEntry>> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or(QaError::SessionNotFound(*id))?;
        let position = session
            .history
            .partition_point(|existing| existing.asked_at <= entry.asked_at);
        session.history.insert(position, entry);
        Ok(session.history.clone())
    }

    pub fn history(&self, id: &Uuid) -> Result<Vec<HistoryEntry>> {
        self.sessions
            .get(id)
            .map(|session| session.history.clone())
            .ok_or(QaError::SessionNotFound(*id))
    }

    /// Original column names of the session's dataset.
    pub fn columns(&self, id: &Uuid) -> Result<Vec<String>> {
        self.sessions
            .get(id)
            .map(|session| session.dataset.columns())
            .ok_or(QaError::SessionNotFound(*id))
    }

    pub fn remove(&self, id: &Uuid) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(QueryAssistant::default())
    }
}
