//! Assistant
//!
//! The entry point the CLI talks to. Owns the shared meeting store and the
//! session registry, and routes every utterance: the scheduler gets the
//! first look, anything it does not claim goes to the retrieval agent.
//! Each session processes one utterance at a time because its handle is
//! held locked for the whole turn.

use crate::clock::Clock;
use crate::conductor::{RetrievalAgent, RetrievalAnswer};
use crate::scheduler::types::SchedulerReply;
use crate::scheduler::SchedulerAgent;
use crate::session::{SessionRegistry, Turn, TurnKind};
use crate::store::MeetingStore;
use crate::trace::ExecutionTrace;
use sdk::errors::EngineError;
use sdk::types::Meeting;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// What one turn produced
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "agent", rename_all = "lowercase")]
pub enum AssistantReply {
    Schedule(SchedulerReply),
    Answer(RetrievalAnswer),
}

impl AssistantReply {
    pub fn text(&self) -> &str {
        match self {
            Self::Schedule(reply) => &reply.message,
            Self::Answer(answer) => &answer.answer,
        }
    }

    pub fn trace(&self) -> &ExecutionTrace {
        match self {
            Self::Schedule(reply) => &reply.trace,
            Self::Answer(answer) => &answer.trace,
        }
    }

    pub fn kind(&self) -> TurnKind {
        match self {
            Self::Schedule(_) => TurnKind::Schedule,
            Self::Answer(answer) => answer.decision.into(),
        }
    }
}

pub struct Assistant {
    scheduler: SchedulerAgent,
    retrieval: RetrievalAgent,
    store: Arc<MeetingStore>,
    sessions: SessionRegistry,
    clock: Arc<dyn Clock>,
}

impl Assistant {
    pub fn new(
        scheduler: SchedulerAgent,
        retrieval: RetrievalAgent,
        store: Arc<MeetingStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            scheduler,
            retrieval,
            store,
            sessions: SessionRegistry::new(),
            clock,
        }
    }

    pub fn store(&self) -> &Arc<MeetingStore> {
        &self.store
    }

    /// Open a session, optionally bound to a stored meeting.
    ///
    /// # Errors
    /// `MeetingNotFound` when `meeting_id` is not in the store.
    pub async fn create_session(&self, meeting_id: Option<&str>) -> Result<String, EngineError> {
        let meeting = match meeting_id {
            Some(id) => Some(
                self.store
                    .get(id)
                    .await
                    .ok_or_else(|| EngineError::MeetingNotFound(id.to_string()))?,
            ),
            None => None,
        };
        Ok(self.sessions.create(meeting).await)
    }

    pub async fn destroy_session(&self, session_id: &str) -> bool {
        self.sessions.destroy(session_id).await
    }

    pub async fn list_meetings(&self) -> Vec<Meeting> {
        self.store.list().await
    }

    pub async fn reload_meetings(&self) -> Result<usize, EngineError> {
        self.store.reload().await
    }

    /// Process one utterance to completion and record it in the session.
    ///
    /// # Errors
    /// Only `UnknownSession`. Agent failures come back as reply states.
    pub async fn handle(&self, session_id: &str, text: &str) -> Result<AssistantReply, EngineError> {
        let handle = self.sessions.get(session_id).await?;
        let mut session = handle.lock().await;

        let reply = match self.scheduler.handle(text, &mut session, &self.store).await {
            Some(reply) => AssistantReply::Schedule(reply),
            None => AssistantReply::Answer(self.retrieval.handle(text, &session).await),
        };

        info!(session = %session_id, kind = ?reply.kind(), "Turn handled");
        session.record(Turn {
            query: text.to_string(),
            answer: reply.text().to_string(),
            kind: reply.kind(),
            timestamp: self.clock.now(),
        });
        Ok(reply)
    }
}
