//! Meeting Store
//!
//! The single source of truth for scheduling conflicts. All access goes
//! through one `RwLock`; every mutation builds the next snapshot, hands it
//! to the optional [`SnapshotSink`] and only swaps it in once the write
//! succeeded. A failed write leaves the in-memory store untouched.
//!
//! [`MeetingStore::commit`] re-runs the conflict check inside the same
//! write-lock critical section as the insert, so two sessions can never
//! both commit overlapping meetings.

pub mod persist;

pub use persist::{JsonFileSink, SnapshotSink};

use sdk::errors::EngineError;
use sdk::types::{Meeting, TimeWindow};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Result of [`MeetingStore::commit`]
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// The meeting is now in the store; `replaced` is the record it superseded
    Committed {
        meeting: Meeting,
        replaced: Option<Meeting>,
    },
    /// Another record claimed the window since the proposal was checked
    Conflict(Vec<Meeting>),
    /// A meeting with this id is already stored; nothing changed
    AlreadyCommitted(Meeting),
}

pub struct MeetingStore {
    meetings: RwLock<Vec<Meeting>>,
    sink: Option<Arc<dyn SnapshotSink>>,
}

impl MeetingStore {
    /// In-memory store with no write-through
    pub fn in_memory(meetings: Vec<Meeting>) -> Result<Self, EngineError> {
        Ok(Self {
            meetings: RwLock::new(sanitize(meetings)?),
            sink: None,
        })
    }

    /// Load from `sink` and write every later mutation back to it
    pub async fn open(sink: Arc<dyn SnapshotSink>) -> Result<Self, EngineError> {
        let meetings = sanitize(sink.load().await?)?;
        tracing::info!("Loaded {} meetings", meetings.len());
        Ok(Self {
            meetings: RwLock::new(meetings),
            sink: Some(sink),
        })
    }

    /// Meetings ordered by start time
    pub async fn list(&self) -> Vec<Meeting> {
        let mut meetings = self.meetings.read().await.clone();
        meetings.sort_by_key(|m| m.start_time);
        meetings
    }

    pub async fn get(&self, meeting_id: &str) -> Option<Meeting> {
        self.meetings
            .read()
            .await
            .iter()
            .find(|m| m.meeting_id == meeting_id)
            .cloned()
    }

    /// Every stored record overlapping `window`, ordered by start time
    pub async fn find_conflicts(&self, window: &TimeWindow) -> Vec<Meeting> {
        let meetings = self.meetings.read().await;
        conflicts_in(&meetings, window, None)
    }

    pub async fn insert(&self, meeting: Meeting) -> Result<(), EngineError> {
        meeting
            .validate()
            .map_err(|e| EngineError::InvalidMeeting(e.to_string()))?;

        let mut meetings = self.meetings.write().await;
        if meetings.iter().any(|m| m.meeting_id == meeting.meeting_id) {
            return Err(EngineError::DuplicateMeeting(meeting.meeting_id));
        }

        let mut next = meetings.clone();
        next.push(meeting);
        self.write_through(&next).await?;
        *meetings = next;
        Ok(())
    }

    pub async fn remove_by_id(&self, meeting_id: &str) -> Result<Meeting, EngineError> {
        let mut meetings = self.meetings.write().await;
        let index = meetings
            .iter()
            .position(|m| m.meeting_id == meeting_id)
            .ok_or_else(|| EngineError::MeetingNotFound(meeting_id.to_string()))?;

        let mut next = meetings.clone();
        let removed = next.remove(index);
        self.write_through(&next).await?;
        *meetings = next;
        Ok(removed)
    }

    /// Atomically check for conflicts, remove `replaces` (if present) and
    /// insert `meeting`, persisting once.
    ///
    /// The replaced record is excluded from the conflict check.
    pub async fn commit(
        &self,
        meeting: Meeting,
        replaces: Option<&str>,
    ) -> Result<CommitOutcome, EngineError> {
        meeting
            .validate()
            .map_err(|e| EngineError::InvalidMeeting(e.to_string()))?;

        let mut meetings = self.meetings.write().await;

        if let Some(existing) = meetings.iter().find(|m| m.meeting_id == meeting.meeting_id) {
            return Ok(CommitOutcome::AlreadyCommitted(existing.clone()));
        }

        let conflicts = conflicts_in(&meetings, &meeting.window(), replaces);
        if !conflicts.is_empty() {
            return Ok(CommitOutcome::Conflict(conflicts));
        }

        let mut next = meetings.clone();
        let replaced = match replaces {
            Some(id) => match next.iter().position(|m| m.meeting_id == id) {
                Some(index) => Some(next.remove(index)),
                None => {
                    tracing::warn!("Meeting {} to replace is already gone", id);
                    None
                }
            },
            None => None,
        };
        next.push(meeting.clone());

        self.write_through(&next).await?;
        *meetings = next;

        tracing::info!(
            meeting_id = %meeting.meeting_id,
            replaced = replaced.as_ref().map(|m| m.meeting_id.as_str()).unwrap_or("-"),
            "Committed meeting"
        );
        Ok(CommitOutcome::Committed { meeting, replaced })
    }

    /// Replace the contents with whatever the sink currently holds.
    ///
    /// Returns the number of meetings loaded. Without a sink this is a no-op.
    pub async fn reload(&self) -> Result<usize, EngineError> {
        let Some(sink) = &self.sink else {
            return Ok(self.meetings.read().await.len());
        };
        let loaded = sanitize(sink.load().await?)?;
        let count = loaded.len();
        *self.meetings.write().await = loaded;
        tracing::info!("Reloaded {} meetings", count);
        Ok(count)
    }

    async fn write_through(&self, snapshot: &[Meeting]) -> Result<(), EngineError> {
        match &self.sink {
            Some(sink) => sink.persist(snapshot).await.map_err(|e| match e {
                EngineError::Persistence(_) => e,
                other => EngineError::Persistence(other.to_string()),
            }),
            None => Ok(()),
        }
    }
}

fn conflicts_in(meetings: &[Meeting], window: &TimeWindow, exclude: Option<&str>) -> Vec<Meeting> {
    let mut conflicts: Vec<Meeting> = meetings
        .iter()
        .filter(|m| Some(m.meeting_id.as_str()) != exclude)
        .filter(|m| m.window().overlaps(window))
        .cloned()
        .collect();
    conflicts.sort_by_key(|m| m.start_time);
    conflicts
}

/// Drop malformed records from a loaded snapshot. Duplicate ids are an error:
/// there is no way to tell which copy is current.
fn sanitize(meetings: Vec<Meeting>) -> Result<Vec<Meeting>, EngineError> {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(meetings.len());
    for meeting in meetings {
        if let Err(e) = meeting.validate() {
            tracing::warn!("Skipping invalid meeting: {}", e);
            continue;
        }
        if !seen.insert(meeting.meeting_id.clone()) {
            return Err(EngineError::DuplicateMeeting(meeting.meeting_id));
        }
        kept.push(meeting);
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use sdk::types::Participant;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 20, h, m, 0).unwrap()
    }

    fn meeting(id: &str, start: (u32, u32), end: (u32, u32)) -> Meeting {
        Meeting {
            meeting_id: id.to_string(),
            title: format!("Meeting {}", id),
            description: String::new(),
            location: "TBD".to_string(),
            start_time: at(start.0, start.1),
            end_time: at(end.0, end.1),
            participants: vec![Participant::organizer("alice@example.com", "Alice")],
        }
    }

    struct FlakySink {
        fail: AtomicBool,
    }

    #[async_trait]
    impl SnapshotSink for FlakySink {
        async fn load(&self) -> Result<Vec<Meeting>, EngineError> {
            Ok(vec![meeting("seed", (9, 0), (9, 30))])
        }

        async fn persist(&self, _meetings: &[Meeting]) -> Result<(), EngineError> {
            if self.fail.load(Ordering::SeqCst) {
                Err(EngineError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_find_conflicts_half_open() {
        let store = MeetingStore::in_memory(vec![meeting("a", (10, 0), (10, 30))]).unwrap();

        let adjacent = TimeWindow::new(at(10, 30), at(11, 0)).unwrap();
        assert!(store.find_conflicts(&adjacent).await.is_empty());

        let overlapping = TimeWindow::new(at(10, 15), at(10, 45)).unwrap();
        assert_eq!(store.find_conflicts(&overlapping).await.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_and_invalid() {
        let store = MeetingStore::in_memory(vec![meeting("a", (10, 0), (10, 30))]).unwrap();

        let dup = store.insert(meeting("a", (12, 0), (12, 30))).await;
        assert!(matches!(dup, Err(EngineError::DuplicateMeeting(_))));

        let inverted = store.insert(meeting("b", (12, 0), (11, 0))).await;
        assert!(matches!(inverted, Err(EngineError::InvalidMeeting(_))));

        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_by_id() {
        let store = MeetingStore::in_memory(vec![meeting("a", (10, 0), (10, 30))]).unwrap();
        let removed = store.remove_by_id("a").await.unwrap();
        assert_eq!(removed.meeting_id, "a");
        assert!(matches!(
            store.remove_by_id("a").await,
            Err(EngineError::MeetingNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_commit_replaces_conflicting_record() {
        let store = MeetingStore::in_memory(vec![meeting("old", (10, 0), (10, 30))]).unwrap();

        let outcome = store
            .commit(meeting("new", (10, 15), (10, 45)), Some("old"))
            .await
            .unwrap();

        match outcome {
            CommitOutcome::Committed { meeting, replaced } => {
                assert_eq!(meeting.meeting_id, "new");
                assert_eq!(replaced.unwrap().meeting_id, "old");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        let ids: Vec<_> = store.list().await.into_iter().map(|m| m.meeting_id).collect();
        assert_eq!(ids, vec!["new"]);
    }

    #[tokio::test]
    async fn test_commit_rechecks_conflicts() {
        let store = MeetingStore::in_memory(vec![meeting("a", (10, 0), (10, 30))]).unwrap();
        let outcome = store
            .commit(meeting("b", (10, 0), (11, 0)), None)
            .await
            .unwrap();
        assert!(matches!(outcome, CommitOutcome::Conflict(ref c) if c.len() == 1));
        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_commit_is_idempotent_per_id() {
        let store = MeetingStore::in_memory(vec![]).unwrap();
        let m = meeting("x", (10, 0), (10, 30));
        store.commit(m.clone(), None).await.unwrap();
        let second = store.commit(m, None).await.unwrap();
        assert!(matches!(second, CommitOutcome::AlreadyCommitted(_)));
        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_store_untouched() {
        let sink = Arc::new(FlakySink {
            fail: AtomicBool::new(true),
        });
        let store = MeetingStore::open(sink.clone()).await.unwrap();
        let before = store.list().await;

        let err = store
            .commit(meeting("new", (11, 0), (11, 30)), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Persistence(_)));
        assert_eq!(store.list().await, before);

        assert!(store.remove_by_id("seed").await.is_err());
        assert_eq!(store.list().await, before);

        sink.fail.store(false, Ordering::SeqCst);
        store.insert(meeting("new", (11, 0), (11, 30))).await.unwrap();
        assert_eq!(store.list().await.len(), 2);
    }

    #[tokio::test]
    async fn test_open_rejects_duplicate_ids() {
        let result = MeetingStore::in_memory(vec![
            meeting("a", (10, 0), (10, 30)),
            meeting("a", (11, 0), (11, 30)),
        ]);
        assert!(matches!(result, Err(EngineError::DuplicateMeeting(_))));
    }

    #[tokio::test]
    async fn test_list_sorted_by_start() {
        let store = MeetingStore::in_memory(vec![
            meeting("late", (15, 0), (15, 30)),
            meeting("early", (8, 0), (8, 30)),
        ])
        .unwrap();
        let ids: Vec<_> = store.list().await.into_iter().map(|m| m.meeting_id).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }
}
