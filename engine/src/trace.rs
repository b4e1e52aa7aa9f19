//! Execution traces
//!
//! Both agents record what they did per utterance as an ordered list of
//! `{phase, action, result}` entries. Traces are for debugging and
//! explainability only; nothing branches on them.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    pub phase: String,
    pub action: String,
    pub result: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExecutionTrace {
    entries: Vec<TraceEntry>,
}

impl ExecutionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        phase: impl Into<String>,
        action: impl Into<String>,
        result: impl Into<String>,
    ) {
        let entry = TraceEntry {
            phase: phase.into(),
            action: action.into(),
            result: result.into(),
        };
        tracing::debug!(phase = %entry.phase, action = %entry.action, "{}", entry.result);
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn phases(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.phase.as_str()).collect()
    }

    /// Number of entries recorded for `phase`
    pub fn count(&self, phase: &str) -> usize {
        self.entries.iter().filter(|e| e.phase == phase).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_keep_order() {
        let mut trace = ExecutionTrace::new();
        trace.record("plan", "heuristic", "both");
        trace.record("execute", "corpus", "2 fragments");
        trace.record("execute", "web", "unavailable");

        assert_eq!(trace.phases(), vec!["plan", "execute", "execute"]);
        assert_eq!(trace.count("execute"), 2);
        assert_eq!(trace.entries()[2].result, "unavailable");
    }

    #[test]
    fn test_serializes_as_list() {
        let mut trace = ExecutionTrace::new();
        trace.record("reflect", "assess", "sufficient");
        let json = serde_json::to_value(&trace).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["phase"], "reflect");
    }
}
