use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::providers::Usage;

/// Per-agent counters persisted with the thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentStats {
    /// Cumulative token usage; never reset.
    pub usage: Usage,
    /// Last tool execution id handed out.
    pub next_tool_id: u64,
    /// Wall-clock time of the most recent provider call.
    pub last_request_time: Option<DateTime<Utc>>,
}

impl AgentStats {
    pub fn add_usage(&mut self, usage: &Usage) {
        self.usage.prompt_tokens += usage.prompt_tokens;
        self.usage.completion_tokens += usage.completion_tokens;
        self.usage.total_tokens = self.usage.prompt_tokens + self.usage.completion_tokens;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_accumulates() {
        let mut stats = AgentStats::default();
        stats.add_usage(&Usage::new(10, 2));
        stats.add_usage(&Usage::new(5, 3));
        assert_eq!(stats.usage, Usage::new(15, 5));
        assert_eq!(stats.usage.total_tokens, 20);
    }

    #[test]
    fn test_missing_fields_default() {
        let stats: AgentStats = serde_json::from_str(r#"{"next_tool_id": 7}"#).unwrap();
        assert_eq!(stats.next_tool_id, 7);
        assert_eq!(stats.usage, Usage::default());
        assert!(stats.last_request_time.is_none());
    }
}
