//! Chat message shapes. Batches are persisted verbatim (role, text, tool
//! invocations, tool results) so a session can be reconstructed for replay.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A tool invocation emitted by the model during a chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub call_id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Result fed back to the model for a handled tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolInvocation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: MessageRole::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
        }
    }

    /// Synthetic human-authored verdict on a proposal, appended to the
    /// transcript so the model sees the call as settled on the next turn.
    pub fn verdict(call_id: &str, content: impl Into<String>, verdict: &str) -> Self {
        ChatMessage {
            role: MessageRole::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_results: vec![ToolResult {
                call_id: call_id.to_string(),
                content: verdict.to_string(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_round_trips_with_tool_calls() {
        let msg = ChatMessage {
            role: MessageRole::Assistant,
            content: "Here is a suggestion.".into(),
            tool_calls: vec![ToolInvocation {
                call_id: "toolu_01".into(),
                name: "update_experience".into(),
                arguments: serde_json::json!({"experience_id": "abc", "skills": ["Rust"]}),
            }],
            tool_results: vec![],
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_empty_tool_fields_are_omitted() {
        let json = serde_json::to_string(&ChatMessage::user("hi")).unwrap();
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_results"));
    }
}
