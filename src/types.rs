use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Single conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced the turn
    pub role: Role,
    /// Text content
    pub content: String,
    /// When the turn was recorded
    pub timestamp: DateTime<Utc>,
}

/// Session metadata kept alongside the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextMetadata {
    /// Knowledge-base topic the conversation is bound to
    pub topic_id: Option<String>,
    pub last_interaction: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub message_count: u32,
    /// Chat commands currently in effect for the conversation
    #[serde(default)]
    pub active_commands: Vec<String>,
}

/// Recent history and session state for one (user, conversation) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    pub user_id: String,
    pub conversation_id: String,
    pub messages: Vec<Message>,
    pub metadata: ContextMetadata,
}

impl ConversationContext {
    /// Create an empty context started now
    pub fn new(user_id: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        let now = Utc::now();
        ConversationContext {
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
            messages: Vec::new(),
            metadata: ContextMetadata {
                topic_id: None,
                last_interaction: now,
                start_time: now,
                last_updated: now,
                message_count: 0,
                active_commands: Vec::new(),
            },
        }
    }

    /// Append a turn, keep only the most recent `max_messages`, refresh metadata.
    ///
    /// The store persists whatever transcript it is handed, so callers use this
    /// before `save_context` to keep the transcript bounded.
    pub fn push_message(&mut self, role: Role, content: impl Into<String>, max_messages: usize) {
        let now = Utc::now();
        self.messages.push(Message {
            role,
            content: content.into(),
            timestamp: now,
        });

        if self.messages.len() > max_messages {
            let excess = self.messages.len() - max_messages;
            self.messages.drain(..excess);
        }

        self.metadata.message_count = self.metadata.message_count.saturating_add(1);
        self.metadata.last_updated = now;
        self.metadata.last_interaction = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_message_trims_oldest() {
        let mut context = ConversationContext::new("U1", "C1");
        for i in 0..5 {
            context.push_message(Role::User, format!("turn {}", i), 3);
        }

        assert_eq!(context.messages.len(), 3);
        assert_eq!(context.messages[0].content, "turn 2");
        assert_eq!(context.messages[2].content, "turn 4");
        // count tracks every turn, not just retained ones
        assert_eq!(context.metadata.message_count, 5);
        assert!(context.metadata.last_updated >= context.metadata.start_time);
    }

    #[test]
    fn test_wire_format() {
        let mut context = ConversationContext::new("U1", "C1");
        context.push_message(Role::Assistant, "hi", 10);

        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["userId"], "U1");
        assert_eq!(json["conversationId"], "C1");
        assert_eq!(json["messages"][0]["role"], "assistant");
        assert_eq!(json["metadata"]["messageCount"], 1);
        assert!(json["metadata"]["activeCommands"].is_array());
    }
}
