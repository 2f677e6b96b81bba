/// Conversation context module
///
/// Persists the transcript of each (user, conversation) pair for 30 minutes
/// and keeps a per-user, most-recent-first index of up to 10 active
/// conversations that lives for 7 days after the last save.

#[cfg(test)]
mod tests;

use crate::cache::{CacheManager, CacheOptions, ACTIVE_CONVERSATIONS_NAMESPACE, CONTEXT_NAMESPACE};
use crate::error::{StoreError, StoreResult};
use crate::types::ConversationContext;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Lifetime of a saved context
pub const CONTEXT_TTL_SECS: i64 = 30 * 60;
/// Lifetime of a user's active conversation index after its last update
pub const ACTIVE_CONVERSATIONS_TTL_SECS: i64 = 7 * 24 * 60 * 60;
/// Maximum conversations kept in a user's active index
pub const MAX_ACTIVE_CONVERSATIONS: usize = 10;

/// Conversation context store built on the shared cache
pub struct ConversationContextStore {
    cache: Arc<CacheManager>,
}

impl ConversationContextStore {
    pub fn new(cache: Arc<CacheManager>) -> Self {
        Self { cache }
    }

    /// Overwrite the stored context and push the conversation to the front
    /// of the user's active index, keeping the 10 most recent entries.
    ///
    /// Never fails: problems are logged and reported as `false`.
    pub async fn save_context(&self, context: &ConversationContext) -> bool {
        match self.try_save_context(context).await {
            Ok(()) => {
                debug!(
                    user_id = %context.user_id,
                    conversation_id = %context.conversation_id,
                    messages = context.messages.len(),
                    "Saved conversation context"
                );
                true
            }
            Err(e) => {
                error!(
                    user_id = %context.user_id,
                    conversation_id = %context.conversation_id,
                    "Failed to save conversation context: {}", e
                );
                false
            }
        }
    }

    async fn try_save_context(&self, context: &ConversationContext) -> StoreResult<()> {
        let key = context_key(&context.user_id, &context.conversation_id)?;

        self.cache
            .set(
                &key,
                context,
                CacheOptions::default()
                    .namespace(CONTEXT_NAMESPACE)
                    .ttl(CONTEXT_TTL_SECS),
            )
            .await?;

        let index = Some(ACTIVE_CONVERSATIONS_NAMESPACE);
        let conversation_id = context.conversation_id.as_str();

        self.cache
            .push_front_capped(&context.user_id, conversation_id, MAX_ACTIVE_CONVERSATIONS, index)
            .await?;
        self.cache
            .update_ttl(&context.user_id, ACTIVE_CONVERSATIONS_TTL_SECS, index)
            .await?;

        Ok(())
    }

    /// Load a context.
    ///
    /// Store outages degrade to `Ok(None)` so callers carry on without
    /// history; a stored value that no longer decodes is an error.
    pub async fn get_context(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> StoreResult<Option<ConversationContext>> {
        let key = context_key(user_id, conversation_id)?;

        match self.cache.get(&key, Some(CONTEXT_NAMESPACE)).await {
            Ok(context) => Ok(context),
            Err(e) if e.is_retryable() => {
                warn!(user_id, conversation_id, "Context unavailable, continuing without it: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete the context and drop the conversation from the user's active index
    pub async fn remove_context(&self, user_id: &str, conversation_id: &str) -> StoreResult<()> {
        let key = context_key(user_id, conversation_id)?;

        self.cache.delete(&key, Some(CONTEXT_NAMESPACE)).await?;
        let removed = self.cache
            .remove_from_list(user_id, conversation_id, Some(ACTIVE_CONVERSATIONS_NAMESPACE))
            .await?;

        info!(user_id, conversation_id, removed, "Removed conversation context");
        Ok(())
    }

    /// Conversation ids for `user_id`, most recent first
    pub async fn get_active_conversations(&self, user_id: &str) -> StoreResult<Vec<String>> {
        self.cache
            .get_list(
                user_id,
                0,
                MAX_ACTIVE_CONVERSATIONS as i64 - 1,
                Some(ACTIVE_CONVERSATIONS_NAMESPACE),
            )
            .await
    }
}

/// Logical key `<userId>:<conversationId>` inside the context namespace
fn context_key(user_id: &str, conversation_id: &str) -> StoreResult<String> {
    if user_id.is_empty() || conversation_id.is_empty() {
        return Err(StoreError::InvalidArgument(
            "user_id and conversation_id must not be empty".to_string(),
        ));
    }
    Ok(format!("{}:{}", user_id, conversation_id))
}
