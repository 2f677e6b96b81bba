use super::*;
use crate::cache::KeyNamespacer;
use crate::store::testing::FailingBackend;
use crate::store::{CacheBackend, MemoryBackend};
use crate::types::Role;
use std::time::Duration;

fn create_test_store() -> (Arc<MemoryBackend>, ConversationContextStore) {
    let backend = Arc::new(MemoryBackend::new());
    let cache = Arc::new(CacheManager::new(backend.clone(), KeyNamespacer::new("bot:"), 3600));
    (backend, ConversationContextStore::new(cache))
}

fn create_test_context(user_id: &str, conversation_id: &str) -> ConversationContext {
    let mut context = ConversationContext::new(user_id, conversation_id);
    context.push_message(Role::System, "You are a helpful assistant", 20);
    context.push_message(Role::User, "What is our VPN policy?", 20);
    context.push_message(Role::Assistant, "See the security handbook, section 4.", 20);
    context.metadata.topic_id = Some("kb-security".to_string());
    context.metadata.active_commands = vec!["ask".to_string()];
    context
}

#[tokio::test]
async fn test_save_and_get_context() {
    let (_, store) = create_test_store();
    let context = create_test_context("U1", "C1");

    assert!(store.save_context(&context).await);

    let loaded = store.get_context("U1", "C1").await.unwrap().unwrap();
    assert_eq!(loaded, context);
    assert_eq!(store.get_active_conversations("U1").await.unwrap(), vec!["C1"]);
}

#[tokio::test]
async fn test_key_layout_and_ttls() {
    let (backend, store) = create_test_store();
    assert!(store.save_context(&create_test_context("U1", "C1")).await);

    let context_ttl = backend.ttl("bot:context:U1:C1").await.unwrap();
    assert!(context_ttl > 0 && context_ttl <= CONTEXT_TTL_SECS);

    let index_ttl = backend.ttl("bot:activeConvs:U1").await.unwrap();
    assert!(index_ttl > CONTEXT_TTL_SECS && index_ttl <= ACTIVE_CONVERSATIONS_TTL_SECS);
}

#[tokio::test]
async fn test_save_overwrites_whole_context() {
    let (_, store) = create_test_store();
    let mut context = create_test_context("U1", "C1");
    assert!(store.save_context(&context).await);

    context.messages.truncate(1);
    context.metadata.active_commands.clear();
    assert!(store.save_context(&context).await);

    let loaded = store.get_context("U1", "C1").await.unwrap().unwrap();
    assert_eq!(loaded.messages.len(), 1);
    assert!(loaded.metadata.active_commands.is_empty());
}

#[tokio::test]
async fn test_active_conversations_capped_most_recent_first() {
    let (_, store) = create_test_store();

    for i in 0..11 {
        assert!(store.save_context(&create_test_context("U1", &format!("C{}", i))).await);
    }

    let active = store.get_active_conversations("U1").await.unwrap();
    let expected: Vec<String> = (1..11).rev().map(|i| format!("C{}", i)).collect();
    assert_eq!(active, expected);
    assert_eq!(active.len(), MAX_ACTIVE_CONVERSATIONS);
}

#[tokio::test]
async fn test_resave_pushes_conversation_again() {
    let (_, store) = create_test_store();

    for id in ["C1", "C2", "C1"] {
        assert!(store.save_context(&create_test_context("U1", id)).await);
    }
    assert_eq!(store.get_active_conversations("U1").await.unwrap(), vec!["C1", "C2", "C1"]);

    // removal drops every occurrence
    store.remove_context("U1", "C1").await.unwrap();
    assert_eq!(store.get_active_conversations("U1").await.unwrap(), vec!["C2"]);
}

#[tokio::test]
async fn test_remove_context() {
    let (_, store) = create_test_store();

    assert!(store.save_context(&create_test_context("U1", "C1")).await);
    assert!(store.save_context(&create_test_context("U1", "C2")).await);

    store.remove_context("U1", "C1").await.unwrap();

    assert!(store.get_context("U1", "C1").await.unwrap().is_none());
    assert_eq!(store.get_active_conversations("U1").await.unwrap(), vec!["C2"]);

    // removing again is harmless
    store.remove_context("U1", "C1").await.unwrap();
}

#[tokio::test]
async fn test_users_are_isolated() {
    let (_, store) = create_test_store();

    assert!(store.save_context(&create_test_context("U1", "C1")).await);
    assert!(store.save_context(&create_test_context("U2", "C9")).await);

    assert_eq!(store.get_active_conversations("U1").await.unwrap(), vec!["C1"]);
    assert_eq!(store.get_active_conversations("U2").await.unwrap(), vec!["C9"]);
    assert!(store.get_context("U2", "C1").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_context_expires_but_index_survives() {
    let (_, store) = create_test_store();
    assert!(store.save_context(&create_test_context("U1", "C1")).await);

    tokio::time::advance(Duration::from_secs(CONTEXT_TTL_SECS as u64 + 1)).await;

    assert!(store.get_context("U1", "C1").await.unwrap().is_none());
    assert_eq!(store.get_active_conversations("U1").await.unwrap(), vec!["C1"]);

    tokio::time::advance(Duration::from_secs(ACTIVE_CONVERSATIONS_TTL_SECS as u64)).await;
    assert!(store.get_active_conversations("U1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_store_outage_degrades() {
    let cache = Arc::new(CacheManager::new(Arc::new(FailingBackend), KeyNamespacer::new("bot:"), 3600));
    let store = ConversationContextStore::new(cache);

    assert!(!store.save_context(&create_test_context("U1", "C1")).await);
    assert!(store.get_context("U1", "C1").await.unwrap().is_none());

    // everything else surfaces the failure
    assert!(store.remove_context("U1", "C1").await.is_err());
    assert!(store.get_active_conversations("U1").await.is_err());
}

#[tokio::test]
async fn test_corrupt_context_is_an_error() {
    let (backend, store) = create_test_store();
    backend
        .set("bot:context:U1:C1", "{\"userId\":".to_string(), None)
        .await
        .unwrap();

    let err = store.get_context("U1", "C1").await.unwrap_err();
    assert!(matches!(err, StoreError::Serialization(_)));
}

#[tokio::test]
async fn test_empty_identifiers_rejected() {
    let (_, store) = create_test_store();

    assert!(!store.save_context(&create_test_context("", "C1")).await);
    assert!(matches!(
        store.get_context("U1", "").await,
        Err(StoreError::InvalidArgument(_))
    ));
}
