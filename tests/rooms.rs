use std::collections::HashSet;
use std::time::Duration;

use emberroom::{registry::RoomConfig, EngineError};
use time::OffsetDateTime;
use tokio::time::timeout;
use uuid::Uuid;

mod common;

#[tokio::test]
async fn create_maps_every_duration_token() {
    let engine = common::engine().await;
    let cases = [
        ("1h", 3_600),
        ("4h", 14_400),
        ("24h", 86_400),
        ("7d", 604_800),
        ("30d", 2_592_000),
        ("1y", 31_536_000),
        // unrecognized tokens fall back to one hour
        ("5m", 3_600),
    ];
    for (token, secs) in cases {
        let config = RoomConfig {
            duration: token.to_owned(),
            ..common::room_config(&format!("room-{token}"))
        };
        let room = engine.registry.create(config).await.expect("create should succeed");
        assert_eq!(room.expires_at - room.created_at, secs, "token {token}");
    }
}

#[tokio::test]
async fn create_rejects_bad_names() {
    let engine = common::engine().await;

    let empty = engine.registry.create(common::room_config("   ")).await;
    assert!(matches!(empty, Err(EngineError::Validation(_))));

    let overlong = engine.registry.create(common::room_config(&"x".repeat(51))).await;
    assert!(matches!(overlong, Err(EngineError::Validation(_))));

    // 50 chars is still fine
    engine
        .registry
        .create(common::room_config(&"x".repeat(50)))
        .await
        .expect("50-char name should be accepted");
}

#[tokio::test]
async fn resolve_distinguishes_expired_from_not_found() {
    let engine = common::engine().await;
    let room = engine
        .registry
        .create(common::room_config("doomed"))
        .await
        .expect("create should succeed");

    // case-insensitive while alive
    let found = engine
        .registry
        .resolve_by_code(&room.code.to_lowercase())
        .await
        .expect("lowercase code should resolve");
    assert_eq!(found.id, room.id);

    assert!(matches!(
        engine.registry.resolve_by_code("NOSUCH").await,
        Err(EngineError::NotFound)
    ));

    // push the room past its expiry without sweeping it away
    let past = OffsetDateTime::now_utc().unix_timestamp() - 1;
    sqlx::query("UPDATE rooms SET expires_at = ? WHERE id = ?")
        .bind(past)
        .bind(room.id)
        .execute(&engine.pool)
        .await
        .expect("backdating should succeed");

    assert!(matches!(
        engine.registry.resolve_by_code(&room.code).await,
        Err(EngineError::Expired)
    ));
    assert!(matches!(
        engine.registry.resolve_by_id(room.id).await,
        Err(EngineError::Expired)
    ));
}

#[tokio::test]
async fn concurrent_creates_never_share_a_live_code() {
    let engine = common::engine().await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let registry = engine.registry.clone();
        handles.push(tokio::spawn(async move {
            registry
                .create(common::room_config(&format!("race-{i}")))
                .await
                .expect("create should succeed")
                .code
        }));
    }

    let mut codes = HashSet::new();
    for handle in handles {
        let code = handle.await.expect("task should finish");
        assert!(codes.insert(code), "two live rooms drew the same code");
    }
}

#[tokio::test]
async fn join_is_idempotent() {
    let engine = common::engine().await;
    let room = engine.registry.create(common::room_config("idem")).await.unwrap();

    engine.presence.join(room.id, "alice").await.unwrap();
    engine.presence.join(room.id, "alice").await.unwrap();

    assert_eq!(engine.presence.active_users(room.id).await.unwrap(), vec!["alice"]);
}

#[tokio::test]
async fn concurrent_joins_lose_no_one() {
    let engine = common::engine().await;
    let room = engine.registry.create(common::room_config("crowded")).await.unwrap();

    let mut handles = Vec::new();
    for user in ["alice", "bob", "carol", "dave", "erin"] {
        let presence = engine.presence.clone();
        let room_id = room.id;
        handles.push(tokio::spawn(async move {
            presence.join(room_id, user).await.expect("join should succeed");
        }));
    }
    for handle in handles {
        handle.await.expect("task should finish");
    }

    let users = engine.presence.active_users(room.id).await.unwrap();
    assert_eq!(users, vec!["alice", "bob", "carol", "dave", "erin"]);
}

#[tokio::test]
async fn explicit_leave_is_immediate() {
    let engine = common::engine().await;
    let room = engine.registry.create(common::room_config("revolving")).await.unwrap();

    engine.presence.join(room.id, "alice").await.unwrap();
    engine.presence.join(room.id, "bob").await.unwrap();
    engine.presence.leave(room.id, "alice").await.unwrap();

    assert_eq!(engine.presence.active_users(room.id).await.unwrap(), vec!["bob"]);
}

#[tokio::test]
async fn ephemeral_visibility_is_per_viewer() {
    let engine = common::engine().await;
    let room = engine.registry.create(common::ephemeral_config("vanish")).await.unwrap();

    let message = engine.stream.append(room.id, "alice", "now you see me").await.unwrap();
    assert!(message.ephemeral, "room setting should be copied onto the message");

    // unread: everyone sees it
    for viewer in ["alice", "bob", "carol"] {
        let visible = engine.stream.visible_messages(room.id, viewer).await.unwrap();
        assert_eq!(visible.len(), 1, "{viewer} should see the unread message");
    }

    engine.receipts.mark_read(message.id, "bob").await.unwrap();

    // gone for bob, still there for the author and for carol
    assert!(engine.stream.visible_messages(room.id, "bob").await.unwrap().is_empty());
    assert_eq!(engine.stream.visible_messages(room.id, "alice").await.unwrap().len(), 1);
    assert_eq!(engine.stream.visible_messages(room.id, "carol").await.unwrap().len(), 1);

    // mark-read is idempotent and read_by only grows
    engine.receipts.mark_read(message.id, "bob").await.unwrap();
    assert_eq!(engine.receipts.read_by(message.id).await.unwrap(), vec!["bob"]);
    engine.receipts.mark_read(message.id, "carol").await.unwrap();
    assert_eq!(engine.receipts.read_by(message.id).await.unwrap(), vec!["bob", "carol"]);
}

#[tokio::test]
async fn non_ephemeral_messages_ignore_read_receipts() {
    let engine = common::engine().await;
    let room = engine.registry.create(common::room_config("plain")).await.unwrap();

    let message = engine.stream.append(room.id, "alice", "sticky").await.unwrap();
    engine.receipts.mark_read(message.id, "bob").await.unwrap();

    assert_eq!(engine.stream.visible_messages(room.id, "bob").await.unwrap().len(), 1);
}

#[tokio::test]
async fn messages_keep_send_order() {
    let engine = common::engine().await;
    let room = engine.registry.create(common::room_config("ordered")).await.unwrap();

    for i in 0..5 {
        engine.stream.append(room.id, "alice", &format!("msg-{i}")).await.unwrap();
    }

    let visible = engine.stream.visible_messages(room.id, "bob").await.unwrap();
    let contents: Vec<_> = visible.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["msg-0", "msg-1", "msg-2", "msg-3", "msg-4"]);

    let latest = engine.stream.latest(room.id).await.unwrap().expect("room has messages");
    assert_eq!(latest.content, "msg-4");
}

#[tokio::test]
async fn append_refuses_dead_rooms() {
    let engine = common::engine().await;

    assert!(matches!(
        engine.stream.append(Uuid::now_v7(), "alice", "hello?").await,
        Err(EngineError::NotFound)
    ));

    let room = engine.registry.create(common::room_config("dead")).await.unwrap();
    let past = OffsetDateTime::now_utc().unix_timestamp() - 1;
    sqlx::query("UPDATE rooms SET expires_at = ? WHERE id = ?")
        .bind(past)
        .bind(room.id)
        .execute(&engine.pool)
        .await
        .unwrap();

    assert!(matches!(
        engine.stream.append(room.id, "alice", "too late").await,
        Err(EngineError::Expired)
    ));
}

#[tokio::test]
async fn public_listing_skips_private_and_expired_rooms() {
    let engine = common::engine().await;

    let public = engine.registry.create(common::room_config("public")).await.unwrap();
    engine
        .registry
        .create(RoomConfig { is_private: true, ..common::room_config("hidden") })
        .await
        .unwrap();
    let expired = engine.registry.create(common::room_config("expired")).await.unwrap();

    let past = OffsetDateTime::now_utc().unix_timestamp() - 1;
    sqlx::query("UPDATE rooms SET expires_at = ? WHERE id = ?")
        .bind(past)
        .bind(expired.id)
        .execute(&engine.pool)
        .await
        .unwrap();

    let listed = engine.registry.list_public().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, public.id);
}

#[tokio::test]
async fn subscription_pushes_fresh_filtered_snapshots() {
    let engine = common::engine().await;
    let room = engine.registry.create(common::ephemeral_config("live")).await.unwrap();

    let mut sub = engine.stream.subscribe(room.id, "bob");
    assert!(sub.current().await.unwrap().is_empty());

    let message = engine.stream.append(room.id, "alice", "ping").await.unwrap();
    let snapshot = timeout(Duration::from_secs(1), sub.next_snapshot())
        .await
        .expect("append should wake the subscription")
        .unwrap()
        .expect("channel should still be open");
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, message.id);

    // a read receipt also wakes the subscription, with the message now hidden
    engine.receipts.mark_read(message.id, "bob").await.unwrap();
    let snapshot = timeout(Duration::from_secs(1), sub.next_snapshot())
        .await
        .expect("mark-read should wake the subscription")
        .unwrap()
        .expect("channel should still be open");
    assert!(snapshot.is_empty());
}
