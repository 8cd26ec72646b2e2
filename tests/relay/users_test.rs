//! Tests for `src/relay/users.rs`: first contact, bans by topic, user cards.

use backchannel::model::{LogField, VALUE_FALSE, VALUE_TRUE};
use backchannel::relay::Inbound;
use backchannel::store::{Order, StoreError};

use crate::support::{harness, profile, Call, Harness};

async fn topic_for(h: &Harness, user_id: i64) -> i32 {
    let inbound = h
        .relay
        .receive(&profile(user_id, "Edsger", Some("ewd")), 1)
        .await
        .expect("receive");
    let Inbound::Forwarded { topic, .. } = inbound else {
        panic!("expected a forwarded message");
    };
    h.transport.clear();
    topic.id
}

#[tokio::test]
async fn get_or_create_is_stable() {
    let h = harness().await;
    let first = h.relay.users.get_or_create(9).await.expect("create");
    let again = h.relay.users.get_or_create(9).await.expect("get");
    assert_eq!(first, again);
    assert!(!first.is_banned);
}

#[tokio::test]
async fn ban_sets_flag_and_logs_first_ban_status_silently() {
    let h = harness().await;
    let topic = topic_for(&h, 9).await;

    let user = h
        .relay
        .users
        .set_ban_by_topic(topic, true)
        .await
        .expect("ban")
        .expect("tracked topic");

    assert!(user.is_banned);
    assert_eq!(user.version, 1);
    let rows = h
        .repos
        .user_logs
        .filter(9, Some(LogField::IsBanned), Order::Asc)
        .await
        .expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value, VALUE_TRUE);
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn unban_after_ban_is_announced() {
    let h = harness().await;
    let topic = topic_for(&h, 9).await;
    h.relay.users.set_ban_by_topic(topic, true).await.expect("ban");

    let user = h
        .relay
        .users
        .set_ban_by_topic(topic, false)
        .await
        .expect("unban")
        .expect("tracked topic");

    assert!(!user.is_banned);
    let posts = h.transport.staff_posts(topic);
    assert_eq!(posts.len(), 1);
    assert!(posts[0].contains(&format!("<code>{VALUE_TRUE}</code> -> <code>{VALUE_FALSE}</code>")));
}

#[tokio::test]
async fn ban_in_untracked_topic_is_ignored() {
    let h = harness().await;
    let result = h.relay.users.set_ban_by_topic(999, true).await.expect("ban");
    assert!(result.is_none());
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn stale_version_is_a_conflict() {
    let h = harness().await;
    let topic = topic_for(&h, 9).await;
    let stale = h.repos.users.get(9).await.expect("get").expect("row");

    h.relay.users.set_ban_by_topic(topic, true).await.expect("ban");

    let mut late = stale;
    late.is_banned = false;
    let err = h.repos.users.update(&late).await.expect_err("stale write");
    assert!(matches!(err, StoreError::Conflict { entity: "users", key: 9 }));

    let current = h.repos.users.get(9).await.expect("get").expect("row");
    assert!(current.is_banned, "the first writer wins");
}

#[tokio::test]
async fn user_card_is_posted_into_the_topic() {
    let h = harness().await;
    let topic = topic_for(&h, 9).await;

    let posted = h.relay.users.send_user_info(topic).await.expect("card");
    assert!(posted.is_some());

    let calls = h.transport.calls();
    assert!(matches!(
        calls.as_slice(),
        [Call::SendHtml { html, .. }] if html.contains("User <code>9</code>")
    ));
    assert!(h.relay.users.send_user_info(999).await.expect("untracked").is_none());
}
