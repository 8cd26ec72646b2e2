//! Tests for `src/relay/deletion.rs`: single and bulk deletion, idempotency.

use backchannel::model::{Message, Topic};
use backchannel::relay::deletion::HistoryReport;
use backchannel::relay::messages::{ReplyOutcome, StaffMessage};
use backchannel::relay::Inbound;
use backchannel::store::MirrorFilter;
use backchannel::transport::Content;

use crate::support::{harness, profile, Call, Fail, Harness};

const USER: i64 = 77;

async fn relay_message(h: &Harness, message_id: i32) -> (Topic, Message) {
    let inbound = h
        .relay
        .receive(&profile(USER, "Alan Turing", Some("alan")), message_id)
        .await
        .expect("receive");
    let Inbound::Forwarded { topic, message, .. } = inbound else {
        panic!("expected a forwarded message");
    };
    (topic, message)
}

async fn relay_reply(h: &Harness, topic: &Topic, staff_id: i32) -> i32 {
    let outcome = h
        .relay
        .messages
        .reply(&StaffMessage {
            id: staff_id,
            thread_id: Some(topic.id),
            content: Content::Text("noted".to_owned()),
        })
        .await
        .expect("reply");
    let ReplyOutcome::Delivered(reply) = outcome else {
        panic!("expected delivery");
    };
    reply.bot_message_id
}

#[tokio::test]
async fn staff_delete_of_forward_removes_user_original_only() {
    let h = harness().await;
    let (_, message) = relay_message(&h, 10).await;
    h.transport.clear();

    let found = h
        .relay
        .deleter
        .delete_by_staff_forward(message.bot_message_id)
        .await
        .expect("delete");

    assert!(found);
    assert_eq!(
        h.transport.calls(),
        vec![Call::Delete {
            chat_id: USER,
            message_id: 10,
        }]
    );
    let left = h
        .repos
        .messages
        .filter(MirrorFilter::by_bot_message(message.bot_message_id))
        .await
        .expect("filter");
    assert!(left.is_empty());
}

#[tokio::test]
async fn same_message_id_from_two_users_deletes_only_the_matching_pair() {
    let h = harness().await;
    let (first_topic, first) = relay_message(&h, 3).await;
    let inbound = h
        .relay
        .receive(&profile(USER + 1, "Grace Hopper", Some("grace")), 3)
        .await
        .expect("second user shares the message id");
    let Inbound::Forwarded {
        topic: second_topic,
        message: second,
        ..
    } = inbound
    else {
        panic!("expected a forwarded message");
    };
    assert_ne!(first_topic.id, second_topic.id);
    assert_ne!(first.bot_message_id, second.bot_message_id);
    h.transport.clear();

    assert!(h
        .relay
        .deleter
        .delete_by_staff_forward(second.bot_message_id)
        .await
        .expect("delete"));
    assert_eq!(
        h.transport.calls(),
        vec![Call::Delete {
            chat_id: USER + 1,
            message_id: 3,
        }]
    );
    assert!(h
        .repos
        .messages
        .get(second_topic.id, 3)
        .await
        .expect("get")
        .is_none());
    assert_eq!(
        h.repos.messages.get(first_topic.id, 3).await.expect("get"),
        Some(first)
    );
}

#[tokio::test]
async fn deleting_twice_is_a_no_op() {
    let h = harness().await;
    let (topic, message) = relay_message(&h, 10).await;
    let staff_id = 900;
    relay_reply(&h, &topic, staff_id).await;

    assert!(h
        .relay
        .deleter
        .delete_by_staff_forward(message.bot_message_id)
        .await
        .expect("first"));
    assert!(h.relay.deleter.delete_reply(staff_id).await.expect("first"));
    h.transport.clear();

    assert!(!h
        .relay
        .deleter
        .delete_by_staff_forward(message.bot_message_id)
        .await
        .expect("second"));
    assert!(!h.relay.deleter.delete_reply(staff_id).await.expect("second"));
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn reply_delete_removes_delivered_copy() {
    let h = harness().await;
    let (topic, _) = relay_message(&h, 10).await;
    let copy_id = relay_reply(&h, &topic, 901).await;
    h.transport.clear();

    assert!(h.relay.deleter.delete_reply(901).await.expect("delete"));
    assert_eq!(
        h.transport.calls(),
        vec![Call::Delete {
            chat_id: USER,
            message_id: copy_id,
        }]
    );
    assert!(h.repos.replies.get(901).await.expect("get").is_none());
}

#[tokio::test]
async fn remote_failure_keeps_the_row() {
    let h = harness().await;
    let (_, message) = relay_message(&h, 10).await;
    h.transport.fail("delete_message", Fail::Other);

    let result = h
        .relay
        .deleter
        .delete_by_staff_forward(message.bot_message_id)
        .await;
    assert!(result.is_err());
    assert!(h
        .repos
        .messages
        .get(message.topic_id, 10)
        .await
        .expect("get")
        .is_some());
}

#[tokio::test]
async fn history_deletion_removes_every_pair_once() {
    let h = harness().await;
    let (topic, _) = relay_message(&h, 10).await;
    relay_message(&h, 11).await;
    relay_reply(&h, &topic, 902).await;
    relay_reply(&h, &topic, 903).await;
    relay_reply(&h, &topic, 904).await;
    h.transport.clear();

    let report = h.relay.deleter.delete_history(topic.id).await.expect("history");
    assert_eq!(
        report,
        HistoryReport {
            messages: 2,
            replies: 3,
        }
    );
    assert_eq!(h.transport.count(|c| matches!(c, Call::Delete { chat_id, .. } if *chat_id == USER)), 5);
    assert!(h
        .repos
        .messages
        .filter(MirrorFilter::by_topic(topic.id))
        .await
        .expect("messages")
        .is_empty());
    assert!(h
        .repos
        .replies
        .filter(MirrorFilter::by_topic(topic.id))
        .await
        .expect("replies")
        .is_empty());

    h.transport.clear();
    let again = h.relay.deleter.delete_history(topic.id).await.expect("again");
    assert_eq!(again, HistoryReport::default());
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn copies_already_gone_remotely_still_clear_history() {
    let h = harness().await;
    let (topic, _) = relay_message(&h, 10).await;
    relay_message(&h, 11).await;
    relay_reply(&h, &topic, 905).await;
    h.transport.fail("delete_message", Fail::Gone);

    let report = h.relay.deleter.delete_history(topic.id).await.expect("history");
    assert_eq!(
        report,
        HistoryReport {
            messages: 2,
            replies: 1,
        }
    );
    assert!(h
        .repos
        .messages
        .filter(MirrorFilter::by_topic(topic.id))
        .await
        .expect("messages")
        .is_empty());
    assert!(h.repos.replies.get(905).await.expect("get").is_none());
}

#[tokio::test]
async fn forward_delete_of_a_gone_original_drops_the_row() {
    let h = harness().await;
    let (topic, message) = relay_message(&h, 12).await;
    h.transport.fail("delete_message", Fail::Gone);

    assert!(h
        .relay
        .deleter
        .delete_by_staff_forward(message.bot_message_id)
        .await
        .expect("delete"));
    assert!(h.repos.messages.get(topic.id, 12).await.expect("get").is_none());
}

#[tokio::test]
async fn history_of_untracked_topic_is_empty() {
    let h = harness().await;
    let report = h.relay.deleter.delete_history(4242).await.expect("history");
    assert_eq!(report, HistoryReport::default());
    assert!(h.transport.calls().is_empty());
}
