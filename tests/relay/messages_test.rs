//! Tests for `src/relay/messages.rs`: staff replies, edits, and their failure modes.

use backchannel::model::{Reply, Topic};
use backchannel::relay::messages::{ReplyOutcome, StaffMessage};
use backchannel::relay::texts::{UNSUPPORTED_CONTENT, USER_BLOCKED_BOT};
use backchannel::relay::Inbound;
use backchannel::store::MirrorFilter;
use backchannel::transport::{Content, Destination};

use crate::support::{harness, profile, Call, Fail, Harness, STAFF_CHAT};

const USER: i64 = 42;

async fn topic_with_message(h: &Harness) -> Topic {
    let inbound = h
        .relay
        .receive(&profile(USER, "Grace Hopper", Some("grace")), 1)
        .await
        .expect("receive");
    let Inbound::Forwarded { topic, .. } = inbound else {
        panic!("expected a forwarded message");
    };
    h.transport.clear();
    topic
}

fn staff(id: i32, topic: &Topic, content: Content) -> StaffMessage {
    StaffMessage {
        id,
        thread_id: Some(topic.id),
        content,
    }
}

#[tokio::test]
async fn text_reply_is_delivered_and_recorded() {
    let h = harness().await;
    let topic = topic_with_message(&h).await;

    let outcome = h
        .relay
        .messages
        .reply(&staff(500, &topic, Content::Text("Hello!".to_owned())))
        .await
        .expect("reply");

    let ReplyOutcome::Delivered(reply) = outcome else {
        panic!("expected delivery, got {outcome:?}");
    };
    assert_eq!(reply.id, 500);
    assert_eq!(reply.topic_id, topic.id);
    assert_eq!(
        h.transport.calls(),
        vec![Call::SendText {
            to: Destination::chat(USER),
            text: "Hello!".to_owned(),
        }]
    );
    let stored = h.repos.replies.get(500).await.expect("get");
    assert_eq!(stored, Some(reply));
}

#[tokio::test]
async fn photo_reply_goes_through_scratch_file_that_is_removed() {
    let h = harness().await;
    let topic = topic_with_message(&h).await;

    let outcome = h
        .relay
        .messages
        .reply(&staff(
            501,
            &topic,
            Content::Photo {
                file_id: "AgAD-photo".to_owned(),
                caption: Some("see attached".to_owned()),
            },
        ))
        .await
        .expect("reply");
    assert!(matches!(outcome, ReplyOutcome::Delivered(_)));

    let calls = h.transport.calls();
    assert_eq!(
        calls[0],
        Call::Download {
            file_id: "AgAD-photo".to_owned()
        }
    );
    let Call::SendPhoto {
        to,
        path,
        existed,
        caption,
    } = &calls[1]
    else {
        panic!("expected a photo upload, got {:?}", calls[1]);
    };
    assert_eq!(*to, Destination::chat(USER));
    assert!(*existed, "photo must exist while it is uploaded");
    assert_eq!(caption.as_deref(), Some("see attached"));
    assert!(path.starts_with(h.tmp_dir()));
    assert!(!path.exists(), "scratch file must be removed");
}

#[tokio::test]
async fn failed_photo_upload_still_removes_scratch_file() {
    let h = harness().await;
    let topic = topic_with_message(&h).await;
    h.transport.fail("send_photo", Fail::Other);

    let result = h
        .relay
        .messages
        .reply(&staff(
            502,
            &topic,
            Content::Photo {
                file_id: "AgAD-photo".to_owned(),
                caption: None,
            },
        ))
        .await;
    assert!(result.is_err());

    let leftovers = std::fs::read_dir(h.tmp_dir()).expect("scratch dir").count();
    assert_eq!(leftovers, 0);
    assert!(h.repos.replies.get(502).await.expect("get").is_none());
}

#[tokio::test]
async fn unsupported_reply_notifies_staff_and_records_nothing() {
    let h = harness().await;
    let topic = topic_with_message(&h).await;

    let outcome = h
        .relay
        .messages
        .reply(&staff(503, &topic, Content::Unsupported))
        .await
        .expect("reply");

    assert_eq!(outcome, ReplyOutcome::Unsupported);
    assert_eq!(
        h.transport.calls(),
        vec![Call::SendText {
            to: Destination::thread(STAFF_CHAT, topic.id).replying_to(503),
            text: UNSUPPORTED_CONTENT.to_owned(),
        }]
    );
    assert!(h.repos.replies.get(503).await.expect("get").is_none());
}

#[tokio::test]
async fn blocked_recipient_notifies_staff_and_records_nothing() {
    let h = harness().await;
    let topic = topic_with_message(&h).await;
    h.transport.fail("send_text", Fail::Blocked);

    let outcome = h
        .relay
        .messages
        .reply(&staff(504, &topic, Content::Text("anyone there?".to_owned())))
        .await
        .expect("reply");

    assert_eq!(outcome, ReplyOutcome::Blocked);
    assert_eq!(h.transport.staff_posts(topic.id), vec![USER_BLOCKED_BOT.to_owned()]);
    assert!(h.repos.replies.get(504).await.expect("get").is_none());
}

#[tokio::test]
async fn reply_in_untracked_thread_is_ignored() {
    let h = harness().await;
    let outcome = h
        .relay
        .messages
        .reply(&StaffMessage {
            id: 505,
            thread_id: Some(31337),
            content: Content::Text("hi".to_owned()),
        })
        .await
        .expect("reply");

    assert_eq!(outcome, ReplyOutcome::Untracked);
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn edit_updates_delivered_copy_without_new_rows() {
    let h = harness().await;
    let topic = topic_with_message(&h).await;
    let ReplyOutcome::Delivered(reply) = h
        .relay
        .messages
        .reply(&staff(506, &topic, Content::Text("v1".to_owned())))
        .await
        .expect("reply")
    else {
        panic!("expected delivery");
    };
    h.transport.clear();

    let outcome = h
        .relay
        .messages
        .edit_reply(&staff(506, &topic, Content::Text("v2".to_owned())))
        .await
        .expect("edit");

    assert_eq!(outcome, ReplyOutcome::Edited(reply.clone()));
    assert_eq!(
        h.transport.calls(),
        vec![Call::EditText {
            chat_id: USER,
            message_id: reply.bot_message_id,
            text: "v2".to_owned(),
        }]
    );
    let replies = h
        .repos
        .replies
        .filter(MirrorFilter::by_topic(topic.id))
        .await
        .expect("replies");
    assert_eq!(replies, vec![reply]);
}

#[tokio::test]
async fn photo_edit_uses_persistent_file_reference() {
    let h = harness().await;
    let topic = topic_with_message(&h).await;
    let photo = Content::Photo {
        file_id: "AgAD-one".to_owned(),
        caption: None,
    };
    h.relay
        .messages
        .reply(&staff(507, &topic, photo))
        .await
        .expect("reply");
    h.transport.clear();

    h.relay
        .messages
        .edit_reply(&staff(
            507,
            &topic,
            Content::Photo {
                file_id: "AgAD-two".to_owned(),
                caption: Some("new".to_owned()),
            },
        ))
        .await
        .expect("edit");

    let calls = h.transport.calls();
    assert_eq!(calls.len(), 1);
    assert!(matches!(
        &calls[0],
        Call::EditPhoto { file_id, caption, chat_id, .. }
            if file_id == "AgAD-two" && caption.as_deref() == Some("new") && *chat_id == USER
    ));
}

#[tokio::test]
async fn unchanged_edit_counts_as_success() {
    let h = harness().await;
    let topic = topic_with_message(&h).await;
    h.relay
        .messages
        .reply(&staff(508, &topic, Content::Text("same".to_owned())))
        .await
        .expect("reply");
    h.transport.fail("edit_text", Fail::NotModified);

    let outcome = h
        .relay
        .messages
        .edit_reply(&staff(508, &topic, Content::Text("same".to_owned())))
        .await
        .expect("edit");
    assert!(matches!(outcome, ReplyOutcome::Edited(_)));
}

#[tokio::test]
async fn edit_of_untracked_reply_does_nothing() {
    let h = harness().await;
    let topic = topic_with_message(&h).await;

    let outcome = h
        .relay
        .messages
        .edit_reply(&staff(509, &topic, Content::Text("late".to_owned())))
        .await
        .expect("edit");

    assert_eq!(outcome, ReplyOutcome::Untracked);
    assert!(h.transport.calls().is_empty());
    assert!(h.repos.replies.get(509).await.expect("get").is_none());
}

async fn delivered_reply(h: &Harness, topic: &Topic, id: i32) -> Reply {
    let ReplyOutcome::Delivered(reply) = h
        .relay
        .messages
        .reply(&staff(id, topic, Content::Text("first draft".to_owned())))
        .await
        .expect("reply")
    else {
        panic!("expected delivery");
    };
    h.transport.clear();
    reply
}

#[tokio::test]
async fn edit_to_unsupported_content_notifies_staff_and_keeps_the_copy() {
    let h = harness().await;
    let topic = topic_with_message(&h).await;
    let reply = delivered_reply(&h, &topic, 510).await;

    let outcome = h
        .relay
        .messages
        .edit_reply(&staff(510, &topic, Content::Unsupported))
        .await
        .expect("edit");

    assert_eq!(outcome, ReplyOutcome::Unsupported);
    assert_eq!(
        h.transport.calls(),
        vec![Call::SendText {
            to: Destination::thread(STAFF_CHAT, topic.id).replying_to(510),
            text: UNSUPPORTED_CONTENT.to_owned(),
        }]
    );
    let replies = h
        .repos
        .replies
        .filter(MirrorFilter::by_topic(topic.id))
        .await
        .expect("replies");
    assert_eq!(replies, vec![reply]);
}

#[tokio::test]
async fn edit_for_blocked_recipient_notifies_staff() {
    let h = harness().await;
    let topic = topic_with_message(&h).await;
    let reply = delivered_reply(&h, &topic, 511).await;
    h.transport.fail("edit_text", Fail::Blocked);

    let outcome = h
        .relay
        .messages
        .edit_reply(&staff(511, &topic, Content::Text("second draft".to_owned())))
        .await
        .expect("edit");

    assert_eq!(outcome, ReplyOutcome::Blocked);
    assert_eq!(h.transport.staff_posts(topic.id), vec![USER_BLOCKED_BOT.to_owned()]);
    let replies = h
        .repos
        .replies
        .filter(MirrorFilter::by_topic(topic.id))
        .await
        .expect("replies");
    assert_eq!(replies, vec![reply]);
}

#[tokio::test]
async fn edit_in_untracked_thread_is_ignored() {
    let h = harness().await;
    let outcome = h
        .relay
        .messages
        .edit_reply(&StaffMessage {
            id: 512,
            thread_id: Some(31337),
            content: Content::Text("hi".to_owned()),
        })
        .await
        .expect("edit");

    assert_eq!(outcome, ReplyOutcome::Untracked);
    assert!(h.transport.calls().is_empty());
}
