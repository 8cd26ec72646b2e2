//! Tests for `src/telegram/extract.rs` routing decisions.

use backchannel::telegram::extract::{DeleteTarget, ReplyContext};

const BOT: u64 = 6_000_000_001;
const STAFF: u64 = 1_111;

fn context(is_forward: bool, author_id: Option<u64>) -> ReplyContext {
    ReplyContext {
        message_id: 55,
        is_forward,
        author_id,
    }
}

#[test]
fn only_forwards_posted_by_the_bot_are_answered() {
    assert!(context(true, Some(BOT)).is_relay_forward(BOT));
    assert!(!context(false, Some(BOT)).is_relay_forward(BOT));
    assert!(!context(true, Some(STAFF)).is_relay_forward(BOT));
    assert!(!context(true, None).is_relay_forward(BOT));
}

#[test]
fn delete_on_forward_targets_the_mirror() {
    let target = context(true, Some(BOT)).delete_target(STAFF);
    assert_eq!(target, Some(DeleteTarget::Forward(55)));
}

#[test]
fn delete_on_own_message_targets_the_reply() {
    let target = context(false, Some(STAFF)).delete_target(STAFF);
    assert_eq!(target, Some(DeleteTarget::OwnReply(55)));
}

#[test]
fn delete_on_someone_elses_message_is_refused() {
    assert_eq!(context(false, Some(2_222)).delete_target(STAFF), None);
    assert_eq!(context(false, Some(BOT)).delete_target(STAFF), None);
}
