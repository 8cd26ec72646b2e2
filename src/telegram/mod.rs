//! Telegram dispatch: routes updates to the relay engines.
//!
//! Private chats talk to users, the configured staff group talks to staff,
//! everything else is ignored. Handlers extract domain values, call one
//! relay entry point, and report its failure in [`report`]; a failed event
//! is dropped and never retried.

use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{debug, error, info, warn};

use crate::relay::{Inbound, Relay, RelayError};
use crate::transport::ThrottledBot;

use self::commands::Command;
use self::extract::{DeleteTarget, ReplyContext};

pub mod commands;
pub mod extract;

// ---------------------------------------------------------------------------
// Shared state for handler injection
// ---------------------------------------------------------------------------

/// Shared dependencies injected into teloxide handlers via `dptree::deps!`.
#[derive(Clone)]
struct SharedState {
    relay: Relay,
    staff_chat_id: i64,
    bot_id: u64,
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Run the bot until it is stopped (Ctrl+C).
///
/// Fetches the bot's own identity, registers the user and staff command
/// menus, then dispatches new and edited messages.
///
/// # Errors
///
/// Returns an error if the bot identity cannot be fetched.
pub async fn run_bot(bot: ThrottledBot, relay: Relay) -> anyhow::Result<()> {
    let me = bot
        .get_me()
        .await
        .map_err(|e| anyhow::anyhow!("failed to fetch bot identity: {e}"))?;
    let staff_chat_id = relay.settings().staff_chat_id;

    register_commands(&bot, staff_chat_id).await;

    let state = SharedState {
        relay,
        staff_chat_id,
        bot_id: me.id.0,
    };

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_edited_message().endpoint(handle_edited_message));

    info!(bot_id = me.id.0, staff_chat_id, "telegram dispatcher starting");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

/// Register the user and staff menus in their scopes. Failures only cost
/// the menus, so they are logged.
async fn register_commands(bot: &ThrottledBot, staff_chat_id: i64) {
    for (scope, menu) in commands::menu_scopes(staff_chat_id) {
        if let Err(e) = bot
            .set_my_commands(commands::menu(menu))
            .scope(scope.clone())
            .await
        {
            warn!(error = %e, ?scope, "failed to register command menu");
        }
    }
}

/// Log a failed relay call. The update itself is always acknowledged.
fn report<T>(event: &'static str, result: Result<T, RelayError>) {
    match result {
        Ok(_) => {}
        Err(e) if e.is_conflict() => warn!(event, error = %e, "concurrent update, event dropped"),
        Err(e) => error!(event, error = %e, "event failed"),
    }
}

// ---------------------------------------------------------------------------
// New messages
// ---------------------------------------------------------------------------

async fn handle_message(
    bot: ThrottledBot,
    msg: Message,
    state: SharedState,
) -> ResponseResult<()> {
    if msg.chat.is_private() {
        handle_private(bot, msg, state).await
    } else if msg.chat.id.0 == state.staff_chat_id {
        handle_staff(msg, state).await;
        Ok(())
    } else {
        debug!(chat_id = msg.chat.id.0, "message from unrelated chat ignored");
        Ok(())
    }
}

async fn handle_private(
    bot: ThrottledBot,
    msg: Message,
    state: SharedState,
) -> ResponseResult<()> {
    match msg.text().and_then(Command::parse) {
        Some(Command::Start) => {
            bot.send_message(msg.chat.id, commands::handle_start())
                .parse_mode(ParseMode::Html)
                .await?;
            return Ok(());
        }
        Some(Command::Help) => {
            bot.send_message(msg.chat.id, commands::handle_help())
                .parse_mode(ParseMode::Html)
                .await?;
            return Ok(());
        }
        _ => {}
    }

    let Some(profile) = msg.from.as_ref().and_then(extract::profile_of) else {
        debug!("private message without a usable sender, ignored");
        return Ok(());
    };

    debug!(user_id = profile.id, message_id = msg.id.0, "user message received");

    match state.relay.receive(&profile, msg.id.0).await {
        Ok(Inbound::Banned) => debug!(user_id = profile.id, "banned user refused"),
        Ok(Inbound::Forwarded { topic, created, .. }) => {
            debug!(user_id = profile.id, topic_id = topic.id, created, "user message relayed");
        }
        Err(e) => report("receive", Err::<(), _>(e)),
    }
    Ok(())
}

async fn handle_staff(msg: Message, state: SharedState) {
    if let Some(command) = msg.text().and_then(Command::parse) {
        if command.is_staff() {
            handle_staff_command(command, &msg, &state).await;
        }
        return;
    }

    let Some(context) = ReplyContext::of(&msg) else {
        return;
    };
    if !context.is_relay_forward(state.bot_id) {
        return;
    }

    let staff = extract::staff_message_of(&msg);
    report("reply", state.relay.messages.reply(&staff).await);
}

async fn handle_staff_command(command: Command, msg: &Message, state: &SharedState) {
    let relay = &state.relay;
    let Some(thread_id) = msg.thread_id.map(|thread| thread.0 .0) else {
        debug!(command = command.as_str(), "staff command outside a topic, ignored");
        return;
    };

    debug!(command = command.as_str(), thread_id, "staff command");

    match command {
        Command::Ban => report("ban", relay.users.set_ban_by_topic(thread_id, true).await),
        Command::Unban => report("unban", relay.users.set_ban_by_topic(thread_id, false).await),
        Command::UserLog => report("userlog", relay.users.send_user_info(thread_id).await),
        Command::DelHistory => report("delhistory", relay.deleter.delete_history(thread_id).await),
        Command::Delete => {
            let sender = msg.from.as_ref().map(|u| u.id.0);
            let target = ReplyContext::of(msg)
                .zip(sender)
                .and_then(|(context, sender)| context.delete_target(sender));
            match target {
                Some(DeleteTarget::Forward(mirror_id)) => report(
                    "delete",
                    relay.deleter.delete_by_staff_forward(mirror_id).await,
                ),
                Some(DeleteTarget::OwnReply(reply_id)) => {
                    report("delete", relay.deleter.delete_reply(reply_id).await);
                }
                None => debug!("nothing the sender may delete"),
            }
        }
        Command::Start | Command::Help => {}
    }
}

// ---------------------------------------------------------------------------
// Edited messages
// ---------------------------------------------------------------------------

/// Edits are relayed only for staff replies; user edits are ignored.
async fn handle_edited_message(msg: Message, state: SharedState) -> ResponseResult<()> {
    if msg.chat.id.0 != state.staff_chat_id {
        return Ok(());
    }
    let Some(context) = ReplyContext::of(&msg) else {
        return Ok(());
    };
    if !context.is_authored_by(state.bot_id) {
        return Ok(());
    }

    let staff = extract::staff_message_of(&msg);
    report("edit_reply", state.relay.messages.edit_reply(&staff).await);
    Ok(())
}
