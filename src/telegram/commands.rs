//! Slash commands: parsing, fixed texts and the command menus.
//!
//! All output uses HTML parse mode.

use teloxide::types::{BotCommand, BotCommandScope, ChatId, Recipient};

/// A recognised slash command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Welcome text (private chat).
    Start,
    /// Usage text (private chat).
    Help,
    /// Ban the topic owner (staff).
    Ban,
    /// Lift the topic owner's ban (staff).
    Unban,
    /// Post the user card into the topic (staff).
    UserLog,
    /// Delete the replied-to pair (staff).
    Delete,
    /// Delete every relayed pair of the topic (staff).
    DelHistory,
}

/// Commands offered to end-users in their private chat.
pub const USER_COMMANDS: [Command; 2] = [Command::Start, Command::Help];

/// Commands offered inside the staff group.
pub const STAFF_COMMANDS: [Command; 5] = [
    Command::Ban,
    Command::Unban,
    Command::UserLog,
    Command::Delete,
    Command::DelHistory,
];

impl Command {
    /// Command name without the leading slash.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Ban => "ban",
            Self::Unban => "unban",
            Self::UserLog => "userlog",
            Self::Delete => "delete",
            Self::DelHistory => "delhistory",
        }
    }

    /// Menu description.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Start => "Start the conversation",
            Self::Help => "How this bot works",
            Self::Ban => "Ban the user of this topic",
            Self::Unban => "Lift the ban of the user of this topic",
            Self::UserLog => "Show the user's change history",
            Self::Delete => "Delete the replied-to message for the user",
            Self::DelHistory => "Delete the whole conversation for the user",
        }
    }

    /// Parse message text as a command.
    ///
    /// Accepts `/name`, `/name@bot` and trailing arguments, which are
    /// ignored. Returns `None` for plain text and unknown commands.
    pub fn parse(text: &str) -> Option<Self> {
        let without_slash = text.strip_prefix('/')?;
        let full_command = without_slash
            .split_whitespace()
            .next()
            .unwrap_or(without_slash);
        let command = full_command.split('@').next().unwrap_or(full_command);

        match command {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            "ban" => Some(Self::Ban),
            "unban" => Some(Self::Unban),
            "userlog" => Some(Self::UserLog),
            "delete" => Some(Self::Delete),
            "delhistory" => Some(Self::DelHistory),
            _ => None,
        }
    }

    /// Whether the command is only meaningful inside the staff group.
    pub fn is_staff(&self) -> bool {
        STAFF_COMMANDS.contains(self)
    }
}

/// Build a Bot API command menu.
pub fn menu(commands: &[Command]) -> Vec<BotCommand> {
    commands
        .iter()
        .map(|c| BotCommand::new(c.as_str(), c.description()))
        .collect()
}

/// Where each menu is registered: user commands in private chats, staff
/// commands for everyone in the staff group and again for its
/// administrators, whose scope would otherwise shadow the chat scope.
pub fn menu_scopes(staff_chat_id: i64) -> [(BotCommandScope, &'static [Command]); 3] {
    let staff_chat = Recipient::Id(ChatId(staff_chat_id));
    [
        (BotCommandScope::AllPrivateChats, &USER_COMMANDS),
        (
            BotCommandScope::Chat {
                chat_id: staff_chat.clone(),
            },
            &STAFF_COMMANDS,
        ),
        (
            BotCommandScope::ChatAdministrators {
                chat_id: staff_chat,
            },
            &STAFF_COMMANDS,
        ),
    ]
}

/// Reply to `/start`.
pub fn handle_start() -> String {
    [
        "<b>Welcome to our feedback bot.</b>",
        "",
        "Briefly describe what you need and we will answer as soon as we can.",
    ]
    .join("\n")
}

/// Reply to `/help`.
pub fn handle_help() -> String {
    [
        "Using this bot is simple:",
        "",
        "- Send your messages here and our team replies to you in this chat.",
        "- Text and photos are supported.",
        "- Type <code>/</code> to see the available commands.",
    ]
    .join("\n")
}
