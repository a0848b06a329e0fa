//! Terminal rendering for chat and activity lines.

use crate::chat::{ChatMessage, Role};
use crate::notification::Notification;

/// ANSI escape codes for coloring terminal output.
pub mod color {
    pub const RESET: &str = "\x1b[0m";
    pub const RED: &str = "\x1b[31m";
    pub const TWITCH_PURPLE: &str = "\x1b[38;2;145;70;255m";
    pub const WHITE: &str = "\x1b[97m";
    pub const PURPLE: &str = "\x1b[35m";
    pub const CYAN: &str = "\x1b[36m";
}

pub fn role_color(role: Role) -> &'static str {
    match role {
        Role::Privileged => color::RED,
        Role::Viewer => color::TWITCH_PURPLE,
    }
}

/// Render a chat message as ` [CHAT] <name>: <text>`.
///
/// With a known terminal width the text is word-wrapped so that
/// continuation lines line up under the first word of the message.
pub fn chat_line(msg: &ChatMessage, width: Option<usize>) -> String {
    let prefix = format!(
        " [CHAT] {}{}{}: ",
        role_color(msg.role),
        msg.display_name,
        color::RESET
    );
    match width {
        Some(width) if width > 0 => {
            let indent = visible_len(&prefix);
            let wrapped = wrap_message(&msg.text, width.saturating_sub(indent), indent);
            format!("{prefix}{wrapped}")
        }
        _ => format!("{prefix}{}", msg.text),
    }
}

/// Render an activity notification. `None` for unrecognized types.
pub fn activity_line(notification: &Notification) -> Option<String> {
    let reset = color::RESET;
    let line = match notification {
        Notification::Subscription { user_name } => {
            format!("{} [ACTIVITY] New Subscriber: {user_name}!{reset}", color::WHITE)
        }
        Notification::Cheer { user_name, bits } => {
            format!("{} [ACTIVITY] {user_name} cheered {bits} bits!{reset}", color::PURPLE)
        }
        Notification::PointRedemption {
            user_name,
            reward_title,
            reward_cost,
        } => format!(
            "{} [ACTIVITY] {user_name} redeemed {reward_cost} channel points for: {reward_title}{reset}",
            color::CYAN
        ),
        Notification::Unrecognized { .. } => return None,
    };
    Some(line)
}

/// Greedy word wrap. Words are never split; a word longer than `width`
/// gets a line of its own. Continuation lines start with `indent` spaces.
pub fn wrap_message(message: &str, width: usize, indent: usize) -> String {
    let separator = format!("\n{}", " ".repeat(indent));
    let mut out = String::with_capacity(message.len());
    let mut line_len = 0;

    for word in message.split_whitespace() {
        let word_len = word.chars().count();
        if line_len == 0 {
            out.push_str(word);
            line_len = word_len;
        } else if line_len + 1 + word_len > width {
            out.push_str(&separator);
            out.push_str(word);
            line_len = word_len;
        } else {
            out.push(' ');
            out.push_str(word);
            line_len += 1 + word_len;
        }
    }
    out
}

/// Remove ANSI escape sequences (CSI `ESC [ ... final`, and two-byte `ESC x`).
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('[') => {
                for c in chars.by_ref() {
                    if ('@'..='~').contains(&c) {
                        break;
                    }
                }
            }
            Some(_) | None => {}
        }
    }
    out
}

/// Printed width of `s`, ignoring escape sequences.
pub fn visible_len(s: &str) -> usize {
    strip_ansi(s).chars().count()
}
