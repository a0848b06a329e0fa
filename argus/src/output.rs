//! Console output: turns feed events into printed lines.

use argus_sdk::event::Event;
use argus_sdk::render;

pub const CHAT_BANNER: &str = "\n-------------------- Twitch Chat --------------------\n";
pub const ACTIVITY_BANNER: &str =
    "\n----------------- Activity Feed -----------------\nApplication is now ready to receive events.\n";

/// Text to print for one event, if any.
///
/// Banners only appear with `verbose`; lifecycle events without a visible
/// form return `None`.
pub fn format_event(event: &Event, verbose: bool, width: Option<usize>) -> Option<String> {
    match event {
        Event::Joined { .. } if verbose => Some(CHAT_BANNER.to_string()),
        Event::ActivityFeedReady if verbose => Some(ACTIVITY_BANNER.to_string()),
        Event::Chat(msg) => Some(render::chat_line(msg, width)),
        Event::Activity(notification) => render::activity_line(notification),
        _ => None,
    }
}

/// Print one event. Each event is a single `println!`, so lines from the
/// two feeds never interleave mid-line.
pub fn print_event(event: &Event, verbose: bool) {
    if let Some(text) = format_event(event, verbose, terminal_width()) {
        println!("{text}");
    }
}

fn terminal_width() -> Option<usize> {
    crossterm::terminal::size()
        .ok()
        .map(|(cols, _)| cols as usize)
        .filter(|cols| *cols > 0)
}
