//! Twitch chat client.
//!
//! Owns the plaintext IRC connection: sends the handshake, answers
//! keepalive PINGs, and turns PRIVMSG lines into [`ChatMessage`] events.
//! The client never reconnects; it returns once the connection drops.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::config::ConnectionConfig;
use crate::event::{Event, Feed};
use crate::irc;

/// Capability that makes Twitch attach badges and display names to lines.
pub const TAGS_CAPABILITY: &str = "twitch.tv/tags";

const PONG: &[u8] = b"PONG :tmi.twitch.tv\r\n";

/// Privilege of a chat participant, derived from the `badges` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Moderator or broadcaster.
    Privileged,
    Viewer,
}

impl Role {
    pub fn from_badges(badges: &str) -> Self {
        if badges.contains("moderator") || badges.contains("broadcaster") {
            Role::Privileged
        } else {
            Role::Viewer
        }
    }
}

/// One chat line, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub display_name: String,
    pub text: String,
    pub role: Role,
}

/// A line that contains `PRIVMSG`, split at its first occurrence.
struct PrivmsgLine<'a> {
    /// Tags and prefix, up to `PRIVMSG`.
    head: &'a str,
    /// Channel and text, after `PRIVMSG`.
    body: &'a str,
}

/// Author extracted by one of the parse strategies.
struct Author {
    name: String,
    role: Role,
}

type Strategy = fn(&PrivmsgLine<'_>) -> Option<Author>;

/// Tried in order; the first strategy that yields an author wins.
const STRATEGIES: &[Strategy] = &[author_from_tags, author_from_prefix];

/// Extract a chat message from a raw line.
///
/// Returns `None` for lines that are not chat messages, including lines
/// that mention `PRIVMSG` but match no parse strategy.
pub fn parse_chat_line(line: &str) -> Option<ChatMessage> {
    let (head, body) = line.split_once("PRIVMSG")?;
    let candidate = PrivmsgLine { head, body };

    let Some(author) = STRATEGIES.iter().find_map(|strategy| strategy(&candidate)) else {
        tracing::debug!(line, "Dropping unparseable PRIVMSG line");
        return None;
    };

    let text = match candidate.body.split_once(':') {
        Some((_, text)) => text,
        None => candidate.body,
    };

    Some(ChatMessage {
        display_name: author.name,
        text: text.trim().to_string(),
        role: author.role,
    })
}

/// `@display-name=..;badges=.. :nick!... PRIVMSG ...`
fn author_from_tags(candidate: &PrivmsgLine<'_>) -> Option<Author> {
    let tags = irc::parse_tags(irc::tag_block(candidate.head)?);
    let name = match tags.get("display-name").map(String::as_str) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => tags.get("login").cloned().unwrap_or_default(),
    };
    let role = Role::from_badges(tags.get("badges").map(String::as_str).unwrap_or(""));
    Some(Author { name, role })
}

/// `:<nick>!... PRIVMSG #<channel> :<text>`, with nick and channel made of
/// ASCII word characters and a non-empty trailing text.
fn author_from_prefix(candidate: &PrivmsgLine<'_>) -> Option<Author> {
    let (nick, _) = candidate.head.strip_prefix(':')?.split_once('!')?;
    let (channel, text) = candidate.body.strip_prefix(" #")?.split_once(" :")?;
    if !is_word(nick) || !is_word(channel) || text.is_empty() {
        return None;
    }
    Some(Author {
        name: nick.to_string(),
        role: Role::Viewer,
    })
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Connect to the chat server and run until the connection drops.
///
/// A failed dial is returned as an error; the caller should treat it as
/// fatal. Once connected this only returns `Ok`, after emitting
/// [`Event::Disconnected`].
pub async fn connect(config: Arc<ConnectionConfig>, event_tx: mpsc::Sender<Event>) -> Result<()> {
    let tcp = TcpStream::connect(&config.chat_addr)
        .await
        .with_context(|| format!("Error connecting to Twitch IRC at {}", config.chat_addr))?;
    tracing::debug!("Connected to Twitch IRC at {}", config.chat_addr);

    let (reader, writer) = tcp.into_split();
    run_chat(BufReader::new(reader), writer, &config, event_tx).await;
    Ok(())
}

/// Drive the chat protocol over an already-connected stream.
pub async fn run_chat<R, W>(reader: R, writer: W, config: &ConnectionConfig, event_tx: mpsc::Sender<Event>)
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let reason = match chat_session(reader, writer, config, &event_tx).await {
        Ok(()) => "EOF".to_string(),
        Err(e) => e.to_string(),
    };
    tracing::warn!("IRC connection lost or closed: {reason}");
    let _ = event_tx
        .send(Event::Disconnected {
            feed: Feed::Chat,
            reason,
        })
        .await;
}

async fn chat_session<R, W>(
    mut reader: R,
    mut writer: W,
    config: &ConnectionConfig,
    event_tx: &mpsc::Sender<Event>,
) -> std::io::Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    // Twitch accepts the handshake pipelined; nothing is awaited in between.
    writer
        .write_all(format!("CAP REQ :{TAGS_CAPABILITY}\r\n").as_bytes())
        .await?;
    writer
        .write_all(format!("PASS oauth:{}\r\n", config.token).as_bytes())
        .await?;
    writer
        .write_all(format!("NICK {}\r\n", config.nick).as_bytes())
        .await?;
    writer
        .write_all(format!("JOIN {}\r\n", config.channel).as_bytes())
        .await?;
    writer.flush().await?;

    if config.verbose {
        tracing::info!("Joined IRC channel {}", config.channel);
    } else {
        tracing::info!("CLI active for channel {}", config.channel);
    }
    let _ = event_tx
        .send(Event::Joined {
            channel: config.channel.clone(),
        })
        .await;

    let mut line_buf = Vec::new();
    loop {
        line_buf.clear();
        let n = reader.read_until(b'\n', &mut line_buf).await?;
        if n == 0 {
            return Ok(());
        }
        let raw = String::from_utf8_lossy(&line_buf);
        let line = raw.trim();

        if line.starts_with("PING") {
            writer.write_all(PONG).await?;
            writer.flush().await?;
        }

        if let Some(msg) = parse_chat_line(line) {
            let _ = event_tx.send(Event::Chat(msg)).await;
        }
    }
}
