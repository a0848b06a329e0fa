//! Argus SDK
//!
//! Clients for the two live feeds of a Twitch channel, plus the helpers
//! that turn their output into terminal lines.
//!
//! # Modules
//!
//! - [`chat`] — IRC chat client (handshake, keepalive, PRIVMSG extraction)
//! - [`eventsub`] — EventSub WebSocket session state machine
//! - [`registrar`] — Helix subscription registration over HTTP
//! - [`notification`] — Typed decoding of EventSub notification payloads
//! - [`render`] — ANSI colors, word wrapping and line rendering
//! - [`event`] — Events emitted by both clients
//! - [`irc`] — IRC line and IRCv3 tag parsing
//! - [`config`] — Connection settings shared by both clients

pub mod chat;
pub mod config;
pub mod event;
pub mod eventsub;
pub mod irc;
pub mod notification;
pub mod registrar;
pub mod render;
