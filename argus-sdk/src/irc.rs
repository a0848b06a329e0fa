//! IRCv3 message tags for the Twitch chat feed.
//!
//! Lines look like `@key=value;key2=value2 :prefix COMMAND params`.

use std::collections::HashMap;

/// IRCv3 tags attached to one line.
pub type Tags = HashMap<String, String>;

/// The tag string of a line starting with `@<tags> `, without `@` and the space.
pub fn tag_block(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('@')?;
    let end = rest.find(' ')?;
    if end == 0 {
        return None;
    }
    Some(&rest[..end])
}

/// Parse IRCv3 tag string: `key=value;key2=value2`
///
/// Pairs without `=` carry nothing useful for rendering and are dropped.
pub fn parse_tags(tag_str: &str) -> Tags {
    let mut tags = HashMap::new();
    for pair in tag_str.split(';') {
        if let Some((key, value)) = pair.split_once('=') {
            tags.insert(key.to_string(), unescape_tag_value(value));
        }
    }
    tags
}

/// Unescape IRCv3 tag values.
/// `\:` → `;`, `\s` → space, `\\` → `\`, `\r` → CR, `\n` → LF
fn unescape_tag_value(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(':') => result.push(';'),
                Some('s') => result.push(' '),
                Some('\\') => result.push('\\'),
                Some('r') => result.push('\r'),
                Some('n') => result.push('\n'),
                Some(other) => { result.push('\\'); result.push(other); }
                None => {}
            }
        } else {
            result.push(c);
        }
    }
    result
}
