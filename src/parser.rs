// SPDX-License-Identifier: GPL-3.0-only

//! JSON parsing for Google Hangouts chat exports.
//!
//! This module handles deserialization of the `Hangouts.json` format produced
//! by Google Takeout. The format is a deeply nested record structure: a list
//! of conversation-state wrappers, each holding a conversation descriptor
//! (identity and participants) and an ordered list of chat events.
//!
//! # Format Overview
//!
//! A Hangouts export contains:
//! - A top-level `conversation_state` list, one entry per chat thread
//! - Per thread, a participant list with id, fallback name, and optional
//!   E.164 phone number
//! - Per thread, an ordered `event` list; chat-message events carry a
//!   content body of text segments and attachments
//!
//! The archive owner is not named anywhere in the export. Their identity is
//! discovered after parsing by frequency analysis: the owner is the one
//! participant expected to appear in virtually every conversation, so their
//! id is the mode of the participant-id multiset (see [`discover_self_id`]).
//!
//! # Example
//!
//! ```
//! use hangouts2sms::parser::parse_archive;
//!
//! let json = r#"{
//!     "conversation_state": [{
//!         "conversation_state": {
//!             "conversation_id": { "id": "conv1" },
//!             "conversation": { "participant_data": [] },
//!             "event": []
//!         }
//!     }]
//! }"#;
//!
//! let archive = parse_archive(json).unwrap();
//! assert_eq!(archive.conversations.len(), 1);
//! ```

use serde::Deserialize;
use snafu::prelude::*;

/// Error type for JSON parsing failures.
#[derive(Debug, Snafu)]
pub enum ParseError {
    /// Failed to parse JSON content.
    #[snafu(display("failed to parse JSON: {source}"))]
    Json {
        /// The underlying JSON parsing error.
        source: serde_json::Error,
    },
}

/// The root structure of a Hangouts export: every conversation in the
/// archive, plus the discovered owner identity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Archive {
    /// All conversations, in source order.
    #[serde(rename = "conversation_state")]
    pub conversations: Vec<Conversation>,

    /// The archive owner's participant id.
    ///
    /// Populated after parsing by [`discover_self_id`], or overridden with a
    /// known id when the frequency heuristic cannot be trusted. `None` when
    /// the archive has no participants at all.
    #[serde(skip)]
    pub self_id: Option<String>,
}

/// One chat thread: its identity, participants, and message sequence.
///
/// The participant list is stored unfiltered, including the archive owner.
/// The owner's id is only known after every conversation has been parsed,
/// so "non-self participants" is a view derived at render time rather than
/// state baked in here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    /// Opaque thread identity, unique within the archive.
    pub id: String,

    /// Every party to the conversation, including the archive owner.
    pub participants: Vec<Participant>,

    /// Messages in source event order (chronological).
    pub messages: Vec<Message>,
}

/// One party to a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Opaque identity, stable across the archive.
    pub id: String,

    /// Fallback display name. May be generic or absent entirely.
    pub name: Option<String>,

    /// E.164-formatted phone number. Absent for unresolvable contacts.
    pub phone_number: Option<String>,
}

/// One chat event, normalized into the message model.
///
/// Events that are not chat messages (renames, hangout calls, membership
/// changes) still produce a `Message`, just with no text or attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Identity of the owning conversation.
    pub conversation_id: String,

    /// Identity of the sending participant.
    pub sender_id: String,

    /// Event time as a Unix timestamp in milliseconds.
    ///
    /// The export carries microseconds; the value is divided by 1000 during
    /// parsing.
    pub timestamp: i64,

    /// Opaque event identifier from the source.
    pub event_id: String,

    /// Opaque event type tag from the source (e.g. `REGULAR_CHAT_MESSAGE`).
    pub event_type: String,

    /// Assembled display text, if the event carried renderable segments.
    ///
    /// `Some(String::new())` means the event had a segment list that
    /// produced no text; `None` means there was no segment list at all.
    pub text: Option<String>,

    /// Image attachments, in source order. Empty if none.
    pub attachments: Vec<Attachment>,
}

/// One attachment reference extracted from a chat-message event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// What the attachment is. Only photos survive extraction.
    pub kind: AttachmentKind,

    /// URL of the attachment content.
    pub url: String,
}

/// The kind of an extracted attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    /// A photo (`PLUS_PHOTO` in the source schema).
    Image,
}

impl<'de> Deserialize<'de> for Conversation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        // Takeout wraps each list entry in a second "conversation_state"
        // object; tolerate both the wrapped and unwrapped shapes.
        let state = value.get("conversation_state").unwrap_or(&value);

        let id = get_string(state, &["conversation_id", "id"]).unwrap_or_default();

        let descriptor = state
            .get("conversation")
            .ok_or_else(|| serde::de::Error::missing_field("conversation"))?;

        let participants = descriptor
            .get("participant_data")
            .and_then(serde_json::Value::as_array)
            .map(|entries| entries.iter().map(parse_participant).collect())
            .unwrap_or_default();

        let events = state
            .get("event")
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| serde::de::Error::missing_field("event"))?;

        let messages = events.iter().map(parse_event).collect();

        Ok(Self {
            id,
            participants,
            messages,
        })
    }
}

fn parse_participant(value: &serde_json::Value) -> Participant {
    Participant {
        id: get_string(value, &["id", "chat_id"]).unwrap_or_default(),
        name: get_string(value, &["fallback_name"]),
        phone_number: get_string(value, &["phone_number", "e164"]),
    }
}

/// Normalizes one raw event into a [`Message`].
///
/// Extraction never fails: unrecognized shapes simply leave the optional
/// fields empty, matching the consuming format's tolerance.
fn parse_event(event: &serde_json::Value) -> Message {
    let mut text = None;
    let mut attachments = Vec::new();

    if let Some(content) = event
        .get("chat_message")
        .and_then(|m| m.get("message_content"))
    {
        if let Some(segments) = content.get("segment").and_then(serde_json::Value::as_array) {
            text = Some(assemble_text(segments));
        }

        if let Some(entries) = content
            .get("attachment")
            .and_then(serde_json::Value::as_array)
        {
            attachments = extract_attachments(entries);
        }
    }

    Message {
        conversation_id: get_string(event, &["conversation_id", "id"]).unwrap_or_default(),
        sender_id: get_string(event, &["sender_id", "chat_id"]).unwrap_or_default(),
        timestamp: timestamp_micros(event) / 1000,
        event_id: get_string(event, &["event_id"]).unwrap_or_default(),
        event_type: get_string(event, &["event_type"]).unwrap_or_default(),
        text,
        attachments,
    }
}

/// Concatenates a segment list into display text.
///
/// Order is preserved across segment kinds. Unknown kinds are skipped with
/// a diagnostic; they never abort the surrounding segments.
fn assemble_text(segments: &[serde_json::Value]) -> String {
    let mut out = String::new();
    for segment in segments {
        match get_str(segment, &["type"]).unwrap_or("") {
            "TEXT" => out.push_str(get_str(segment, &["text"]).unwrap_or("")),
            "LINE_BREAK" => out.push('\n'),
            "LINK" => out.push_str(get_str(segment, &["link_data", "link_target"]).unwrap_or("")),
            other => eprintln!("Unknown segment type {other}"),
        }
    }
    out
}

/// Extracts photo attachments; other embed kinds are dropped.
fn extract_attachments(entries: &[serde_json::Value]) -> Vec<Attachment> {
    let mut attachments = Vec::new();
    for entry in entries {
        let Some(item) = entry.get("embed_item") else {
            continue;
        };
        let kind = item
            .get("type")
            .and_then(serde_json::Value::as_array)
            .and_then(|types| types.first())
            .and_then(serde_json::Value::as_str);
        if kind == Some("PLUS_PHOTO")
            && let Some(url) = get_str(item, &["embeds.PlusPhoto.plus_photo", "url"])
        {
            attachments.push(Attachment {
                kind: AttachmentKind::Image,
                url: url.to_owned(),
            });
        }
    }
    attachments
}

/// Reads an event timestamp in microseconds.
///
/// Takeout has emitted both JSON numbers and decimal strings over the
/// years; accept either.
fn timestamp_micros(event: &serde_json::Value) -> i64 {
    match event.get("timestamp") {
        Some(serde_json::Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(serde_json::Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Navigates a JSON path and returns the string value at the end.
fn get_str<'a>(value: &'a serde_json::Value, path: &[&str]) -> Option<&'a str> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    current.as_str()
}

/// Like [`get_str`] but returns an owned `String`.
fn get_string(value: &serde_json::Value, path: &[&str]) -> Option<String> {
    get_str(value, path).map(str::to_owned)
}

/// Discovers the archive owner's participant id.
///
/// Collects every participant id across every conversation into one
/// multiset and returns the id with the maximum occurrence count. The
/// owner appears in virtually every conversation, so they are the mode.
/// This is a heuristic, not a guarantee; callers can override the result
/// when the owner's id is known out of band.
///
/// Ties are broken toward the first-encountered id, which keeps the result
/// deterministic for identical input order.
#[must_use]
pub fn discover_self_id(conversations: &[Conversation]) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for conversation in conversations {
        for participant in &conversation.participants {
            match counts.iter_mut().find(|(id, _)| *id == participant.id) {
                Some(entry) => entry.1 += 1,
                None => counts.push((participant.id.as_str(), 1)),
            }
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (id, count) in counts {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((id, count));
        }
    }
    best.map(|(id, _)| id.to_owned())
}

/// Parses a JSON string into an [`Archive`].
///
/// This is the main entry point for parsing Hangouts exports. The owner
/// identity is discovered after all conversations are built, since building
/// them requires no prior knowledge of self.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or the required top-level
/// structure (the conversation list, a conversation descriptor, an event
/// list) is missing. Everything below that level is optional and degrades
/// to absent fields instead of failing.
///
/// # Example
///
/// ```
/// use hangouts2sms::parser::parse_archive;
///
/// let archive = parse_archive(r#"{"conversation_state": []}"#).unwrap();
/// assert!(archive.conversations.is_empty());
/// assert!(archive.self_id.is_none());
/// ```
pub fn parse_archive(json_str: &str) -> Result<Archive, ParseError> {
    let mut archive: Archive = serde_json::from_str(json_str).context(JsonSnafu)?;
    archive.self_id = discover_self_id(&archive.conversations);
    Ok(archive)
}
