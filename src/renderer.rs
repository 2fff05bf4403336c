// SPDX-License-Identifier: GPL-3.0-only

//! SMS Backup & Restore document construction.
//!
//! This module transforms a parsed [`Archive`] into the XML backup tree
//! consumed by SMS Backup & Restore. Each message is classified as exactly
//! one of two record shapes:
//!
//! - **SMS**: a two-party thread (exactly one non-self participant) and no
//!   attachments
//! - **MMS**: everything else — group threads, or any message carrying an
//!   attachment
//!
//! MMS records additionally carry a `parts` collection (one part per
//! attachment, plus a trailing part for the message text) and an `addrs`
//! collection (one address entry per participant, with the owner included
//! only when they sent the message).
//!
//! # Example
//!
//! ```
//! use hangouts2sms::parser::parse_archive;
//! use hangouts2sms::renderer::{RenderOptions, render_archive};
//!
//! let archive = parse_archive(r#"{"conversation_state": []}"#).unwrap();
//! let doc = render_archive(&archive, &RenderOptions::default());
//!
//! assert!(doc.to_string().contains("<smses count=\"0\""));
//! ```

use crate::parser::{Archive, Conversation, Message, Participant};
use crate::xml::{Document, Element};
use chrono::{DateTime, Utc};

/// MIBenum charset code for UTF-8, used on every part and address entry.
const CHARSET_UTF8: u32 = 106;

/// Content type carried by every MMS record.
const CONTENT_TYPE: &str = "application/vnd.wap.multipart.related";

/// Creator identifier stamped on MMS records.
const CREATOR: &str = "net.smaertness.hangouts2sms";

/// Placeholder address the importer replaces with the device's own number.
const SELF_ADDRESS_TOKEN: &str = "insert-address-token";

/// Configuration options for document rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Fixed backup timestamp in epoch milliseconds.
    ///
    /// `None` uses the current time. Setting a value makes output
    /// byte-for-byte reproducible.
    pub backup_date: Option<i64>,
}

/// The rendered form of one message: exactly one of the two record shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageRecord {
    /// A single-recipient text message.
    Sms(Element),
    /// A group or attachment-bearing message.
    Mms(Element),
}

/// Participants other than the archive owner.
///
/// Stored participant lists are unfiltered, so self is dropped here, at the
/// point of use. With no known owner every participant counts as "other".
fn others<'a>(
    conversation: &'a Conversation,
    self_id: Option<&'a str>,
) -> impl Iterator<Item = &'a Participant> {
    conversation
        .participants
        .iter()
        .filter(move |p| self_id != Some(p.id.as_str()))
}

/// Joins the non-self participants' phone numbers with `~`.
fn display_address(conversation: &Conversation, self_id: Option<&str>) -> String {
    others(conversation, self_id)
        .map(|p| p.phone_number.as_deref().unwrap_or_default())
        .collect::<Vec<_>>()
        .join("~")
}

/// Joins the non-self participants' names with `, `.
fn display_name(conversation: &Conversation, self_id: Option<&str>) -> String {
    others(conversation, self_id)
        .map(|p| p.name.as_deref().unwrap_or_default())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Formats a millisecond timestamp as a human-readable date, e.g.
/// `Wed Apr 09 2014`.
fn readable_date(timestamp_millis: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_millis)
        .map(|dt| dt.format("%a %b %d %Y").to_string())
        .unwrap_or_default()
}

/// Renders one message as exactly one SMS or MMS record.
///
/// The decision rule: SMS iff the thread has exactly one non-self
/// participant and the message carries no attachments; otherwise MMS.
#[must_use]
pub fn render_message(
    message: &Message,
    conversation: &Conversation,
    self_id: Option<&str>,
) -> MessageRecord {
    if others(conversation, self_id).count() == 1 && message.attachments.is_empty() {
        MessageRecord::Sms(sms_element(message, conversation, self_id))
    } else {
        MessageRecord::Mms(mms_element(message, conversation, self_id))
    }
}

fn sms_element(message: &Message, conversation: &Conversation, self_id: Option<&str>) -> Element {
    let sent = self_id == Some(message.sender_id.as_str());
    Element::new("sms")
        .attr("protocol", 0)
        .attr("address", display_address(conversation, self_id))
        .attr("date", message.timestamp)
        .attr("type", if sent { 2 } else { 1 })
        .attr_opt("subject", None::<&str>)
        .attr_opt("body", message.text.as_deref())
        .attr_opt("toa", None::<&str>)
        .attr_opt("sc_toa", None::<&str>)
        .attr_opt("service_center", None::<&str>)
        .attr("read", 1)
        .attr("status", -1)
        .attr("locked", 0)
        .attr("date_sent", 0)
        .attr("readable_date", readable_date(message.timestamp))
        .attr("contact_name", display_name(conversation, self_id))
}

fn mms_element(message: &Message, conversation: &Conversation, self_id: Option<&str>) -> Element {
    let sent = self_id == Some(message.sender_id.as_str());

    let mut parts = Element::new("parts");
    for (seq, attachment) in message.attachments.iter().enumerate() {
        parts = parts.child(part_element(seq, &attachment.url));
    }
    if let Some(text) = message.text.as_deref()
        && !text.is_empty()
    {
        parts = parts.child(part_element(message.attachments.len(), text));
    }

    let mut addrs = Element::new("addrs");
    for participant in &conversation.participants {
        let is_self = self_id == Some(participant.id.as_str());
        let is_sender = participant.id == message.sender_id;
        // The owner only gets an address entry when they sent the message;
        // the importer substitutes the device's own number for the token.
        if is_self && !is_sender {
            continue;
        }
        let address = if is_self {
            Some(SELF_ADDRESS_TOKEN.to_owned())
        } else {
            participant.phone_number.clone()
        };
        addrs = addrs.child(
            Element::new("addr")
                .attr_opt("address", address)
                .attr("type", if is_sender { 137 } else { 151 })
                .attr("charset", CHARSET_UTF8),
        );
    }

    Element::new("mms")
        .attr("text_only", i32::from(message.attachments.is_empty()))
        .attr("ct_t", CONTENT_TYPE)
        .attr("msg_box", if sent { 2 } else { 1 })
        .attr_opt("sub", None::<&str>)
        .attr("v", 18)
        .attr("seen", 0)
        .attr("rr", 129)
        .attr_opt("ct_cls", None::<&str>)
        .attr_opt("retr_txt_cs", None::<&str>)
        .attr_opt("ct_l", None::<&str>)
        .attr_opt("m_size", None::<&str>)
        .attr_opt("exp", None::<&str>)
        .attr_opt("sub_cs", None::<&str>)
        .attr_opt("st", None::<&str>)
        .attr("creator", CREATOR)
        .attr_opt("tr_id", None::<&str>)
        .attr("sub_id", -1)
        .attr("read", 1)
        .attr("date", message.timestamp)
        .attr_opt("resp_st", None::<&str>)
        .attr_opt("m_id", None::<&str>)
        .attr("date_sent", message.timestamp)
        .attr("pri", 129)
        .attr("m_type", if sent { 128 } else { 132 })
        .attr("address", display_address(conversation, self_id))
        .attr("d_rpt", 129)
        .attr_opt("d_tm", None::<&str>)
        .attr_opt("read_status", None::<&str>)
        .attr("m_cls", "personal")
        .attr_opt("retr_st", None::<&str>)
        .attr("readable_date", readable_date(message.timestamp))
        .attr("contact_name", display_name(conversation, self_id))
        .child(parts)
        .child(addrs)
}

fn part_element(seq: usize, text: &str) -> Element {
    let name = format!("part-{seq}");
    Element::new("part")
        .attr("seq", seq)
        .attr("ct", "text/plain")
        .attr("name", &name)
        .attr("chset", CHARSET_UTF8)
        .attr_opt("cd", None::<&str>)
        .attr("fn", &name)
        .attr_opt("cid", None::<&str>)
        .attr_opt("cl", None::<&str>)
        .attr_opt("ctt_s", None::<&str>)
        .attr_opt("ctt_t", None::<&str>)
        .attr("text", text)
}

/// Renders one conversation, partitioning its messages into SMS and MMS
/// lists while preserving relative order within each.
#[must_use]
pub fn render_conversation(
    conversation: &Conversation,
    self_id: Option<&str>,
) -> (Vec<Element>, Vec<Element>) {
    let mut smses = Vec::new();
    let mut mmses = Vec::new();
    for message in &conversation.messages {
        match render_message(message, conversation, self_id) {
            MessageRecord::Sms(elem) => smses.push(elem),
            MessageRecord::Mms(elem) => mmses.push(elem),
        }
    }
    (smses, mmses)
}

/// Renders a parsed archive as a complete backup document.
///
/// Conversations are rendered in source order; all SMS records come first,
/// then all MMS records, with no global chronological re-sort. The root
/// element carries the total record count and the backup timestamp.
#[must_use]
pub fn render_archive(archive: &Archive, opts: &RenderOptions) -> Document {
    let self_id = archive.self_id.as_deref();

    let mut smses = Vec::new();
    let mut mmses = Vec::new();
    for conversation in &archive.conversations {
        let (sms, mms) = render_conversation(conversation, self_id);
        smses.extend(sms);
        mmses.extend(mms);
    }

    let backup_date = opts
        .backup_date
        .unwrap_or_else(|| Utc::now().timestamp_millis());

    let root = Element::new("smses")
        .attr("count", smses.len() + mmses.len())
        .attr("backup_date", backup_date)
        .children(smses)
        .children(mmses);

    Document::new(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Attachment, AttachmentKind};

    const SELF: &str = "owner";
    const OTHER: &str = "friend";

    fn participant(id: &str, name: &str, phone: Option<&str>) -> Participant {
        Participant {
            id: id.into(),
            name: Some(name.into()),
            phone_number: phone.map(Into::into),
        }
    }

    fn message(sender: &str, text: Option<&str>, attachments: Vec<Attachment>) -> Message {
        Message {
            conversation_id: "conv1".into(),
            sender_id: sender.into(),
            timestamp: 1_397_001_600_000, // Wed Apr 09 2014 UTC
            event_id: "ev1".into(),
            event_type: "REGULAR_CHAT_MESSAGE".into(),
            text: text.map(Into::into),
            attachments,
        }
    }

    fn image(url: &str) -> Attachment {
        Attachment {
            kind: AttachmentKind::Image,
            url: url.into(),
        }
    }

    fn two_party(messages: Vec<Message>) -> Conversation {
        Conversation {
            id: "conv1".into(),
            participants: vec![
                participant(SELF, "Me", None),
                participant(OTHER, "Alice", Some("+15551234567")),
            ],
            messages,
        }
    }

    fn group(messages: Vec<Message>) -> Conversation {
        Conversation {
            id: "conv1".into(),
            participants: vec![
                participant(SELF, "Me", None),
                participant(OTHER, "Alice", Some("+15551234567")),
                participant("friend2", "Bob", Some("+15559876543")),
            ],
            messages,
        }
    }

    fn archive(conversations: Vec<Conversation>) -> Archive {
        Archive {
            conversations,
            self_id: Some(SELF.into()),
        }
    }

    fn expect_sms(record: MessageRecord) -> Element {
        match record {
            MessageRecord::Sms(elem) => elem,
            MessageRecord::Mms(other) => panic!("Expected SMS, got MMS {other:?}"),
        }
    }

    fn expect_mms(record: MessageRecord) -> Element {
        match record {
            MessageRecord::Mms(elem) => elem,
            MessageRecord::Sms(other) => panic!("Expected MMS, got SMS {other:?}"),
        }
    }

    #[test]
    fn two_party_text_message_is_sms() {
        let convo = two_party(vec![]);
        let record = render_message(&message(OTHER, Some("hi"), vec![]), &convo, Some(SELF));
        assert!(matches!(record, MessageRecord::Sms(_)));
    }

    #[test]
    fn group_thread_message_is_mms() {
        let convo = group(vec![]);
        let record = render_message(&message(OTHER, Some("hi"), vec![]), &convo, Some(SELF));
        assert!(matches!(record, MessageRecord::Mms(_)));
    }

    #[test]
    fn attachment_forces_mms_even_in_two_party_thread() {
        let convo = two_party(vec![]);
        let record = render_message(
            &message(OTHER, None, vec![image("https://example.com/p.jpg")]),
            &convo,
            Some(SELF),
        );
        assert!(matches!(record, MessageRecord::Mms(_)));
    }

    #[test]
    fn sent_sms_has_type_two() {
        let convo = two_party(vec![]);
        let sms = expect_sms(render_message(
            &message(SELF, Some("hi"), vec![]),
            &convo,
            Some(SELF),
        ));
        assert_eq!(sms.attribute("type"), Some("2"));
    }

    #[test]
    fn received_sms_has_type_one() {
        let convo = two_party(vec![]);
        let sms = expect_sms(render_message(
            &message(OTHER, Some("hi"), vec![]),
            &convo,
            Some(SELF),
        ));
        assert_eq!(sms.attribute("type"), Some("1"));
    }

    #[test]
    fn sms_carries_address_contact_name_and_dates() {
        let convo = two_party(vec![]);
        let sms = expect_sms(render_message(
            &message(OTHER, Some("hi"), vec![]),
            &convo,
            Some(SELF),
        ));
        assert_eq!(sms.attribute("protocol"), Some("0"));
        assert_eq!(sms.attribute("address"), Some("+15551234567"));
        assert_eq!(sms.attribute("contact_name"), Some("Alice"));
        assert_eq!(sms.attribute("date"), Some("1397001600000"));
        assert_eq!(sms.attribute("readable_date"), Some("Wed Apr 09 2014"));
        assert_eq!(sms.attribute("body"), Some("hi"));
        assert_eq!(sms.attribute("read"), Some("1"));
        assert_eq!(sms.attribute("status"), Some("-1"));
        assert_eq!(sms.attribute("locked"), Some("0"));
    }

    #[test]
    fn sms_without_text_has_null_body() {
        let convo = two_party(vec![]);
        let sms = expect_sms(render_message(&message(OTHER, None, vec![]), &convo, Some(SELF)));
        assert_eq!(sms.attribute("body"), Some("null"));
    }

    #[test]
    fn group_address_joins_numbers_with_tilde() {
        let convo = group(vec![]);
        let mms = expect_mms(render_message(
            &message(OTHER, Some("hi"), vec![]),
            &convo,
            Some(SELF),
        ));
        assert_eq!(mms.attribute("address"), Some("+15551234567~+15559876543"));
        assert_eq!(mms.attribute("contact_name"), Some("Alice, Bob"));
    }

    #[test]
    fn mms_fixed_fields() {
        let convo = group(vec![]);
        let mms = expect_mms(render_message(
            &message(OTHER, Some("hi"), vec![]),
            &convo,
            Some(SELF),
        ));
        assert_eq!(
            mms.attribute("ct_t"),
            Some("application/vnd.wap.multipart.related")
        );
        assert_eq!(mms.attribute("v"), Some("18"));
        assert_eq!(mms.attribute("rr"), Some("129"));
        assert_eq!(mms.attribute("d_rpt"), Some("129"));
        assert_eq!(mms.attribute("pri"), Some("129"));
        assert_eq!(mms.attribute("sub_id"), Some("-1"));
        assert_eq!(mms.attribute("m_cls"), Some("personal"));
        assert_eq!(mms.attribute("sub"), Some("null"));
        assert_eq!(mms.attribute("creator"), Some(CREATOR));
    }

    #[test]
    fn mms_direction_fields() {
        let convo = group(vec![]);
        let sent = expect_mms(render_message(
            &message(SELF, Some("hi"), vec![]),
            &convo,
            Some(SELF),
        ));
        assert_eq!(sent.attribute("msg_box"), Some("2"));
        assert_eq!(sent.attribute("m_type"), Some("128"));

        let received = expect_mms(render_message(
            &message(OTHER, Some("hi"), vec![]),
            &convo,
            Some(SELF),
        ));
        assert_eq!(received.attribute("msg_box"), Some("1"));
        assert_eq!(received.attribute("m_type"), Some("132"));
    }

    #[test]
    fn text_only_reflects_attachment_presence() {
        let convo = group(vec![]);
        let without = expect_mms(render_message(
            &message(OTHER, Some("hi"), vec![]),
            &convo,
            Some(SELF),
        ));
        assert_eq!(without.attribute("text_only"), Some("1"));

        let with = expect_mms(render_message(
            &message(OTHER, Some("hi"), vec![image("https://example.com/p.jpg")]),
            &convo,
            Some(SELF),
        ));
        assert_eq!(with.attribute("text_only"), Some("0"));
    }

    #[test]
    fn attachments_become_sequential_parts_with_trailing_text_part() {
        let convo = two_party(vec![]);
        let mms = expect_mms(render_message(
            &message(
                OTHER,
                Some("look"),
                vec![
                    image("https://example.com/1.jpg"),
                    image("https://example.com/2.jpg"),
                ],
            ),
            &convo,
            Some(SELF),
        ));

        let parts = &mms.child_elements()[0];
        assert_eq!(parts.name(), "parts");
        let part = parts.child_elements();
        assert_eq!(part.len(), 3);

        assert_eq!(part[0].attribute("seq"), Some("0"));
        assert_eq!(part[0].attribute("name"), Some("part-0"));
        assert_eq!(part[0].attribute("fn"), Some("part-0"));
        assert_eq!(part[0].attribute("text"), Some("https://example.com/1.jpg"));
        assert_eq!(part[0].attribute("chset"), Some("106"));
        assert_eq!(part[0].attribute("ct"), Some("text/plain"));

        assert_eq!(part[1].attribute("seq"), Some("1"));
        assert_eq!(part[1].attribute("text"), Some("https://example.com/2.jpg"));

        assert_eq!(part[2].attribute("seq"), Some("2"));
        assert_eq!(part[2].attribute("name"), Some("part-2"));
        assert_eq!(part[2].attribute("text"), Some("look"));
    }

    #[test]
    fn no_trailing_part_without_text() {
        let convo = two_party(vec![]);
        for text in [None, Some("")] {
            let mms = expect_mms(render_message(
                &message(OTHER, text, vec![image("https://example.com/p.jpg")]),
                &convo,
                Some(SELF),
            ));
            assert_eq!(mms.child_elements()[0].child_elements().len(), 1);
        }
    }

    #[test]
    fn addrs_exclude_self_for_received_message() {
        let convo = group(vec![]);
        let mms = expect_mms(render_message(
            &message(OTHER, Some("hi"), vec![]),
            &convo,
            Some(SELF),
        ));

        let addrs = &mms.child_elements()[1];
        assert_eq!(addrs.name(), "addrs");
        let addr = addrs.child_elements();
        assert_eq!(addr.len(), 2);

        assert_eq!(addr[0].attribute("address"), Some("+15551234567"));
        assert_eq!(addr[0].attribute("type"), Some("137")); // sender
        assert_eq!(addr[1].attribute("address"), Some("+15559876543"));
        assert_eq!(addr[1].attribute("type"), Some("151"));
        assert_eq!(addr[0].attribute("charset"), Some("106"));
    }

    #[test]
    fn self_sent_message_gets_placeholder_address_entry() {
        let convo = group(vec![]);
        let mms = expect_mms(render_message(
            &message(SELF, Some("hi"), vec![]),
            &convo,
            Some(SELF),
        ));

        let addr = mms.child_elements()[1].child_elements();
        assert_eq!(addr.len(), 3);

        let self_addr = addr
            .iter()
            .find(|a| a.attribute("address") == Some("insert-address-token"))
            .expect("self address entry");
        assert_eq!(self_addr.attribute("type"), Some("137"));

        for other in addr
            .iter()
            .filter(|a| a.attribute("address") != Some("insert-address-token"))
        {
            assert_eq!(other.attribute("type"), Some("151"));
        }
    }

    #[test]
    fn addr_without_phone_number_is_null() {
        let convo = Conversation {
            id: "conv1".into(),
            participants: vec![
                participant(SELF, "Me", None),
                participant(OTHER, "Alice", None),
                participant("friend2", "Bob", Some("+15559876543")),
            ],
            messages: vec![],
        };
        let mms = expect_mms(render_message(
            &message(OTHER, Some("hi"), vec![]),
            &convo,
            Some(SELF),
        ));
        let addr = mms.child_elements()[1].child_elements();
        assert_eq!(addr[0].attribute("address"), Some("null"));
    }

    #[test]
    fn conversation_render_partitions_preserving_order() {
        let messages = vec![
            message(OTHER, Some("first"), vec![]),
            message(OTHER, Some("photo"), vec![image("https://example.com/p.jpg")]),
            message(SELF, Some("second"), vec![]),
        ];
        let convo = two_party(messages);
        let (smses, mmses) = render_conversation(&convo, Some(SELF));

        assert_eq!(smses.len(), 2);
        assert_eq!(mmses.len(), 1);
        assert_eq!(smses[0].attribute("body"), Some("first"));
        assert_eq!(smses[1].attribute("body"), Some("second"));
    }

    #[test]
    fn archive_concatenates_in_conversation_order() {
        let first = two_party(vec![
            message(OTHER, Some("a-sms"), vec![]),
            message(OTHER, Some("a-mms"), vec![image("https://example.com/a.jpg")]),
        ]);
        let second = two_party(vec![message(OTHER, Some("b-sms"), vec![])]);
        let doc = render_archive(
            &archive(vec![first, second]),
            &RenderOptions {
                backup_date: Some(0),
            },
        );

        let children = doc.root.child_elements();
        assert_eq!(children.len(), 3);
        // SMS records from every conversation first, then MMS records.
        assert_eq!(children[0].name(), "sms");
        assert_eq!(children[0].attribute("body"), Some("a-sms"));
        assert_eq!(children[1].name(), "sms");
        assert_eq!(children[1].attribute("body"), Some("b-sms"));
        assert_eq!(children[2].name(), "mms");
    }

    #[test]
    fn root_count_equals_total_records() {
        let convo = two_party(vec![
            message(OTHER, Some("one"), vec![]),
            message(OTHER, Some("two"), vec![]),
            message(OTHER, None, vec![image("https://example.com/p.jpg")]),
        ]);
        let doc = render_archive(
            &archive(vec![convo]),
            &RenderOptions {
                backup_date: Some(0),
            },
        );
        assert_eq!(doc.root.attribute("count"), Some("3"));
        assert_eq!(doc.root.child_elements().len(), 3);
    }

    #[test]
    fn rendering_twice_is_identical_with_fixed_backup_date() {
        let convo = two_party(vec![
            message(OTHER, Some("hello"), vec![]),
            message(SELF, Some("pic"), vec![image("https://example.com/p.jpg")]),
        ]);
        let archive = archive(vec![convo]);
        let opts = RenderOptions {
            backup_date: Some(42),
        };

        let first = render_archive(&archive, &opts).to_string();
        let second = render_archive(&archive, &opts).to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn backup_date_override_appears_on_root() {
        let doc = render_archive(
            &archive(vec![]),
            &RenderOptions {
                backup_date: Some(1_700_000_000_000),
            },
        );
        assert_eq!(doc.root.attribute("backup_date"), Some("1700000000000"));
    }

    #[test]
    fn body_special_characters_are_escaped_in_output() {
        let convo = two_party(vec![message(OTHER, Some(r#"a < b & "c""#), vec![])]);
        let doc = render_archive(
            &archive(vec![convo]),
            &RenderOptions {
                backup_date: Some(0),
            },
        );
        let out = doc.to_string();
        assert!(out.contains("body=\"a &lt; b &amp; &quot;c&quot;\""));
    }

    #[test]
    fn unknown_self_treats_everyone_as_other() {
        // Without a discovered owner a two-entry thread has two "others",
        // so nothing can classify as SMS.
        let convo = two_party(vec![]);
        let record = render_message(&message(OTHER, Some("hi"), vec![]), &convo, None);
        assert!(matches!(record, MessageRecord::Mms(_)));
    }
}
