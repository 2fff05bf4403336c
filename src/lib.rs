// SPDX-License-Identifier: GPL-3.0-only

//! Convert Google Hangouts chat exports to SMS Backup & Restore XML.
//!
//! This crate transforms the `Hangouts.json` file produced by Google Takeout
//! into the XML backup format understood by the SMS Backup & Restore Android
//! application, so old Hangouts conversations can be imported as SMS/MMS
//! history.
//!
//! # Overview
//!
//! A Hangouts export contains conversations, their participants, and an
//! ordered list of chat events. This crate:
//!
//! 1. Parses the JSON structure into typed Rust representations
//! 2. Discovers the archive owner's identity by frequency analysis
//! 3. Classifies each message as SMS (two-party, text only) or MMS
//!    (group thread or attachments) and renders the backup XML
//!
//! # Example
//!
//! ```no_run
//! use hangouts2sms::{parser, renderer};
//!
//! let json = std::fs::read_to_string("Hangouts.json").unwrap();
//! let archive = parser::parse_archive(&json).unwrap();
//!
//! let opts = renderer::RenderOptions::default();
//! let document = renderer::render_archive(&archive, &opts);
//! println!("{document}");
//! ```
//!
//! # Modules
//!
//! - [`parser`]: JSON parsing and type definitions for Hangouts exports
//! - [`renderer`]: SMS/MMS classification and backup-document construction
//! - [`xml`]: a minimal attribute-tree XML writer used by the renderer

#![deny(missing_docs)]

pub mod parser;
pub mod renderer;
pub mod xml;
