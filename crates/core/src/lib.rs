//! Domain types and pure logic for the notification engine.
//!
//! Nothing in this crate performs I/O: the vocabulary enums and delivery
//! state machine, event payloads, the template engine, preference settings
//! with quiet hours, unsubscribe tokens and the default seed data all live
//! here so every other layer agrees on them.

#[macro_use]
mod text_enum;

pub mod channels;
pub mod error;
pub mod notification;
pub mod payload;
pub mod preference;
pub mod query;
pub mod seeds;
pub mod template;
pub mod templates;
pub mod types;
pub mod unsubscribe;
