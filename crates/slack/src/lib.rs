//! Slack integration for the legal intake bot
//!
//! This crate provides everything between the Slack HTTP surface and the
//! automation webhook:
//! - **Ingress** (`ingress`, `signature`) - decode and verify inbound bodies
//! - **Events** (`events`) - typed envelopes, acknowledgment, dispatcher
//! - **Handlers** (`commands`, `submission`, `attachments`) - `/legal`, form submit, thread files
//! - **Block Kit** (`blocks`, `form`) - the request modal and message builders
//! - **Outbound** (`api`, `webhook`) - Slack Web API and automation webhook clients
//!
//! # Architecture
//!
//! ```text
//! HTTP body → ingress → EventDispatcher → handler → ack
//!                                            ↓
//!                              SlackApi / WebhookForwarder
//! ```
//!
//! # Key Types
//!
//! - `EventDispatcher` - Routes envelopes to handlers and guarantees the ack
//! - `IntakeServices` - Injected Slack and webhook clients plus form/channel config
//! - `BackgroundTasks` - Tracked tasks for dispatch and detached webhook calls

pub mod api;
pub mod attachments;
pub mod background;
pub mod blocks;
pub mod commands;
pub mod events;
pub mod form;
pub mod ingress;
pub mod services;
pub mod signature;
pub mod submission;
pub mod webhook;

pub use services::{intake_dispatcher, IntakeServices, ServicesError};
