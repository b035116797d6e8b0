//! # relay-service
//!
//! Relay daemon bridging local IPC callers to authenticated OCS HTTP calls.
//!
//! This crate implements a daemon that:
//! - Accepts Unix-socket connections from local applications
//! - Validates each caller against an allow-list and a per-application token
//! - Performs the requested HTTP operation with credentials it alone holds
//! - Streams the raw response body back without buffering it
//!
//! ## Architecture
//!
//! ```text
//! caller ──► Unix socket ──► decode ──► authorize ──► dispatch ──► upstream
//!    ▲                                                    │
//!    └────── pipe ◄── bridge ◄── fault segment ++ body ◄──┘
//! ```
//!
//! ## Response envelope
//!
//! Every relay cycle answers with exactly one fault frame (`None` on
//! success) followed by the raw response body bytes. Failures never cross
//! the IPC boundary as transport errors; they always travel inside the
//! envelope.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accounts;
pub mod auth;
pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod relay;
pub mod server;
