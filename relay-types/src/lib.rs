//! # relay-types
//!
//! Wire format types for the ocsrelay authenticated request relay.
//!
//! This crate provides the types shared between the relay daemon and its
//! callers:
//! - [`RequestDescription`] - one HTTP operation a caller wants performed
//! - [`RelayFault`] - the structured errors a relay cycle can produce
//! - [`wire`] - the framed envelope codec used on the IPC channel
//! - [`WireError`] - codec-level errors

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod fault;
mod request;
pub mod wire;

pub use error::WireError;
pub use fault::RelayFault;
pub use request::RequestDescription;
