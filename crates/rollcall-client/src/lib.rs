//! Connected-client capability for the messaging platform.
//!
//! The scanner never authenticates or owns a session. It is handed an
//! already-authenticated [`PlatformClient`] and only uses the handful of calls
//! defined here. [`FixtureClient`] implements the same capability from a JSON
//! fixture for offline runs and tests.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod client;
pub mod error;
pub mod fixture;

pub use client::{
    FullUser, GroupEntity, GroupKind, InputUser, ParticipantsPage, PlatformClient, RawMember,
};
pub use error::{ClientError, FloodWait, Result};
pub use fixture::{CallKind, Fixture, FixtureCall, FixtureClient, FixtureGroup, FixtureProfile};
