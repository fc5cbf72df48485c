//! The connected-client capability and the provider data it returns.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollcall_core::{GroupId, MemberId};
use serde::{Deserialize, Serialize};

/// Capability exposed by an authenticated messaging-platform session.
///
/// Implementations own the session; the scanner only borrows it through an
/// `Arc<dyn PlatformClient>`. Implementations must be thread-safe
/// (Send + Sync) and should report throttling as
/// [`ClientError::FloodWait`](crate::ClientError::FloodWait) or as a raw
/// [`ClientError::Rpc`](crate::ClientError::Rpc) carrying the provider message.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Whether the session currently has a live connection.
    fn is_connected(&self) -> bool;

    /// (Re)establish the connection of an already-authenticated session.
    async fn connect(&self) -> Result<()>;

    /// Groups and channels visible to the account, most recent dialogs first.
    async fn list_groups(&self, limit: usize) -> Result<Vec<GroupEntity>>;

    /// Resolve a group id or public handle to an entity.
    async fn get_entity(&self, handle: &str) -> Result<GroupEntity>;

    /// One page of a channel/supergroup participant listing.
    async fn get_participants(
        &self,
        channel: &GroupEntity,
        offset: u64,
        limit: u32,
    ) -> Result<ParticipantsPage>;

    /// Full membership of a basic (non-paginated) group.
    async fn get_full_chat(&self, chat: &GroupEntity) -> Result<Vec<RawMember>>;

    /// Turn a roster entry into an input reference usable for profile lookups.
    async fn resolve_input_user(&self, member: &RawMember) -> Result<InputUser>;

    /// Fetch the full profile of a user.
    async fn get_full_user(&self, user: &InputUser) -> Result<FullUser>;
}

/// Kind of group, which decides how its roster is listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    /// Small legacy group; membership comes from a single full-info call
    BasicGroup,
    /// Supergroup; paginated participant listing
    Supergroup,
    /// Broadcast channel; paginated participant listing
    Channel,
}

impl GroupKind {
    /// Whether the roster must be fetched page by page.
    #[must_use]
    pub fn is_paginated(self) -> bool {
        !matches!(self, Self::BasicGroup)
    }
}

/// A resolved group or channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntity {
    /// Platform id
    pub id: GroupId,
    /// Display title
    pub title: String,
    /// Group kind
    pub kind: GroupKind,
    /// Member count reported by the platform, if known
    #[serde(default)]
    pub participants_count: Option<u64>,
    /// Access hash required by some calls
    #[serde(default)]
    pub access_hash: Option<i64>,
}

/// A roster entry as returned by a listing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMember {
    /// Platform id
    pub id: MemberId,
    /// Access hash required for profile lookups
    #[serde(default)]
    pub access_hash: Option<i64>,
    /// Public handle
    #[serde(default)]
    pub username: Option<String>,
    /// First name
    #[serde(default)]
    pub first_name: String,
    /// Last name
    #[serde(default)]
    pub last_name: String,
    /// Phone, when the listing call embeds it
    #[serde(default)]
    pub phone: Option<String>,
    /// Join date, when the listing call reports it
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
}

impl RawMember {
    /// Minimal roster entry with only an id and names.
    #[must_use]
    pub fn new(id: MemberId, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id,
            access_hash: None,
            username: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone: None,
            joined_at: None,
        }
    }
}

/// One page of a paginated participant listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticipantsPage {
    /// Participants in this page
    pub participants: Vec<RawMember>,
    /// Total participant count reported alongside the page
    pub total: Option<u64>,
}

/// Input reference to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputUser {
    /// Platform id
    pub id: MemberId,
    /// Access hash
    pub access_hash: Option<i64>,
}

/// Full user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullUser {
    /// Platform id
    pub id: MemberId,
    /// Public handle
    #[serde(default)]
    pub username: Option<String>,
    /// First name
    #[serde(default)]
    pub first_name: String,
    /// Last name
    #[serde(default)]
    pub last_name: String,
    /// Phone number, present only if the user discloses it to this account
    #[serde(default)]
    pub phone: Option<String>,
}
