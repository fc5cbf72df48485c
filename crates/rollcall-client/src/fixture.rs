//! Offline client backed by a JSON fixture.
//!
//! The fixture lists groups with their rosters and the profiles the platform
//! would disclose. Scripted faults (flood waits, listing failures, shifting
//! pages) can be layered on top, and every call is recorded with the tokio
//! clock so timing can be asserted under a paused runtime.
//!
//! ```json
//! {
//!   "groups": [
//!     { "id": "-1001", "title": "Neighbours", "kind": "supergroup", "handle": "neighbours",
//!       "members": [ { "id": "1", "first_name": "An", "last_name": "Tran" } ] }
//!   ],
//!   "profiles": { "1": { "phone": "+84900000001" } }
//! }
//! ```

use crate::client::{
    FullUser, GroupEntity, GroupKind, InputUser, ParticipantsPage, PlatformClient, RawMember,
};
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use rollcall_core::{GroupId, MemberId};
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

/// Fixture document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixture {
    /// Groups visible to the account
    #[serde(default)]
    pub groups: Vec<FixtureGroup>,
    /// Profiles keyed by member id
    #[serde(default)]
    pub profiles: HashMap<MemberId, FixtureProfile>,
}

/// A group in the fixture.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureGroup {
    /// Platform id
    pub id: GroupId,
    /// Display title
    pub title: String,
    /// Group kind
    pub kind: GroupKind,
    /// Public handle the group can be resolved by
    #[serde(default)]
    pub handle: Option<String>,
    /// Member count the platform reports, if different from the roster
    #[serde(default)]
    pub participants_count: Option<u64>,
    /// Full roster in listing order
    #[serde(default)]
    pub members: Vec<RawMember>,
}

/// What a profile lookup discloses for one member.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureProfile {
    /// Phone number visible to the account
    #[serde(default)]
    pub phone: Option<String>,
    /// Lookup refused with this reason. Reasons mentioning `PRIVACY` are
    /// reported as [`ClientError::PrivacyRestricted`], anything else as a
    /// code 400 [`ClientError::Rpc`].
    #[serde(default)]
    pub error: Option<String>,
}

/// Kind of a recorded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// `connect`
    Connect,
    /// `list_groups`
    ListGroups,
    /// `get_entity`
    GetEntity,
    /// `get_participants`
    Participants,
    /// `get_full_chat`
    FullChat,
    /// `resolve_input_user`
    ResolveUser,
    /// `get_full_user`
    FullUser,
}

/// One recorded call.
#[derive(Debug, Clone)]
pub struct FixtureCall {
    /// Which call
    pub kind: CallKind,
    /// Handle, group id, offset or member id the call was about
    pub target: String,
    /// When the call was made, on the tokio clock
    pub at: Instant,
    /// Whether the call failed
    pub failed: bool,
}

#[derive(Debug, Default)]
struct Script {
    profile_floods: HashMap<MemberId, VecDeque<Option<u64>>>,
    page_floods: HashMap<usize, Option<u64>>,
    page_overlap: u64,
    fail_after_pages: Option<(usize, ClientError)>,
    refuse_connect: bool,
    pages_served: usize,
    participant_calls: usize,
    calls: Vec<FixtureCall>,
}

/// Offline [`PlatformClient`] driven by a [`Fixture`].
#[derive(Debug)]
pub struct FixtureClient {
    fixture: Fixture,
    members: HashMap<MemberId, RawMember>,
    connected: AtomicBool,
    script: Mutex<Script>,
}

impl FixtureClient {
    /// Build a connected client over `fixture`.
    #[must_use]
    pub fn new(fixture: Fixture) -> Self {
        let members = fixture
            .groups
            .iter()
            .flat_map(|g| g.members.iter())
            .map(|m| (m.id.clone(), m.clone()))
            .collect();

        Self {
            fixture,
            members,
            connected: AtomicBool::new(true),
            script: Mutex::new(Script::default()),
        }
    }

    /// Load a fixture from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Fixture(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&contents)
    }

    /// Parse a fixture from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let fixture: Fixture = serde_json::from_str(json)
            .map_err(|e| ClientError::Fixture(format!("invalid fixture: {e}")))?;
        tracing::debug!("Loaded fixture with {} groups", fixture.groups.len());
        Ok(Self::new(fixture))
    }

    /// Start disconnected, so the first scan has to call `connect`.
    #[must_use]
    pub fn disconnected(self) -> Self {
        self.connected.store(false, Ordering::SeqCst);
        self
    }

    /// Make every `connect` call fail.
    #[must_use]
    pub fn refusing_connections(self) -> Self {
        self.script().refuse_connect = true;
        self
    }

    /// Answer the next profile fetch of `member` with a flood wait.
    ///
    /// Repeated calls queue several consecutive flood signals.
    #[must_use]
    pub fn with_profile_flood(self, member: MemberId, seconds: Option<u64>) -> Self {
        self.script()
            .profile_floods
            .entry(member)
            .or_default()
            .push_back(seconds);
        self
    }

    /// Answer the `page`-th participants call (0-based) with a flood wait.
    #[must_use]
    pub fn with_page_flood(self, page: usize, seconds: Option<u64>) -> Self {
        self.script().page_floods.insert(page, seconds);
        self
    }

    /// Shift every page after the first back by `overlap` entries, as if
    /// members joined at the top of the list between page fetches.
    #[must_use]
    pub fn with_page_overlap(self, overlap: u64) -> Self {
        self.script().page_overlap = overlap;
        self
    }

    /// Fail every participants call once `pages` pages have been served.
    #[must_use]
    pub fn failing_after_pages(self, pages: usize, error: ClientError) -> Self {
        self.script().fail_after_pages = Some((pages, error));
        self
    }

    /// Calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<FixtureCall> {
        self.script().calls.clone()
    }

    /// Recorded calls of one kind.
    #[must_use]
    pub fn calls_of(&self, kind: CallKind) -> Vec<FixtureCall> {
        self.script()
            .calls
            .iter()
            .filter(|c| c.kind == kind)
            .cloned()
            .collect()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record<T>(&self, kind: CallKind, target: impl Into<String>, result: Result<T>) -> Result<T> {
        self.script().calls.push(FixtureCall {
            kind,
            target: target.into(),
            at: Instant::now(),
            failed: result.is_err(),
        });
        result
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ClientError::NotConnected)
        }
    }

    fn find_group(&self, handle: &str) -> Option<&FixtureGroup> {
        let handle = handle.trim_start_matches('@');
        self.fixture
            .groups
            .iter()
            .find(|g| g.id.as_str() == handle || g.handle.as_deref() == Some(handle))
    }

    fn entity(group: &FixtureGroup) -> GroupEntity {
        GroupEntity {
            id: group.id.clone(),
            title: group.title.clone(),
            kind: group.kind,
            participants_count: Some(
                group
                    .participants_count
                    .unwrap_or(group.members.len() as u64),
            ),
            access_hash: None,
        }
    }

    fn participants_page(
        &self,
        channel: &GroupEntity,
        offset: u64,
        limit: u32,
    ) -> Result<ParticipantsPage> {
        self.ensure_connected()?;

        let overlap = {
            let mut script = self.script();
            let call = script.participant_calls;
            script.participant_calls += 1;

            if let Some(seconds) = script.page_floods.remove(&call) {
                return Err(ClientError::FloodWait { seconds });
            }
            if let Some((after, error)) = &script.fail_after_pages {
                if script.pages_served >= *after {
                    return Err(error.clone());
                }
            }
            script.pages_served += 1;
            script.page_overlap
        };

        let group = self
            .find_group(channel.id.as_str())
            .ok_or_else(|| ClientError::EntityNotFound(channel.id.to_string()))?;
        if !group.kind.is_paginated() {
            return Err(ClientError::Rpc {
                code: 400,
                message: "CHANNEL_INVALID".to_string(),
            });
        }

        let len = group.members.len();
        let start = usize::try_from(if offset > 0 {
            offset.saturating_sub(overlap)
        } else {
            0
        })
        .unwrap_or(usize::MAX)
        .min(len);
        let end = start.saturating_add(limit as usize).min(len);

        Ok(ParticipantsPage {
            participants: group.members[start..end].to_vec(),
            total: Some(len as u64),
        })
    }

    fn full_user(&self, user: &InputUser) -> Result<FullUser> {
        self.ensure_connected()?;

        let flood = self
            .script()
            .profile_floods
            .get_mut(&user.id)
            .and_then(VecDeque::pop_front);
        if let Some(seconds) = flood {
            return Err(ClientError::FloodWait { seconds });
        }

        let raw = self
            .members
            .get(&user.id)
            .ok_or_else(|| ClientError::EntityNotFound(user.id.to_string()))?;
        let profile = self.fixture.profiles.get(&user.id).cloned().unwrap_or_default();
        if let Some(reason) = profile.error {
            if reason.to_ascii_uppercase().contains("PRIVACY") {
                return Err(ClientError::PrivacyRestricted(reason));
            }
            return Err(ClientError::Rpc {
                code: 400,
                message: reason,
            });
        }

        Ok(FullUser {
            id: raw.id.clone(),
            username: raw.username.clone(),
            first_name: raw.first_name.clone(),
            last_name: raw.last_name.clone(),
            phone: profile.phone,
        })
    }
}

#[async_trait]
impl PlatformClient for FixtureClient {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<()> {
        let result = if self.script().refuse_connect {
            Err(ClientError::Transport("connection refused".to_string()))
        } else {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        };
        self.record(CallKind::Connect, "", result)
    }

    async fn list_groups(&self, limit: usize) -> Result<Vec<GroupEntity>> {
        let result = self.ensure_connected().map(|()| {
            self.fixture
                .groups
                .iter()
                .take(limit)
                .map(Self::entity)
                .collect()
        });
        self.record(CallKind::ListGroups, limit.to_string(), result)
    }

    async fn get_entity(&self, handle: &str) -> Result<GroupEntity> {
        let result = self.ensure_connected().and_then(|()| {
            self.find_group(handle)
                .map(Self::entity)
                .ok_or_else(|| ClientError::EntityNotFound(handle.to_string()))
        });
        self.record(CallKind::GetEntity, handle, result)
    }

    async fn get_participants(
        &self,
        channel: &GroupEntity,
        offset: u64,
        limit: u32,
    ) -> Result<ParticipantsPage> {
        let result = self.participants_page(channel, offset, limit);
        self.record(CallKind::Participants, offset.to_string(), result)
    }

    async fn get_full_chat(&self, chat: &GroupEntity) -> Result<Vec<RawMember>> {
        let result = self.ensure_connected().and_then(|()| {
            self.find_group(chat.id.as_str())
                .map(|g| g.members.clone())
                .ok_or_else(|| ClientError::EntityNotFound(chat.id.to_string()))
        });
        self.record(CallKind::FullChat, chat.id.as_str(), result)
    }

    async fn resolve_input_user(&self, member: &RawMember) -> Result<InputUser> {
        let result = self.ensure_connected().and_then(|()| {
            if self.members.contains_key(&member.id) {
                Ok(InputUser {
                    id: member.id.clone(),
                    access_hash: member.access_hash,
                })
            } else {
                Err(ClientError::EntityNotFound(member.id.to_string()))
            }
        });
        self.record(CallKind::ResolveUser, member.id.as_str(), result)
    }

    async fn get_full_user(&self, user: &InputUser) -> Result<FullUser> {
        let result = self.full_user(user);
        self.record(CallKind::FullUser, user.id.as_str(), result)
    }
}
