//! Shared types used across Rollcall.
//!
//! This module defines the identifier newtypes, the `Member` record, the
//! per-group `ScanResult` snapshot and the merge rule that keeps repeated
//! scans of the same group from losing data.

use crate::error::RollcallError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

/// Validate the string form of a (possibly large, possibly negative) platform id.
fn validate_numeric_id(kind: &str, id: &str) -> Result<(), RollcallError> {
    static ID_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = ID_REGEX.get_or_init(|| Regex::new(r"^-?[0-9]{1,20}$").expect("valid regex"));

    if regex.is_match(id) {
        Ok(())
    } else {
        Err(RollcallError::Validation(format!(
            "invalid {kind} ID: must be a signed integer, got '{id}'"
        )))
    }
}

/// Newtype for member identifiers.
///
/// The platform hands out 64-bit (and occasionally wider) signed integers;
/// they are kept in string form so no precision is lost on the way through
/// JSON or SQLite.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemberId(String);

impl MemberId {
    /// Create a new `MemberId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is not a signed integer.
    pub fn new(id: impl Into<String>) -> Result<Self, RollcallError> {
        let id = id.into();
        validate_numeric_id("member", &id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for MemberId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl TryFrom<String> for MemberId {
    type Error = RollcallError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MemberId> for String {
    fn from(id: MemberId) -> Self {
        id.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype for group/channel identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupId(String);

impl GroupId {
    /// Create a new `GroupId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is not a signed integer.
    pub fn new(id: impl Into<String>) -> Result<Self, RollcallError> {
        let id = id.into();
        validate_numeric_id("group", &id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for GroupId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl TryFrom<String> for GroupId {
    type Error = RollcallError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GroupId> for String {
    fn from(id: GroupId) -> Self {
        id.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wrapper around `chrono::DateTime<Utc>` for consistent timestamp handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current moment.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Parse a timestamp from an RFC3339 string.
    pub fn from_rfc3339(s: &str) -> Result<Self, RollcallError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| RollcallError::Validation(format!("invalid timestamp '{s}': {e}")))
    }

    /// Format as RFC3339 string.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

/// A group member as recorded in a scan report.
///
/// Identity is the `id` alone; every other field may be refined by a later
/// scan. `is_public_phone` is derived from the phone number, so the phone is
/// only reachable through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Stable platform identifier
    pub id: MemberId,
    /// Public handle, without the leading `@`
    pub username: Option<String>,
    /// First name as shown by the platform
    pub first_name: String,
    /// Last name as shown by the platform
    pub last_name: String,
    phone_number: Option<String>,
    /// When the member joined, or when they were first discovered
    pub join_date: Timestamp,
    /// Whether the member has posted in the group
    pub has_messaged: bool,
    /// Whether the member has reacted to a message in the group
    pub has_reacted: bool,
}

impl Member {
    /// Create a member with no phone and no behavioral flags.
    #[must_use]
    pub fn new(
        id: MemberId,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        join_date: Timestamp,
    ) -> Self {
        Self {
            id,
            username: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone_number: None,
            join_date,
            has_messaged: false,
            has_reacted: false,
        }
    }

    /// Set the public handle.
    #[must_use]
    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username.filter(|u| !u.trim().is_empty());
        self
    }

    /// Set the resolved phone number. Blank numbers count as unresolved.
    #[must_use]
    pub fn with_phone(mut self, phone: Option<String>) -> Self {
        self.set_phone(phone);
        self
    }

    /// Replace the resolved phone number.
    pub fn set_phone(&mut self, phone: Option<String>) {
        self.phone_number = phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
    }

    /// The resolved phone number, if the platform disclosed one.
    #[must_use]
    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }

    /// True iff a phone number was resolved for this member.
    #[must_use]
    pub fn is_public_phone(&self) -> bool {
        self.phone_number.is_some()
    }

    /// First and last name joined with a space, trimmed.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Resolve two records of the same member observed at `a_seen` and `b_seen`.
    ///
    /// The record with a public phone wins; otherwise the more recently
    /// observed one. Remaining ties fall to the greater phone, then the greater
    /// username, so the outcome does not depend on argument order. Optional
    /// fields missing from the winner are filled from the other record, flags
    /// are OR-ed and the earliest join date is kept.
    #[must_use]
    pub fn reconcile(a: &Member, a_seen: Timestamp, b: &Member, b_seen: Timestamp) -> Member {
        let a_key = (a.is_public_phone(), a_seen, &a.phone_number, &a.username);
        let b_key = (b.is_public_phone(), b_seen, &b.phone_number, &b.username);
        let (winner, other) = if b_key > a_key { (b, a) } else { (a, b) };

        let mut merged = winner.clone();
        if merged.username.is_none() {
            merged.username.clone_from(&other.username);
        }
        if merged.first_name.is_empty() && merged.last_name.is_empty() {
            merged.first_name.clone_from(&other.first_name);
            merged.last_name.clone_from(&other.last_name);
        }
        merged.has_messaged |= other.has_messaged;
        merged.has_reacted |= other.has_reacted;
        merged.join_date = merged.join_date.min(other.join_date);
        merged
    }
}

/// One snapshot of a group's scan results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Group the snapshot belongs to
    pub group_id: GroupId,
    /// Group title at the time of the snapshot
    pub group_name: String,
    /// When the snapshot was taken
    pub timestamp: Timestamp,
    /// Members, unique by id
    pub members: Vec<Member>,
    /// Largest roster size observed during enumeration
    pub total_in_group: u64,
}

impl ScanResult {
    /// Build a snapshot, collapsing duplicate member ids.
    #[must_use]
    pub fn new(
        group_id: GroupId,
        group_name: impl Into<String>,
        timestamp: impl Into<Timestamp>,
        members: Vec<Member>,
        total_in_group: u64,
    ) -> Self {
        let timestamp = timestamp.into();
        Self {
            group_id,
            group_name: group_name.into(),
            timestamp,
            members: union_members(Vec::new(), timestamp, members, timestamp),
            total_in_group,
        }
    }

    /// Merge two snapshots of the same group.
    ///
    /// Members are unioned by id and conflicts are settled by
    /// [`Member::reconcile`]. The merged snapshot carries the newer timestamp
    /// and group name, and the larger `total_in_group`.
    ///
    /// # Errors
    /// Returns a validation error when the snapshots belong to different groups.
    pub fn merge(&self, other: &ScanResult) -> Result<ScanResult, RollcallError> {
        if self.group_id != other.group_id {
            return Err(RollcallError::Validation(format!(
                "cannot merge results of group {} into group {}",
                other.group_id, self.group_id
            )));
        }

        let (older, newer) = if (other.timestamp, &other.group_name)
            > (self.timestamp, &self.group_name)
        {
            (self, other)
        } else {
            (other, self)
        };

        Ok(ScanResult {
            group_id: newer.group_id.clone(),
            group_name: newer.group_name.clone(),
            timestamp: newer.timestamp,
            members: union_members(
                older.members.clone(),
                older.timestamp,
                newer.members.clone(),
                newer.timestamp,
            ),
            total_in_group: older.total_in_group.max(newer.total_in_group),
        })
    }

    /// Ids of members whose phone is already resolved.
    #[must_use]
    pub fn known_phone_ids(&self) -> HashSet<MemberId> {
        self.members
            .iter()
            .filter(|m| m.is_public_phone())
            .map(|m| m.id.clone())
            .collect()
    }

    /// Number of members with a resolved phone.
    #[must_use]
    pub fn public_phone_count(&self) -> usize {
        self.members.iter().filter(|m| m.is_public_phone()).count()
    }
}

/// Union `newer` into `base`, keeping `base` order and appending unseen ids.
fn union_members(
    base: Vec<Member>,
    base_seen: Timestamp,
    newer: Vec<Member>,
    newer_seen: Timestamp,
) -> Vec<Member> {
    let mut merged: Vec<(Member, Timestamp)> = Vec::with_capacity(base.len() + newer.len());
    let mut index: HashMap<MemberId, usize> = HashMap::new();

    for (member, seen) in base
        .into_iter()
        .map(|m| (m, base_seen))
        .chain(newer.into_iter().map(|m| (m, newer_seen)))
    {
        match index.get(&member.id) {
            Some(&pos) => {
                let (existing, existing_seen) = &merged[pos];
                let reconciled = Member::reconcile(existing, *existing_seen, &member, seen);
                let latest = (*existing_seen).max(seen);
                merged[pos] = (reconciled, latest);
            }
            None => {
                index.insert(member.id.clone(), merged.len());
                merged.push((member, seen));
            }
        }
    }

    merged.into_iter().map(|(member, _)| member).collect()
}
