//! Storage of per-group scan snapshots.
//!
//! Each group keeps exactly one row in `scan_results`: the merge of every
//! snapshot persisted for it so far. Its members live in `scan_members`,
//! ordered by `position`.

use crate::error::{DatabaseError, Result};
use rollcall_core::{GroupId, Member, MemberId, ScanResult, Timestamp};
use sqlx::{Pool, Sqlite, SqliteConnection};

type MemberRow = (
    String,
    Option<String>,
    String,
    String,
    Option<String>,
    String,
    i64,
    i64,
);

/// Timestamps are stored in a fixed-width UTC form so text order is time order.
fn encode_timestamp(ts: &Timestamp) -> String {
    ts.as_datetime()
        .to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
}

fn decode_timestamp(raw: &str) -> Result<Timestamp> {
    Timestamp::from_rfc3339(raw).map_err(|e| DatabaseError::Decode(e.to_string()))
}

fn decode_member(row: MemberRow) -> Result<Member> {
    let (id, username, first_name, last_name, phone, join_date, has_messaged, has_reacted) = row;
    let id = MemberId::new(id).map_err(|e| DatabaseError::Decode(e.to_string()))?;

    let mut member = Member::new(id, first_name, last_name, decode_timestamp(&join_date)?)
        .with_username(username)
        .with_phone(phone);
    member.has_messaged = has_messaged != 0;
    member.has_reacted = has_reacted != 0;
    Ok(member)
}

async fn load(conn: &mut SqliteConnection, group_id: &GroupId) -> Result<Option<ScanResult>> {
    let header = sqlx::query_as::<_, (String, String, i64)>(
        "SELECT group_name, timestamp, total_in_group FROM scan_results WHERE group_id = ?",
    )
    .bind(group_id.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    let Some((group_name, timestamp, total)) = header else {
        return Ok(None);
    };

    let rows = sqlx::query_as::<_, MemberRow>(
        "SELECT member_id, username, first_name, last_name, phone_number, join_date,
                has_messaged, has_reacted
         FROM scan_members
         WHERE group_id = ?
         ORDER BY position",
    )
    .bind(group_id.as_str())
    .fetch_all(&mut *conn)
    .await?;

    let members = rows
        .into_iter()
        .map(decode_member)
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(ScanResult {
        group_id: group_id.clone(),
        group_name,
        timestamp: decode_timestamp(&timestamp)?,
        members,
        total_in_group: u64::try_from(total).unwrap_or(0),
    }))
}

async fn store(conn: &mut SqliteConnection, result: &ScanResult) -> Result<()> {
    let total = i64::try_from(result.total_in_group).unwrap_or(i64::MAX);

    sqlx::query(
        "INSERT INTO scan_results (group_id, group_name, timestamp, total_in_group)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(group_id) DO UPDATE SET
             group_name = excluded.group_name,
             timestamp = excluded.timestamp,
             total_in_group = excluded.total_in_group",
    )
    .bind(result.group_id.as_str())
    .bind(&result.group_name)
    .bind(encode_timestamp(&result.timestamp))
    .bind(total)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM scan_members WHERE group_id = ?")
        .bind(result.group_id.as_str())
        .execute(&mut *conn)
        .await?;

    for (position, member) in result.members.iter().enumerate() {
        sqlx::query(
            "INSERT INTO scan_members (group_id, member_id, username, first_name, last_name,
                                       phone_number, join_date, has_messaged, has_reacted, position)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(result.group_id.as_str())
        .bind(member.id.as_str())
        .bind(member.username.as_deref())
        .bind(&member.first_name)
        .bind(&member.last_name)
        .bind(member.phone_number())
        .bind(encode_timestamp(&member.join_date))
        .bind(i64::from(member.has_messaged))
        .bind(i64::from(member.has_reacted))
        .bind(i64::try_from(position).unwrap_or(i64::MAX))
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Merge `fresh` with the stored snapshot of the same group and store the result.
///
/// Reading the old snapshot and writing the merged one happen in one
/// transaction, so concurrent writers cannot lose each other's members.
pub async fn merge_and_persist(pool: &Pool<Sqlite>, fresh: &ScanResult) -> Result<ScanResult> {
    let mut tx = pool.begin().await?;

    let merged = match load(&mut *tx, &fresh.group_id).await? {
        Some(existing) => existing.merge(fresh)?,
        None => fresh.clone(),
    };
    store(&mut *tx, &merged).await?;

    tx.commit().await?;

    tracing::debug!(
        "Persisted {} members for group {} ({} with phone)",
        merged.members.len(),
        merged.group_id,
        merged.public_phone_count()
    );
    Ok(merged)
}

/// Stored snapshot of one group, if any.
pub async fn get_by_group(pool: &Pool<Sqlite>, group_id: &GroupId) -> Result<Option<ScanResult>> {
    let mut conn = pool.acquire().await?;
    load(&mut *conn, group_id).await
}

/// All stored snapshots, most recent first.
pub async fn list_by_recency(pool: &Pool<Sqlite>) -> Result<Vec<ScanResult>> {
    let mut conn = pool.acquire().await?;

    let group_ids: Vec<String> = sqlx::query_scalar(
        "SELECT group_id FROM scan_results ORDER BY timestamp DESC, group_id ASC",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut results = Vec::with_capacity(group_ids.len());
    for raw in group_ids {
        let group_id = GroupId::new(raw).map_err(|e| DatabaseError::Decode(e.to_string()))?;
        if let Some(result) = load(&mut *conn, &group_id).await? {
            results.push(result);
        }
    }
    Ok(results)
}
