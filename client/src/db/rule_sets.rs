//! Database operations for the rule_sets table.

use rulesync_engine::{Rule, RuleSet};
use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::{Row, SqlitePool};

/// A stored rule set row from the database.
#[derive(Debug)]
pub struct StoredRuleSet {
    pub uuid: String,
    pub name: String,
    pub description: String,
    pub rule_count: i64,
    pub create_at: i64,
    pub remote_updated_at: i64,
    pub is_official: bool,
    pub is_subscribed: bool,
    pub deleted: bool,
    pub editable: bool,
    pub rules: Vec<Rule>,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for StoredRuleSet {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let Json(rules) = row.try_get::<Json<Vec<Rule>>, _>("rules")?;
        Ok(StoredRuleSet {
            uuid: row.try_get("uuid")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            rule_count: row.try_get("rule_count")?,
            create_at: row.try_get("create_at")?,
            remote_updated_at: row.try_get("remote_updated_at")?,
            is_official: row.try_get("is_official")?,
            is_subscribed: row.try_get("is_subscribed")?,
            deleted: row.try_get("deleted")?,
            editable: row.try_get("editable")?,
            rules,
        })
    }
}

impl From<StoredRuleSet> for RuleSet {
    fn from(row: StoredRuleSet) -> Self {
        RuleSet {
            uuid: row.uuid,
            name: row.name,
            description: row.description,
            rule_count: row.rule_count,
            create_at: row.create_at,
            remote_updated_at: row.remote_updated_at,
            is_official: row.is_official,
            is_subscribed: row.is_subscribed,
            deleted: row.deleted,
            editable: row.editable,
            rules: row.rules,
        }
    }
}

/// Insert a rule set, replacing every column of an existing row with the same uuid.
pub async fn upsert_rule_set(pool: &SqlitePool, rule_set: &RuleSet) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO rule_sets (
            uuid, name, description, rule_count, create_at, remote_updated_at,
            is_official, is_subscribed, deleted, editable, rules
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT (uuid) DO UPDATE SET
            name = excluded.name,
            description = excluded.description,
            rule_count = excluded.rule_count,
            create_at = excluded.create_at,
            remote_updated_at = excluded.remote_updated_at,
            is_official = excluded.is_official,
            is_subscribed = excluded.is_subscribed,
            deleted = excluded.deleted,
            editable = excluded.editable,
            rules = excluded.rules
        "#,
    )
    .bind(&rule_set.uuid)
    .bind(&rule_set.name)
    .bind(&rule_set.description)
    .bind(rule_set.rule_count)
    .bind(rule_set.create_at)
    .bind(rule_set.remote_updated_at)
    .bind(rule_set.is_official)
    .bind(rule_set.is_subscribed)
    .bind(rule_set.deleted)
    .bind(rule_set.editable)
    .bind(Json(&rule_set.rules))
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a rule set by uuid, tombstones included.
pub async fn get_rule_set(pool: &SqlitePool, uuid: &str) -> Result<Option<RuleSet>, sqlx::Error> {
    let row = sqlx::query_as::<_, StoredRuleSet>(
        r#"
        SELECT uuid, name, description, rule_count, create_at, remote_updated_at,
               is_official, is_subscribed, deleted, editable, rules
        FROM rule_sets
        WHERE uuid = ?1
        "#,
    )
    .bind(uuid)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(RuleSet::from))
}

/// Mark a rule set deleted. Returns `false` when no row has this uuid.
pub async fn soft_delete_rule_set(pool: &SqlitePool, uuid: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE rule_sets SET deleted = TRUE WHERE uuid = ?1")
        .bind(uuid)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Get all live (non-deleted) rule sets, oldest first.
pub async fn get_live_rule_sets(pool: &SqlitePool) -> Result<Vec<RuleSet>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StoredRuleSet>(
        r#"
        SELECT uuid, name, description, rule_count, create_at, remote_updated_at,
               is_official, is_subscribed, deleted, editable, rules
        FROM rule_sets
        WHERE deleted = FALSE
        ORDER BY create_at ASC, uuid ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(RuleSet::from).collect())
}

/// Uuids of live, subscribed rule sets.
pub async fn get_subscribed_uuids(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT uuid FROM rule_sets
        WHERE deleted = FALSE AND is_subscribed = TRUE
        ORDER BY create_at ASC, uuid ASC
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Count rows, tombstones included.
pub async fn count_rule_sets(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM rule_sets")
        .fetch_one(pool)
        .await
}
