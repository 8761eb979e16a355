//! Lead store: validated writes and filtered, paginated reads.

use sqlx::SqlitePool;
use uuid::Uuid;

use super::models::{Lead, LeadDraft, UpdateLeadRequest};
use super::{write_error, StoreError};
use crate::filter::{Condition, LeadField, LeadFilter, Pagination, Value};
use crate::utils::{format_timestamp, now_timestamp};

/// One page of a listing plus the total number of matches
#[derive(Debug, Clone)]
pub struct LeadPage {
    pub items: Vec<Lead>,
    pub total: i64,
}

/// SQL parameter produced while rendering a filter
#[derive(Debug, Clone, PartialEq)]
enum Bind {
    Text(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
}

impl From<&Value> for Bind {
    fn from(value: &Value) -> Self {
        match value {
            Value::Text(s) => Bind::Text(s.clone()),
            Value::Integer(n) => Bind::Integer(*n),
            Value::Real(n) => Bind::Real(*n),
            Value::Bool(b) => Bind::Bool(*b),
            Value::Timestamp(dt) => Bind::Text(format_timestamp(*dt)),
        }
    }
}

/// Escape LIKE wildcards so a `contains` needle matches literally
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Column a `contains` needle is matched against. SQLite's LOWER and LIKE
/// only fold ASCII, so text is lowercased in Rust on write and the needle is
/// lowercased the same way by the translator. Emails are stored lowercased.
fn search_column(field: LeadField) -> &'static str {
    match field {
        LeadField::Company => "company_lc",
        LeadField::City => "city_lc",
        other => other.name(),
    }
}

fn lowercased(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::to_lowercase)
}

/// Render the filter as a WHERE clause with positional parameters
fn where_clause(filter: &LeadFilter) -> (String, Vec<Bind>) {
    let mut conditions = Vec::new();
    let mut bindings = Vec::new();

    for clause in filter.clauses() {
        // Column names come from a closed enum, never from user input
        let column = clause.field.name();
        match &clause.condition {
            Condition::Equals(v) => {
                conditions.push(format!("{} = ?", column));
                bindings.push(Bind::from(v));
            }
            Condition::Contains(needle) => {
                conditions.push(format!(
                    "{} LIKE ? ESCAPE '\\'",
                    search_column(clause.field)
                ));
                bindings.push(Bind::Text(like_pattern(needle)));
            }
            Condition::OneOf(values) => {
                let placeholders = vec!["?"; values.len()].join(", ");
                conditions.push(format!("{} IN ({})", column, placeholders));
                bindings.extend(values.iter().map(Bind::from));
            }
            Condition::GreaterThan(v) => {
                conditions.push(format!("{} > ?", column));
                bindings.push(Bind::from(v));
            }
            Condition::LessThan(v) => {
                conditions.push(format!("{} < ?", column));
                bindings.push(Bind::from(v));
            }
            Condition::AtLeast(v) => {
                conditions.push(format!("{} >= ?", column));
                bindings.push(Bind::from(v));
            }
            Condition::Between(low, high) => {
                conditions.push(format!("{} BETWEEN ? AND ?", column));
                bindings.push(Bind::from(low));
                bindings.push(Bind::from(high));
            }
            Condition::Within(start, end) => {
                conditions.push(format!("({0} >= ? AND {0} < ?)", column));
                bindings.push(Bind::from(start));
                bindings.push(Bind::from(end));
            }
        }
    }

    let sql = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    (sql, bindings)
}

/// Stored ids are lowercase hyphenated UUIDs; no other spelling can match
fn is_valid_id(id: &str) -> bool {
    Uuid::parse_str(id).is_ok_and(|uuid| uuid.hyphenated().to_string() == id)
}

pub async fn create_lead(db: &SqlitePool, draft: LeadDraft) -> Result<Lead, StoreError> {
    let draft = draft.validated()?;
    let id = Uuid::new_v4().to_string();
    let now = now_timestamp();

    sqlx::query(
        r#"
        INSERT INTO leads (
            id, first_name, last_name, email, phone, company, city, state,
            company_lc, city_lc, source, status, score, lead_value,
            last_activity_at, is_qualified, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&draft.first_name)
    .bind(&draft.last_name)
    .bind(&draft.email)
    .bind(&draft.phone)
    .bind(&draft.company)
    .bind(&draft.city)
    .bind(&draft.state)
    .bind(lowercased(&draft.company))
    .bind(lowercased(&draft.city))
    .bind(draft.source)
    .bind(draft.status)
    .bind(draft.score)
    .bind(draft.lead_value)
    .bind(&draft.last_activity_at)
    .bind(draft.is_qualified)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await
    .map_err(write_error)?;

    tracing::debug!(lead_id = %id, "Lead inserted");

    get_lead(db, &id).await
}

/// Filtered page, newest first. Ties on `created_at` fall back to insertion
/// order so consecutive pages never overlap.
pub async fn list_leads(
    db: &SqlitePool,
    filter: &LeadFilter,
    pagination: Pagination,
) -> Result<LeadPage, StoreError> {
    let (where_sql, bindings) = where_clause(filter);

    let count_sql = format!("SELECT COUNT(*) FROM leads {}", where_sql);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for binding in &bindings {
        count_query = match binding {
            Bind::Text(s) => count_query.bind(s),
            Bind::Integer(n) => count_query.bind(n),
            Bind::Real(n) => count_query.bind(n),
            Bind::Bool(b) => count_query.bind(b),
        };
    }
    let total = count_query.fetch_one(db).await?;

    let sql = format!(
        "SELECT * FROM leads {} ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
        where_sql
    );
    let mut query = sqlx::query_as::<_, Lead>(&sql);
    for binding in &bindings {
        query = match binding {
            Bind::Text(s) => query.bind(s),
            Bind::Integer(n) => query.bind(n),
            Bind::Real(n) => query.bind(n),
            Bind::Bool(b) => query.bind(b),
        };
    }
    let items = query
        .bind(pagination.limit)
        .bind(pagination.skip())
        .fetch_all(db)
        .await?;

    Ok(LeadPage { items, total })
}

pub async fn get_lead(db: &SqlitePool, id: &str) -> Result<Lead, StoreError> {
    if !is_valid_id(id) {
        return Err(StoreError::NotFound);
    }

    sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(StoreError::NotFound)
}

/// Merge `update` into the stored lead, re-validate the result and persist it
pub async fn update_lead(
    db: &SqlitePool,
    id: &str,
    update: UpdateLeadRequest,
) -> Result<Lead, StoreError> {
    let existing = get_lead(db, id).await?;
    let draft = existing.merged(update).validated()?;
    let now = now_timestamp();

    let result = sqlx::query(
        r#"
        UPDATE leads SET
            first_name = ?, last_name = ?, email = ?, phone = ?, company = ?,
            city = ?, state = ?, company_lc = ?, city_lc = ?,
            source = ?, status = ?, score = ?, lead_value = ?,
            last_activity_at = ?, is_qualified = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&draft.first_name)
    .bind(&draft.last_name)
    .bind(&draft.email)
    .bind(&draft.phone)
    .bind(&draft.company)
    .bind(&draft.city)
    .bind(&draft.state)
    .bind(lowercased(&draft.company))
    .bind(lowercased(&draft.city))
    .bind(draft.source)
    .bind(draft.status)
    .bind(draft.score)
    .bind(draft.lead_value)
    .bind(&draft.last_activity_at)
    .bind(draft.is_qualified)
    .bind(&now)
    .bind(id)
    .execute(db)
    .await
    .map_err(write_error)?;

    // Deleted between the read and the write
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }

    get_lead(db, id).await
}

pub async fn delete_lead(db: &SqlitePool, id: &str) -> Result<(), StoreError> {
    if !is_valid_id(id) {
        return Err(StoreError::NotFound);
    }

    let result = sqlx::query("DELETE FROM leads WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}
