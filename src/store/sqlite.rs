// SQLite-backed store
//
// Ids are stored as UUID text and timestamps as RFC 3339 text with a fixed
// precision, so that ordering by the text column is ordering by time.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use super::{code_constraint, CatalogRepository, RuleRepository, RULE_TRIPLE_CONSTRAINT};
use crate::catalog::{Action, Code, Id, Status, TicketType};
use crate::config::DatabaseConfig;
use crate::error::StoreError;
use crate::rules::{RuleFilter, RuleId, RuleReference, TransitionKey, TransitionRule};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database and optionally run migrations
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let options = if config.url.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(&config.url)?
        } else {
            if let Some(parent) = Path::new(&config.url).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|err| StoreError::Unavailable {
                        reason: format!("cannot create {}: {err}", parent.display()),
                    })?;
                }
            }
            SqliteConnectOptions::new().filename(&config.url)
        };
        let options = options.create_if_missing(true);

        info!(url = %config.url, "Opening SQLite store");
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        if config.auto_migrate {
            store.migrate().await?;
        }
        Ok(store)
    }

    /// Private in-memory database, migrated; it lives as long as the store
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // One connection that never expires: every in-memory connection
        // would otherwise see its own empty database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
    }
}

fn unique_or_database(err: sqlx::Error, constraint: impl Into<String>) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::UniqueViolation {
            constraint: constraint.into(),
        },
        _ => StoreError::Database(err),
    }
}

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn corrupt(column: &str, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt {
        reason: format!("column {column}: {detail}"),
    }
}

fn id_column<E>(row: &SqliteRow, column: &str) -> Result<Id<E>, StoreError> {
    let raw: String = row.try_get(column)?;
    Id::parse_str(&raw).map_err(|err| corrupt(column, err))
}

fn code_column(row: &SqliteRow) -> Result<Code, StoreError> {
    let raw: String = row.try_get("code")?;
    Code::parse(&raw).map_err(|err| corrupt("code", err))
}

fn time_column(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, StoreError> {
    let raw: String = row.try_get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| corrupt(column, err))
}

const STATUS_COLUMNS: &str =
    "id, code, label, is_terminal, is_active, is_default, created_at, updated_at";
const ACTION_COLUMNS: &str = "id, code, label, is_active, is_default, created_at, updated_at";
const TICKET_TYPE_COLUMNS: &str =
    "id, code, label, department_id, is_active, is_default, created_at, updated_at";

fn status_from_row(row: &SqliteRow) -> Result<Status, StoreError> {
    Ok(Status {
        id: id_column(row, "id")?,
        code: code_column(row)?,
        label: row.try_get("label")?,
        is_terminal: row.try_get("is_terminal")?,
        is_active: row.try_get("is_active")?,
        is_default: row.try_get("is_default")?,
        created_at: time_column(row, "created_at")?,
        updated_at: time_column(row, "updated_at")?,
    })
}

fn action_from_row(row: &SqliteRow) -> Result<Action, StoreError> {
    Ok(Action {
        id: id_column(row, "id")?,
        code: code_column(row)?,
        label: row.try_get("label")?,
        is_active: row.try_get("is_active")?,
        is_default: row.try_get("is_default")?,
        created_at: time_column(row, "created_at")?,
        updated_at: time_column(row, "updated_at")?,
    })
}

fn ticket_type_from_row(row: &SqliteRow) -> Result<TicketType, StoreError> {
    Ok(TicketType {
        id: id_column(row, "id")?,
        code: code_column(row)?,
        label: row.try_get("label")?,
        department_id: row.try_get("department_id")?,
        is_active: row.try_get("is_active")?,
        is_default: row.try_get("is_default")?,
        created_at: time_column(row, "created_at")?,
        updated_at: time_column(row, "updated_at")?,
    })
}

// Insert and update statements share the parameter order, so one bind
// function serves both

const INSERT_STATUS: &str = r#"
    INSERT INTO statuses (id, code, label, is_terminal, is_active, is_default, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
"#;
const UPDATE_STATUS: &str = r#"
    UPDATE statuses
    SET code = ?2, label = ?3, is_terminal = ?4, is_active = ?5, is_default = ?6,
        created_at = ?7, updated_at = ?8
    WHERE id = ?1
"#;

fn bind_status<'q>(query: SqliteQuery<'q>, status: &Status) -> SqliteQuery<'q> {
    query
        .bind(status.id.to_string())
        .bind(status.code.to_string())
        .bind(status.label.clone())
        .bind(status.is_terminal)
        .bind(status.is_active)
        .bind(status.is_default)
        .bind(timestamp(&status.created_at))
        .bind(timestamp(&status.updated_at))
}

const INSERT_ACTION: &str = r#"
    INSERT INTO actions (id, code, label, is_active, is_default, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
"#;
const UPDATE_ACTION: &str = r#"
    UPDATE actions
    SET code = ?2, label = ?3, is_active = ?4, is_default = ?5, created_at = ?6, updated_at = ?7
    WHERE id = ?1
"#;

fn bind_action<'q>(query: SqliteQuery<'q>, action: &Action) -> SqliteQuery<'q> {
    query
        .bind(action.id.to_string())
        .bind(action.code.to_string())
        .bind(action.label.clone())
        .bind(action.is_active)
        .bind(action.is_default)
        .bind(timestamp(&action.created_at))
        .bind(timestamp(&action.updated_at))
}

const INSERT_TICKET_TYPE: &str = r#"
    INSERT INTO ticket_types (id, code, label, department_id, is_active, is_default, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
"#;
const UPDATE_TICKET_TYPE: &str = r#"
    UPDATE ticket_types
    SET code = ?2, label = ?3, department_id = ?4, is_active = ?5, is_default = ?6,
        created_at = ?7, updated_at = ?8
    WHERE id = ?1
"#;

fn bind_ticket_type<'q>(query: SqliteQuery<'q>, ticket_type: &TicketType) -> SqliteQuery<'q> {
    query
        .bind(ticket_type.id.to_string())
        .bind(ticket_type.code.to_string())
        .bind(ticket_type.label.clone())
        .bind(ticket_type.department_id.clone())
        .bind(ticket_type.is_active)
        .bind(ticket_type.is_default)
        .bind(timestamp(&ticket_type.created_at))
        .bind(timestamp(&ticket_type.updated_at))
}

macro_rules! impl_sqlite_catalog {
    ($entry:ty, $table:literal, $columns:ident, $from_row:ident, $bind:ident, $insert:ident, $update:ident) => {
        #[async_trait]
        impl CatalogRepository<$entry> for SqliteStore {
            async fn get_by_id(&self, id: Id<$entry>) -> Result<Option<$entry>, StoreError> {
                let sql = format!("SELECT {} FROM {} WHERE id = ?1", $columns, $table);
                let row = sqlx::query(&sql)
                    .bind(id.to_string())
                    .fetch_optional(&self.pool)
                    .await?;
                row.as_ref().map($from_row).transpose()
            }

            async fn get_by_code(&self, code: &Code) -> Result<Option<$entry>, StoreError> {
                let sql = format!("SELECT {} FROM {} WHERE code = ?1", $columns, $table);
                let row = sqlx::query(&sql)
                    .bind(code.to_string())
                    .fetch_optional(&self.pool)
                    .await?;
                row.as_ref().map($from_row).transpose()
            }

            async fn list(&self, active_only: bool) -> Result<Vec<$entry>, StoreError> {
                let sql = format!(
                    "SELECT {} FROM {} WHERE (?1 = 0 OR is_active = 1) ORDER BY created_at, code",
                    $columns, $table
                );
                let rows = sqlx::query(&sql)
                    .bind(active_only)
                    .fetch_all(&self.pool)
                    .await?;
                rows.iter().map($from_row).collect()
            }

            async fn insert(&self, entry: $entry) -> Result<(), StoreError> {
                $bind(sqlx::query($insert), &entry)
                    .execute(&self.pool)
                    .await
                    .map_err(|err| unique_or_database(err, code_constraint::<$entry>()))?;
                Ok(())
            }

            async fn update(&self, entry: $entry) -> Result<(), StoreError> {
                $bind(sqlx::query($update), &entry)
                    .execute(&self.pool)
                    .await
                    .map_err(|err| unique_or_database(err, code_constraint::<$entry>()))?;
                Ok(())
            }

            async fn remove(&self, id: Id<$entry>) -> Result<bool, StoreError> {
                let sql = format!("DELETE FROM {} WHERE id = ?1", $table);
                let result = sqlx::query(&sql)
                    .bind(id.to_string())
                    .execute(&self.pool)
                    .await?;
                Ok(result.rows_affected() > 0)
            }
        }
    };
}

impl_sqlite_catalog!(Status, "statuses", STATUS_COLUMNS, status_from_row, bind_status, INSERT_STATUS, UPDATE_STATUS);
impl_sqlite_catalog!(Action, "actions", ACTION_COLUMNS, action_from_row, bind_action, INSERT_ACTION, UPDATE_ACTION);
impl_sqlite_catalog!(
    TicketType,
    "ticket_types",
    TICKET_TYPE_COLUMNS,
    ticket_type_from_row,
    bind_ticket_type,
    INSERT_TICKET_TYPE,
    UPDATE_TICKET_TYPE
);

const RULE_COLUMNS: &str = "id, from_status_id, action_id, to_status_id, ticket_type_id, \
                            description, is_active, is_default, created_at, updated_at";

const INSERT_RULE: &str = r#"
    INSERT INTO transition_rules
        (id, from_status_id, action_id, to_status_id, ticket_type_id,
         description, is_active, is_default, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
"#;
const UPDATE_RULE: &str = r#"
    UPDATE transition_rules
    SET from_status_id = ?2, action_id = ?3, to_status_id = ?4, ticket_type_id = ?5,
        description = ?6, is_active = ?7, is_default = ?8, created_at = ?9, updated_at = ?10
    WHERE id = ?1
"#;

fn bind_rule<'q>(query: SqliteQuery<'q>, rule: &TransitionRule) -> SqliteQuery<'q> {
    query
        .bind(rule.id.to_string())
        .bind(rule.from_status.to_string())
        .bind(rule.action.to_string())
        .bind(rule.to_status.to_string())
        .bind(rule.ticket_type.to_string())
        .bind(rule.description.clone())
        .bind(rule.is_active)
        .bind(rule.is_default)
        .bind(timestamp(&rule.created_at))
        .bind(timestamp(&rule.updated_at))
}

fn rule_from_row(row: &SqliteRow) -> Result<TransitionRule, StoreError> {
    Ok(TransitionRule {
        id: id_column(row, "id")?,
        from_status: id_column(row, "from_status_id")?,
        action: id_column(row, "action_id")?,
        to_status: id_column(row, "to_status_id")?,
        ticket_type: id_column(row, "ticket_type_id")?,
        description: row.try_get("description")?,
        is_active: row.try_get("is_active")?,
        is_default: row.try_get("is_default")?,
        created_at: time_column(row, "created_at")?,
        updated_at: time_column(row, "updated_at")?,
    })
}

#[async_trait]
impl RuleRepository for SqliteStore {
    async fn get_rule(&self, id: RuleId) -> Result<Option<TransitionRule>, StoreError> {
        let sql = format!("SELECT {RULE_COLUMNS} FROM transition_rules WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(rule_from_row).transpose()
    }

    async fn find_rule(&self, key: &TransitionKey) -> Result<Option<TransitionRule>, StoreError> {
        let sql = format!(
            "SELECT {RULE_COLUMNS} FROM transition_rules \
             WHERE from_status_id = ?1 AND action_id = ?2 AND ticket_type_id = ?3"
        );
        let row = sqlx::query(&sql)
            .bind(key.from_status.to_string())
            .bind(key.action.to_string())
            .bind(key.ticket_type.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(rule_from_row).transpose()
    }

    async fn list_rules(&self, filter: &RuleFilter) -> Result<Vec<TransitionRule>, StoreError> {
        let sql = format!(
            "SELECT {RULE_COLUMNS} FROM transition_rules \
             WHERE (?1 IS NULL OR ticket_type_id = ?1) \
               AND (?2 IS NULL OR from_status_id = ?2) \
               AND (?3 IS NULL OR action_id = ?3) \
               AND (?4 = 0 OR is_active = 1) \
             ORDER BY created_at, id"
        );
        let rows = sqlx::query(&sql)
            .bind(filter.ticket_type.map(|id| id.to_string()))
            .bind(filter.from_status.map(|id| id.to_string()))
            .bind(filter.action.map(|id| id.to_string()))
            .bind(filter.active_only)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(rule_from_row).collect()
    }

    async fn insert_rule(&self, rule: TransitionRule) -> Result<(), StoreError> {
        bind_rule(sqlx::query(INSERT_RULE), &rule)
            .execute(&self.pool)
            .await
            .map_err(|err| unique_or_database(err, RULE_TRIPLE_CONSTRAINT))?;
        Ok(())
    }

    async fn update_rule(&self, rule: TransitionRule) -> Result<(), StoreError> {
        bind_rule(sqlx::query(UPDATE_RULE), &rule)
            .execute(&self.pool)
            .await
            .map_err(|err| unique_or_database(err, RULE_TRIPLE_CONSTRAINT))?;
        Ok(())
    }

    async fn remove_rule(&self, id: RuleId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM transition_rules WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_rules_referencing(&self, reference: RuleReference) -> Result<usize, StoreError> {
        let (sql, id) = match reference {
            RuleReference::Status(id) => (
                "SELECT COUNT(*) AS n FROM transition_rules WHERE from_status_id = ?1 OR to_status_id = ?1",
                id.to_string(),
            ),
            RuleReference::Action(id) => (
                "SELECT COUNT(*) AS n FROM transition_rules WHERE action_id = ?1",
                id.to_string(),
            ),
            RuleReference::TicketType(id) => (
                "SELECT COUNT(*) AS n FROM transition_rules WHERE ticket_type_id = ?1",
                id.to_string(),
            ),
        };
        let row = sqlx::query(sql).bind(id).fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("n")?;
        Ok(count as usize)
    }
}
