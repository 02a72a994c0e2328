use sqlx::PgConnection;

use std::time::Duration;

use crate::primitives::JournalStatus;

const LOCK_NOT_AVAILABLE: &str = "55P03";
const DEADLOCK_DETECTED: &str = "40P01";
const SERIALIZATION_FAILURE: &str = "40001";
pub(crate) const UNDEFINED_TABLE: &str = "42P01";
pub(crate) const OBJECT_NOT_IN_PREREQUISITE_STATE: &str = "55000";
pub(crate) const UNIQUE_VIOLATION: &str = "23505";

/// Status labels of journals whose lines count toward balances, for `status::text = ANY($n)`.
pub(crate) fn balance_affecting_statuses() -> Vec<String> {
    JournalStatus::balance_affecting()
        .iter()
        .map(ToString::to_string)
        .collect()
}

pub(crate) fn error_code(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

/// Lock timeouts, deadlocks and serialization failures. The caller may retry.
pub(crate) fn is_lock_contention(err: &sqlx::Error) -> bool {
    matches!(
        error_code(err).as_deref(),
        Some(LOCK_NOT_AVAILABLE | DEADLOCK_DETECTED | SERIALIZATION_FAILURE)
    )
}

pub(crate) fn has_code(err: &sqlx::Error, code: &str) -> bool {
    error_code(err).as_deref() == Some(code)
}

/// Scopes `lock_timeout` to the current transaction.
pub(crate) async fn set_lock_timeout(
    conn: &mut PgConnection,
    timeout: Duration,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT set_config('lock_timeout', $1, true)")
        .bind(format!("{}ms", timeout.as_millis()))
        .execute(conn)
        .await?;
    Ok(())
}

/// Transaction scoped advisory lock, namespaced by the active schema.
pub(crate) async fn advisory_xact_lock(
    conn: &mut PgConnection,
    key: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext(current_schema() || ':' || $1))")
        .bind(key)
        .execute(conn)
        .await?;
    Ok(())
}
