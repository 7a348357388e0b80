//! Versioned schema migrations for the sale-line table.
//!
//! Scripts run in strictly ascending version order and each applied version
//! is recorded in the `schema_migrations` ledger, so a second upgrade run is
//! a no-op. The legacy fixups additionally guard on column presence: an
//! upgrade may start from any historical shape of the table (fresh, the
//! `delivery_date` era, the `manual_delivery_date` era, the 3.2-era
//! `shipping_date` column) and every path converges on a single
//! `requested_delivery_date` column carrying the data.
//!
//! A failed bulk copy or column drop aborts the upgrade with the error
//! propagated; there is no partial-state recovery path.

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqliteConnection, SqlitePool};

use entrega_delivery::field::{DELIVERY_DATE, MANUAL_DELIVERY_DATE};
use entrega_sales::REQUESTED_DELIVERY_DATE;

pub const SALE_LINE_TABLE: &str = "sale_line";

/// 3.2-era installations persisted the requested date in this column.
const LEGACY_SHIPPING_DATE: &str = "shipping_date";

/// One schema migration script.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Position in the upgrade sequence; the script list must be strictly
    /// ascending.
    fn version(&self) -> i64;

    fn name(&self) -> &'static str;

    async fn apply(&self, conn: &mut SqliteConnection) -> anyhow::Result<()>;
}

/// Every migration this module ships, in order.
pub fn all() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(CreateSaleLineTable),
        Box::new(MoveDeliveryDateForward),
        Box::new(IntroduceRequestedDeliveryDate),
    ]
}

/// Apply every not-yet-applied migration and record it in the ledger.
/// Returns how many scripts ran.
pub async fn run(pool: &SqlitePool, migrations: &[Box<dyn Migration>]) -> anyhow::Result<u32> {
    let mut last = i64::MIN;
    for migration in migrations {
        if migration.version() <= last {
            anyhow::bail!(
                "migration versions must be strictly ascending (v{} follows v{})",
                migration.version(),
                last
            );
        }
        last = migration.version();
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            name       TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create schema_migrations ledger")?;

    let current: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_migrations")
        .fetch_one(pool)
        .await
        .context("failed to read schema_migrations ledger")?;
    let current = current.unwrap_or(i64::MIN);

    let mut applied = 0u32;
    for migration in migrations {
        if migration.version() <= current {
            continue;
        }
        let mut tx = pool
            .begin()
            .await
            .context("failed to begin migration transaction")?;
        migration
            .apply(&mut tx)
            .await
            .with_context(|| format!("migration v{} ({}) failed", migration.version(), migration.name()))?;
        sqlx::query("INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)")
            .bind(migration.version())
            .bind(migration.name())
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await
            .context("failed to record applied migration")?;
        tx.commit()
            .await
            .context("failed to commit migration transaction")?;
        tracing::info!(
            version = migration.version(),
            name = migration.name(),
            "applied schema migration"
        );
        applied += 1;
    }
    Ok(applied)
}

/// Column presence via sqlite's `table_info` pragma.
pub async fn column_exists(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
) -> anyhow::Result<bool> {
    let rows = sqlx::query(&format!("PRAGMA table_info('{table}')"))
        .fetch_all(&mut *conn)
        .await
        .with_context(|| format!("failed to introspect table {table}"))?;
    Ok(rows
        .iter()
        .any(|row| row.try_get::<String, _>("name").is_ok_and(|name| name == column)))
}

async fn ensure_date_column(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
) -> anyhow::Result<()> {
    if !column_exists(conn, table, column).await? {
        sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN {column} TEXT"))
            .execute(&mut *conn)
            .await
            .with_context(|| format!("failed to add column {column} to {table}"))?;
    }
    Ok(())
}

/// One legacy rename: sync the successor column into existence, and when the
/// predecessor still holds the data (successor absent until now), move every
/// row value across in one bulk update and drop the predecessor.
async fn migrate_renamed_column(
    conn: &mut SqliteConnection,
    table: &str,
    old: &str,
    new: &str,
) -> anyhow::Result<()> {
    let pending =
        column_exists(conn, table, old).await? && !column_exists(conn, table, new).await?;
    ensure_date_column(conn, table, new).await?;
    if pending {
        let moved = sqlx::query(&format!("UPDATE {table} SET {new} = {old}"))
            .execute(&mut *conn)
            .await
            .with_context(|| format!("bulk copy {old} -> {new} failed"))?;
        sqlx::query(&format!("ALTER TABLE {table} DROP COLUMN {old}"))
            .execute(&mut *conn)
            .await
            .with_context(|| format!("failed to drop legacy column {old}"))?;
        tracing::info!(
            rows = moved.rows_affected(),
            from = old,
            to = new,
            "moved legacy delivery dates"
        );
    }
    Ok(())
}

/// v1: the sale-line table as the host framework ships it.
struct CreateSaleLineTable;

#[async_trait]
impl Migration for CreateSaleLineTable {
    fn version(&self) -> i64 {
        1
    }

    fn name(&self) -> &'static str {
        "create sale_line table"
    }

    async fn apply(&self, conn: &mut SqliteConnection) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sale_line (
                id          TEXT PRIMARY KEY NOT NULL,
                sale_id     TEXT NOT NULL,
                line_type   TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                product_id  TEXT NULL,
                quantity    INTEGER NULL,
                unit_price  INTEGER NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create sale_line table")?;
        Ok(())
    }
}

/// v2: the field's oldest name, `delivery_date`, moves to
/// `manual_delivery_date`.
struct MoveDeliveryDateForward;

#[async_trait]
impl Migration for MoveDeliveryDateForward {
    fn version(&self) -> i64 {
        2
    }

    fn name(&self) -> &'static str {
        "move delivery_date to manual_delivery_date"
    }

    async fn apply(&self, conn: &mut SqliteConnection) -> anyhow::Result<()> {
        migrate_renamed_column(conn, SALE_LINE_TABLE, DELIVERY_DATE, MANUAL_DELIVERY_DATE).await
    }
}

/// v3: `requested_delivery_date` arrives. `manual_delivery_date` moves
/// forward, and 3.2-era installations that persisted the value as
/// `shipping_date` have it moved across too.
struct IntroduceRequestedDeliveryDate;

#[async_trait]
impl Migration for IntroduceRequestedDeliveryDate {
    fn version(&self) -> i64 {
        3
    }

    fn name(&self) -> &'static str {
        "introduce requested_delivery_date"
    }

    async fn apply(&self, conn: &mut SqliteConnection) -> anyhow::Result<()> {
        // Decide on the shipping_date fixup before the successor column
        // exists; after the rename below it always does.
        let move_shipping_dates = column_exists(conn, SALE_LINE_TABLE, LEGACY_SHIPPING_DATE).await?
            && !column_exists(conn, SALE_LINE_TABLE, REQUESTED_DELIVERY_DATE).await?;

        migrate_renamed_column(
            conn,
            SALE_LINE_TABLE,
            MANUAL_DELIVERY_DATE,
            REQUESTED_DELIVERY_DATE,
        )
        .await?;

        if move_shipping_dates {
            let moved = sqlx::query(&format!(
                "UPDATE {SALE_LINE_TABLE} SET {REQUESTED_DELIVERY_DATE} = {LEGACY_SHIPPING_DATE}"
            ))
            .execute(&mut *conn)
            .await
            .context("bulk copy shipping_date -> requested_delivery_date failed")?;
            sqlx::query(&format!(
                "ALTER TABLE {SALE_LINE_TABLE} DROP COLUMN {LEGACY_SHIPPING_DATE}"
            ))
            .execute(&mut *conn)
            .await
            .context("failed to drop legacy column shipping_date")?;
            tracing::info!(rows = moved.rows_affected(), "moved 3.2-era shipping dates");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        crate::telemetry::init();
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    async fn has_column(pool: &SqlitePool, column: &str) -> bool {
        let mut conn = pool.acquire().await.unwrap();
        column_exists(&mut conn, SALE_LINE_TABLE, column).await.unwrap()
    }

    /// A pre-module table shaped like a historical installation.
    async fn create_legacy_table(pool: &SqlitePool, date_column: &str) {
        sqlx::query(&format!(
            r#"
            CREATE TABLE sale_line (
                id          TEXT PRIMARY KEY NOT NULL,
                sale_id     TEXT NOT NULL,
                line_type   TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                product_id  TEXT NULL,
                quantity    INTEGER NULL,
                unit_price  INTEGER NULL,
                {date_column} TEXT NULL
            )
            "#
        ))
        .execute(pool)
        .await
        .unwrap();
        sqlx::query(&format!(
            "INSERT INTO sale_line (id, sale_id, line_type, {date_column}) \
             VALUES ('l1', 's1', 'line', '2014-05-20'), ('l2', 's1', 'line', NULL)"
        ))
        .execute(pool)
        .await
        .unwrap();
    }

    async fn requested_dates(pool: &SqlitePool) -> Vec<Option<String>> {
        sqlx::query_scalar("SELECT requested_delivery_date FROM sale_line ORDER BY id")
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn fresh_upgrade_ends_with_only_the_current_column() {
        let pool = test_pool().await;
        let applied = run(&pool, &all()).await.unwrap();
        assert_eq!(applied, 3);

        assert!(has_column(&pool, REQUESTED_DELIVERY_DATE).await);
        assert!(!has_column(&pool, MANUAL_DELIVERY_DATE).await);
        assert!(!has_column(&pool, DELIVERY_DATE).await);
        assert!(!has_column(&pool, LEGACY_SHIPPING_DATE).await);
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let pool = test_pool().await;
        run(&pool, &all()).await.unwrap();
        let applied = run(&pool, &all()).await.unwrap();
        assert_eq!(applied, 0);
    }

    #[tokio::test]
    async fn manual_delivery_date_data_moves_forward() {
        let pool = test_pool().await;
        create_legacy_table(&pool, MANUAL_DELIVERY_DATE).await;

        run(&pool, &all()).await.unwrap();

        assert!(!has_column(&pool, MANUAL_DELIVERY_DATE).await);
        assert_eq!(
            requested_dates(&pool).await,
            vec![Some("2014-05-20".to_string()), None]
        );

        // Upgrading again neither errors nor touches the data.
        let applied = run(&pool, &all()).await.unwrap();
        assert_eq!(applied, 0);
        assert_eq!(
            requested_dates(&pool).await,
            vec![Some("2014-05-20".to_string()), None]
        );
    }

    #[tokio::test]
    async fn delivery_date_data_moves_through_the_whole_chain() {
        let pool = test_pool().await;
        create_legacy_table(&pool, DELIVERY_DATE).await;

        run(&pool, &all()).await.unwrap();

        assert!(!has_column(&pool, DELIVERY_DATE).await);
        assert!(!has_column(&pool, MANUAL_DELIVERY_DATE).await);
        assert_eq!(
            requested_dates(&pool).await,
            vec![Some("2014-05-20".to_string()), None]
        );
    }

    #[tokio::test]
    async fn shipping_date_data_moves_forward() {
        let pool = test_pool().await;
        create_legacy_table(&pool, LEGACY_SHIPPING_DATE).await;

        run(&pool, &all()).await.unwrap();

        assert!(!has_column(&pool, LEGACY_SHIPPING_DATE).await);
        assert_eq!(
            requested_dates(&pool).await,
            vec![Some("2014-05-20".to_string()), None]
        );
    }

    struct Numbered(i64);

    #[async_trait]
    impl Migration for Numbered {
        fn version(&self) -> i64 {
            self.0
        }

        fn name(&self) -> &'static str {
            "numbered"
        }

        async fn apply(&self, _conn: &mut SqliteConnection) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn out_of_order_scripts_are_rejected() {
        let pool = test_pool().await;
        let migrations: Vec<Box<dyn Migration>> = vec![Box::new(Numbered(2)), Box::new(Numbered(1))];
        let err = run(&pool, &migrations).await.unwrap_err();
        assert!(err.to_string().contains("strictly ascending"));
    }
}
