//! SQLite-backed sale line store.
//!
//! Carries the persisted half of the batch write API: a staged
//! [`BatchWrite`] applies inside one transaction, one `UPDATE` per distinct
//! payload group.

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};

use entrega_core::{SaleId, SaleLineId};
use entrega_sales::{
    BatchWrite, FieldValue, LineType, REQUESTED_DELIVERY_DATE, Sale, SaleExtensions, SaleLine,
    apply_and_transition, stage_line_defaults,
};

use crate::migrations::SALE_LINE_TABLE;

/// Date columns a batch write may address.
const WRITABLE_DATE_COLUMNS: &[&str] = &[REQUESTED_DELIVERY_DATE];

fn line_type_name(line_type: LineType) -> &'static str {
    match line_type {
        LineType::Line => "line",
        LineType::Section => "section",
        LineType::Note => "note",
    }
}

pub struct SaleLineStore {
    pool: SqlitePool,
}

impl SaleLineStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist one line row under its sale.
    pub async fn insert(&self, sale_id: SaleId, line: &SaleLine) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sale_line (
                id,
                sale_id,
                line_type,
                description,
                product_id,
                quantity,
                unit_price,
                requested_delivery_date
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(line.id.to_string())
        .bind(sale_id.to_string())
        .bind(line_type_name(line.line_type))
        .bind(&line.description)
        .bind(line.product.map(|p| p.to_string()))
        .bind(line.quantity)
        .bind(line.unit_price.map(|p| p as i64))
        .bind(line.requested_delivery_date)
        .execute(&self.pool)
        .await
        .context("failed to insert sale line")?;
        Ok(())
    }

    /// The persisted requested delivery date of one line.
    pub async fn requested_delivery_date(
        &self,
        id: SaleLineId,
    ) -> anyhow::Result<Option<NaiveDate>> {
        let row = sqlx::query("SELECT requested_delivery_date FROM sale_line WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("failed to read sale line")?
            .with_context(|| format!("sale line {id} not found"))?;
        let date = row
            .try_get::<Option<NaiveDate>, _>("requested_delivery_date")
            .context("failed to decode requested_delivery_date")?;
        Ok(date)
    }

    /// Apply a staged batch in one transaction. Returns the number of rows
    /// touched.
    pub async fn apply_batch(&self, batch: &BatchWrite) -> anyhow::Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin batch write transaction")?;
        let mut affected = 0u64;
        for (line_ids, update) in batch.groups() {
            if line_ids.is_empty() {
                continue;
            }
            for (field, value) in update {
                let FieldValue::Date(date) = value;
                if !WRITABLE_DATE_COLUMNS.contains(field) {
                    anyhow::bail!("refusing batch write to unknown column {field}");
                }
                let placeholders = (0..line_ids.len())
                    .map(|i| format!("?{}", i + 2))
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql =
                    format!("UPDATE {SALE_LINE_TABLE} SET {field} = ?1 WHERE id IN ({placeholders})");
                let mut query = sqlx::query(&sql).bind(*date);
                for id in line_ids {
                    query = query.bind(id.to_string());
                }
                let result = query
                    .execute(&mut *tx)
                    .await
                    .with_context(|| format!("batch write to {field} failed"))?;
                affected += result.rows_affected();
            }
        }
        tx.commit()
            .await
            .context("failed to commit batch write")?;
        tracing::debug!(
            rows = affected,
            groups = batch.groups().len(),
            "applied sale line batch write"
        );
        Ok(affected)
    }

    /// Process a batch of sales against the store: stage the line defaults,
    /// persist them in one transaction, then run the base transition over
    /// the in-memory sales.
    pub async fn process(
        &self,
        sales: &mut [Sale],
        extensions: &SaleExtensions,
    ) -> anyhow::Result<()> {
        let batch = stage_line_defaults(sales, extensions);
        if !batch.is_empty() {
            self.apply_batch(&batch).await?;
        }
        apply_and_transition(sales, &batch)?;
        Ok(())
    }
}
