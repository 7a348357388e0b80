use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use entrega_core::{DomainError, DomainResult, ProductId, SaleId, SaleLineId};

use crate::extension::{BatchWrite, FieldValue, SaleExtensions};
use crate::shipment::{self, StockMove};

/// Column name of the requested delivery date on the sale-line table.
///
/// Batch-write payloads address fields by name, so the name is declared once,
/// next to the struct member it maps to.
pub const REQUESTED_DELIVERY_DATE: &str = "requested_delivery_date";

/// Kind of row a sale line represents.
///
/// Only `Line` rows carry a product and participate in shipping; `Section`
/// and `Note` rows are presentational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineType {
    Line,
    Section,
    Note,
}

/// Sale order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Draft,
    Confirmed,
    Processing,
    Done,
    Cancelled,
}

/// One row of a sale order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleLine {
    pub id: SaleLineId,
    pub line_type: LineType,
    pub description: String,
    pub product: Option<ProductId>,
    /// Unset on presentational rows.
    pub quantity: Option<i64>,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: Option<u64>,
    /// Explicit delivery request entered on the line, if any.
    pub requested_delivery_date: Option<NaiveDate>,
    /// Stock moves generated to fulfill this line.
    pub moves: Vec<StockMove>,
}

impl SaleLine {
    /// A real product row.
    pub fn product_line(
        id: SaleLineId,
        product: ProductId,
        quantity: i64,
        unit_price: u64,
    ) -> Self {
        Self {
            id,
            line_type: LineType::Line,
            description: String::new(),
            product: Some(product),
            quantity: Some(quantity),
            unit_price: Some(unit_price),
            requested_delivery_date: None,
            moves: Vec::new(),
        }
    }

    /// A presentational section header row.
    pub fn section(id: SaleLineId, description: impl Into<String>) -> Self {
        Self {
            id,
            line_type: LineType::Section,
            description: description.into(),
            product: None,
            quantity: None,
            unit_price: None,
            requested_delivery_date: None,
            moves: Vec::new(),
        }
    }

    /// A presentational free-text row.
    pub fn note(id: SaleLineId, description: impl Into<String>) -> Self {
        Self {
            id,
            line_type: LineType::Note,
            description: description.into(),
            product: None,
            quantity: None,
            unit_price: None,
            requested_delivery_date: None,
            moves: Vec::new(),
        }
    }

    /// Write a date-valued field by column name.
    pub fn set_date_field(&mut self, field: &str, value: Option<NaiveDate>) -> DomainResult<()> {
        match field {
            REQUESTED_DELIVERY_DATE => {
                self.requested_delivery_date = value;
                Ok(())
            }
            _ => Err(DomainError::validation(format!(
                "unknown date field on sale line: {field}"
            ))),
        }
    }

    /// The shipping-date computation over this line's moves: earliest
    /// planned date among the non-cancelled ones. Lines that cannot ship
    /// (no product, or no strictly positive quantity) never have one.
    pub fn shipping_date(&self) -> Option<NaiveDate> {
        if self.product.is_none() || self.quantity.unwrap_or(0) <= 0 {
            return None;
        }
        shipment::earliest_planned_date(self.moves.iter())
    }

    /// Duplicate this line under a fresh identifier.
    ///
    /// Generated moves are never carried over, and every registered default
    /// provider resets its field to the provider's copy default, so a copied
    /// line never inherits the source's explicit requested date.
    pub fn duplicate(&self, extensions: &SaleExtensions) -> DomainResult<SaleLine> {
        let mut copy = self.clone();
        copy.id = SaleLineId::new();
        copy.moves.clear();
        for provider in extensions.line_date_defaults() {
            copy.set_date_field(provider.field(), provider.copy_default())?;
        }
        Ok(copy)
    }
}

/// A sale order: ordered lines plus shipping context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sale {
    id: SaleId,
    number: String,
    warehouse: String,
    sale_date: Option<NaiveDate>,
    status: SaleStatus,
    lines: Vec<SaleLine>,
}

impl Sale {
    pub fn new(id: SaleId, number: impl Into<String>, warehouse: impl Into<String>) -> Self {
        Self {
            id,
            number: number.into(),
            warehouse: warehouse.into(),
            sale_date: None,
            status: SaleStatus::Draft,
            lines: Vec::new(),
        }
    }

    pub fn id_typed(&self) -> SaleId {
        self.id
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn warehouse(&self) -> &str {
        &self.warehouse
    }

    pub fn sale_date(&self) -> Option<NaiveDate> {
        self.sale_date
    }

    pub fn set_sale_date(&mut self, date: Option<NaiveDate>) {
        self.sale_date = date;
    }

    pub fn status(&self) -> SaleStatus {
        self.status
    }

    pub fn lines(&self) -> &[SaleLine] {
        &self.lines
    }

    pub fn is_modifiable(&self) -> bool {
        matches!(self.status, SaleStatus::Draft)
    }

    /// Append a line. Only draft sales can be modified.
    pub fn add_line(&mut self, line: SaleLine) -> DomainResult<()> {
        if !self.is_modifiable() {
            return Err(DomainError::invariant(
                "cannot modify sale once it is confirmed",
            ));
        }
        self.lines.push(line);
        Ok(())
    }

    pub fn confirm(&mut self) -> DomainResult<()> {
        if self.status != SaleStatus::Draft {
            return Err(DomainError::invariant("only draft sales can be confirmed"));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation("cannot confirm sale without lines"));
        }
        self.status = SaleStatus::Confirmed;
        Ok(())
    }

    pub fn start_processing(&mut self) -> DomainResult<()> {
        if self.status != SaleStatus::Confirmed {
            return Err(DomainError::invariant(
                "only confirmed sales can start processing",
            ));
        }
        self.status = SaleStatus::Processing;
        Ok(())
    }

    pub fn mark_done(&mut self) -> DomainResult<()> {
        if self.status != SaleStatus::Processing {
            return Err(DomainError::invariant(
                "only processing sales can be marked done",
            ));
        }
        self.status = SaleStatus::Done;
        Ok(())
    }

    pub fn cancel(&mut self) -> DomainResult<()> {
        if self.status == SaleStatus::Done {
            return Err(DomainError::invariant("done sales cannot be cancelled"));
        }
        self.status = SaleStatus::Cancelled;
        Ok(())
    }

    /// The sale-level shipping date: earliest planned date across the moves
    /// of every line. Empty when no move carries a date yet.
    pub fn shipping_date(&self) -> Option<NaiveDate> {
        shipment::earliest_planned_date(self.lines.iter().flat_map(|line| line.moves.iter()))
    }

    /// Apply a staged batch to the lines of this sale (in-memory half of the
    /// batch write API). Returns how many line updates matched this sale.
    pub fn apply_batch(&mut self, batch: &BatchWrite) -> DomainResult<usize> {
        let mut applied = 0;
        for (line_ids, update) in batch.groups() {
            for line in self.lines.iter_mut() {
                if !line_ids.contains(&line.id) {
                    continue;
                }
                for (field, value) in update {
                    let FieldValue::Date(date) = value;
                    line.set_date_field(field, *date)?;
                }
                applied += 1;
            }
        }
        Ok(applied)
    }
}
