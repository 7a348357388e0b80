//! Stock moves and shipment grouping.
//!
//! Moves generated from sale lines are consolidated into shipments by a
//! grouping key: a sequence of `(field, value)` pairs. Two moves land in the
//! same shipment exactly when their keys are equal. Registered
//! [`ShipmentKeyContributor`]s adjust the base key per move.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use entrega_core::{ProductId, StockMoveId};

use crate::extension::SaleExtensions;
use crate::order::Sale;

/// Key field: the date a move (or the whole sale) is planned to ship.
pub const PLANNED_DATE: &str = "planned_date";

/// Key field: the warehouse shipments leave from.
pub const WAREHOUSE: &str = "warehouse";

/// Stock move lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveState {
    Draft,
    Assigned,
    Done,
    Cancelled,
}

/// A logistics record fulfilling (part of) a sale line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMove {
    pub id: StockMoveId,
    pub product: ProductId,
    pub quantity: i64,
    pub planned_date: Option<NaiveDate>,
    pub state: MoveState,
}

impl StockMove {
    pub fn planned(
        id: StockMoveId,
        product: ProductId,
        quantity: i64,
        planned_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            product,
            quantity,
            planned_date: Some(planned_date),
            state: MoveState::Draft,
        }
    }
}

/// One value of a grouping key entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum KeyValue {
    Date(Option<NaiveDate>),
    Text(String),
}

/// Shipment grouping key: ordered `(field, value)` pairs.
pub type GroupKey = Vec<(&'static str, KeyValue)>;

/// The shipping-date computation over a set of moves: the earliest planned
/// date among moves that are not cancelled. Empty when no such move carries
/// a date.
pub fn earliest_planned_date<'a>(
    moves: impl IntoIterator<Item = &'a StockMove>,
) -> Option<NaiveDate> {
    moves
        .into_iter()
        .filter(|mv| mv.state != MoveState::Cancelled)
        .filter_map(|mv| mv.planned_date)
        .min()
}

/// The base grouping key: warehouse plus the sale-level shipping date.
///
/// Identical for every move of the sale, so all of a sale's moves
/// consolidate into one shipment unless a contributor refines the key.
pub fn base_group_key(sale: &Sale) -> GroupKey {
    vec![
        (WAREHOUSE, KeyValue::Text(sale.warehouse().to_string())),
        (PLANNED_DATE, KeyValue::Date(sale.shipping_date())),
    ]
}

/// The grouping key for one move: the base key adjusted by every registered
/// contributor, in registration order.
pub fn group_key(sale: &Sale, mv: &StockMove, extensions: &SaleExtensions) -> GroupKey {
    let mut key = base_group_key(sale);
    for contributor in extensions.shipment_key_contributors() {
        key = contributor.adjust(key, mv);
    }
    key
}

/// Bucket the sale's non-cancelled moves by grouping key. Each bucket
/// becomes one shipment.
pub fn plan_shipments(
    sale: &Sale,
    extensions: &SaleExtensions,
) -> BTreeMap<GroupKey, Vec<StockMoveId>> {
    let mut buckets: BTreeMap<GroupKey, Vec<StockMoveId>> = BTreeMap::new();
    for line in sale.lines() {
        for mv in &line.moves {
            if mv.state == MoveState::Cancelled {
                continue;
            }
            buckets
                .entry(group_key(sale, mv, extensions))
                .or_default()
                .push(mv.id);
        }
    }
    buckets
}
