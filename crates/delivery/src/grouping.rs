//! Shipment grouping by planned date.

use entrega_sales::{GroupKey, KeyValue, PLANNED_DATE, ShipmentKeyContributor, StockMove};

/// Group shipments by the move's own planned date, so one shipment is
/// created per distinct planned date.
///
/// Any planned-date entry already on the key (the sale-level date from the
/// base key) is dropped and a fresh per-move entry is prepended; the
/// remaining criteria keep their order.
pub struct PlannedDateGrouping;

impl ShipmentKeyContributor for PlannedDateGrouping {
    fn adjust(&self, key: GroupKey, mv: &StockMove) -> GroupKey {
        let mut adjusted: GroupKey = vec![(PLANNED_DATE, KeyValue::Date(mv.planned_date))];
        adjusted.extend(key.into_iter().filter(|(field, _)| *field != PLANNED_DATE));
        adjusted
    }
}
