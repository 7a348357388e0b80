//! Extension points and the batch write API.
//!
//! Extension modules do not patch the sales model; they implement the traits
//! here and register into a [`SaleExtensions`] value that the order
//! processing and shipment grouping code paths receive as an explicit
//! parameter.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use entrega_core::{DomainResult, SaleLineId};

use crate::order::SaleLine;
use crate::shipment::{GroupKey, StockMove};

/// A staged value for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldValue {
    Date(Option<NaiveDate>),
}

/// Field-update mapping staged against one or more lines.
pub type LineUpdate = BTreeMap<&'static str, FieldValue>;

/// A single-field date update payload.
pub fn date_update(field: &'static str, value: Option<NaiveDate>) -> LineUpdate {
    let mut update = LineUpdate::new();
    update.insert(field, FieldValue::Date(value));
    update
}

/// A batched update: `(line ids, update)` pairs, with identical payloads
/// grouped, in first-staged order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BatchWrite {
    groups: Vec<(Vec<SaleLineId>, LineUpdate)>,
}

impl BatchWrite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `update` against `line`. Lines staged with an identical payload
    /// join the same group so the whole batch applies in one call per
    /// distinct payload.
    pub fn stage(&mut self, line: SaleLineId, update: LineUpdate) {
        if let Some((ids, _)) = self.groups.iter_mut().find(|(_, u)| *u == update) {
            ids.push(line);
        } else {
            self.groups.push((vec![line], update));
        }
    }

    pub fn groups(&self) -> &[(Vec<SaleLineId>, LineUpdate)] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of staged line updates across all groups.
    pub fn line_count(&self) -> usize {
        self.groups.iter().map(|(ids, _)| ids.len()).sum()
    }
}

/// Batch write sink: applies a staged batch atomically within the caller's
/// transaction scope.
pub trait LineWriter {
    fn write(&mut self, batch: &BatchWrite) -> DomainResult<()>;
}

/// Default-value provider for a date field on sale lines.
///
/// Invoked while a sale transitions to processing; each proposal is staged
/// against the provider's field. Returning `None` stages nothing. A provider
/// must not propose for a line whose field is already populated; that is
/// what makes the backfill idempotent.
pub trait LineDateDefault: Send + Sync {
    /// Column the proposed value is staged against.
    fn field(&self) -> &'static str;

    /// Propose a date for `line`, or `None` to leave it untouched.
    fn propose(&self, line: &SaleLine) -> Option<NaiveDate>;

    /// Value the field takes on a duplicated line.
    fn copy_default(&self) -> Option<NaiveDate> {
        None
    }
}

/// Grouping-key contributor for shipment consolidation.
pub trait ShipmentKeyContributor: Send + Sync {
    /// Adjust the grouping key computed so far for `mv`.
    fn adjust(&self, key: GroupKey, mv: &StockMove) -> GroupKey;
}

/// Registry of everything extension modules contribute to sales orders.
///
/// Built once at startup and passed to the processing and grouping code
/// paths explicitly.
#[derive(Default)]
pub struct SaleExtensions {
    line_date_defaults: Vec<Box<dyn LineDateDefault>>,
    shipment_key_contributors: Vec<Box<dyn ShipmentKeyContributor>>,
}

impl SaleExtensions {
    pub fn register_line_date_default(&mut self, provider: Box<dyn LineDateDefault>) {
        self.line_date_defaults.push(provider);
    }

    pub fn register_shipment_key_contributor(&mut self, contributor: Box<dyn ShipmentKeyContributor>) {
        self.shipment_key_contributors.push(contributor);
    }

    pub fn line_date_defaults(&self) -> &[Box<dyn LineDateDefault>] {
        &self.line_date_defaults
    }

    pub fn shipment_key_contributors(&self) -> &[Box<dyn ShipmentKeyContributor>] {
        &self.shipment_key_contributors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn stage_groups_identical_payloads() {
        let a = SaleLineId::new();
        let b = SaleLineId::new();
        let c = SaleLineId::new();

        let mut batch = BatchWrite::new();
        batch.stage(a, date_update("requested_delivery_date", Some(date(2024, 5, 1))));
        batch.stage(b, date_update("requested_delivery_date", Some(date(2024, 5, 2))));
        batch.stage(c, date_update("requested_delivery_date", Some(date(2024, 5, 1))));

        assert_eq!(batch.groups().len(), 2);
        assert_eq!(batch.line_count(), 3);
        assert_eq!(batch.groups()[0].0, vec![a, c]);
        assert_eq!(batch.groups()[1].0, vec![b]);
    }

    #[test]
    fn staged_order_is_first_seen_order() {
        let a = SaleLineId::new();
        let b = SaleLineId::new();

        let mut batch = BatchWrite::new();
        batch.stage(a, date_update("requested_delivery_date", None));
        batch.stage(b, date_update("requested_delivery_date", Some(date(2024, 5, 2))));

        let payloads: Vec<_> = batch.groups().iter().map(|(_, u)| u.clone()).collect();
        assert_eq!(payloads[0], date_update("requested_delivery_date", None));
        assert_eq!(
            payloads[1],
            date_update("requested_delivery_date", Some(date(2024, 5, 2)))
        );
    }

    #[test]
    fn update_payload_serializes_by_field_name() {
        let update = date_update("requested_delivery_date", Some(date(2024, 5, 1)));
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(
            json["requested_delivery_date"]["Date"],
            serde_json::json!("2024-05-01")
        );
    }

    proptest! {
        /// However stages arrive, every line lands in exactly one group, one
        /// group exists per distinct payload, and no two groups share one.
        #[test]
        fn staging_partitions_lines_by_payload(
            offsets in proptest::collection::vec(0i64..4, 1..20),
        ) {
            let mut batch = BatchWrite::new();
            for offset in &offsets {
                let payload_date = date(2024, 1, 1) + chrono::Duration::days(*offset);
                batch.stage(
                    SaleLineId::new(),
                    date_update("requested_delivery_date", Some(payload_date)),
                );
            }

            prop_assert_eq!(batch.line_count(), offsets.len());
            let distinct: std::collections::BTreeSet<_> = offsets.iter().collect();
            prop_assert_eq!(batch.groups().len(), distinct.len());
            for (i, (_, update)) in batch.groups().iter().enumerate() {
                for (_, other) in &batch.groups()[i + 1..] {
                    prop_assert_ne!(update, other);
                }
            }
        }
    }
}
