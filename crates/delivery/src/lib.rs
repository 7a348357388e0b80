//! Requested delivery date for sale lines.
//!
//! This module adds a `requested_delivery_date` field to sale lines and the
//! behavior around it:
//!
//! - an explicit date entered on the line always wins;
//! - lines without one get a date derived from their stock moves while the
//!   sale transitions to processing;
//! - shipments consolidate per distinct planned date;
//! - duplicated lines never inherit the source's requested date.
//!
//! Everything is wired into the host sales model through [`register`].

pub mod backfill;
pub mod derive;
pub mod field;
pub mod grouping;

pub use backfill::RequestedDateBackfill;
pub use field::{
    DELIVERY_DATE_FIELD, DateFieldDef, MANUAL_DELIVERY_DATE_FIELD,
    REQUESTED_DELIVERY_DATE_FIELD,
};
pub use grouping::PlannedDateGrouping;

use entrega_sales::SaleExtensions;

/// Register this module's contributions into the host registry.
pub fn register(extensions: &mut SaleExtensions) {
    extensions.register_line_date_default(Box::new(RequestedDateBackfill));
    extensions.register_shipment_key_contributor(Box::new(PlannedDateGrouping));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use entrega_core::{ProductId, SaleId, SaleLineId, StockMoveId};
    use entrega_sales::{Sale, SaleLine, SaleStatus, StockMove, plan_shipments, process};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct NullWriter;

    impl entrega_sales::LineWriter for NullWriter {
        fn write(&mut self, _batch: &entrega_sales::BatchWrite) -> entrega_core::DomainResult<()> {
            Ok(())
        }
    }

    /// End to end: a registered module backfills dates on processing and
    /// splits shipments per planned date.
    #[test]
    fn registered_module_backfills_and_groups() {
        let mut extensions = SaleExtensions::default();
        register(&mut extensions);

        let mut sale = Sale::new(SaleId::new(), "S0100", "main");
        let mut line = SaleLine::product_line(SaleLineId::new(), ProductId::new(), 4, 100);
        let product = line.product.unwrap();
        line.moves
            .push(StockMove::planned(StockMoveId::new(), product, 2, date(2024, 11, 4)));
        line.moves
            .push(StockMove::planned(StockMoveId::new(), product, 2, date(2024, 11, 18)));
        sale.add_line(line).unwrap();
        sale.confirm().unwrap();

        let mut sales = vec![sale];
        process(&mut sales, &extensions, &mut NullWriter).unwrap();

        assert_eq!(sales[0].status(), SaleStatus::Processing);
        assert_eq!(
            sales[0].lines()[0].requested_delivery_date,
            Some(date(2024, 11, 4))
        );

        let buckets = plan_shipments(&sales[0], &extensions);
        assert_eq!(buckets.len(), 2);
    }
}
