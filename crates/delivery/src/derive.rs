//! Date derivation: the on-change computations for the requested delivery
//! date and for the shipping date it shadows.
//!
//! Both are pure functions of the line; nothing here persists.

use chrono::NaiveDate;

use entrega_sales::SaleLine;

/// Proposed value for the requested delivery date.
///
/// An explicit date already on the line wins, unchanged. Otherwise the value
/// falls out of [`shipping_date`].
pub fn requested_delivery_date(line: &SaleLine) -> Option<NaiveDate> {
    if line.requested_delivery_date.is_some() {
        return line.requested_delivery_date;
    }
    shipping_date(line)
}

/// The line's shipping date, requested-date aware.
///
/// With moves present, this defers to the host computation over the moves.
/// Without moves there is nothing to compute from yet, so the explicit
/// requested date is the answer (empty until one is recorded).
pub fn shipping_date(line: &SaleLine) -> Option<NaiveDate> {
    if !line.moves.is_empty() {
        line.shipping_date()
    } else {
        line.requested_delivery_date
    }
}
