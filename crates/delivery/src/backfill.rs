//! Backfill provider: fills empty requested delivery dates while a sale
//! transitions to processing.

use chrono::NaiveDate;

use entrega_sales::{LineDateDefault, LineType, REQUESTED_DELIVERY_DATE, SaleLine};

use crate::derive;

/// Default-value provider for `requested_delivery_date`.
///
/// Proposes only for real product lines whose field is still empty; an
/// explicit date is never overwritten, and a second processing pass finds
/// nothing left to propose.
pub struct RequestedDateBackfill;

impl LineDateDefault for RequestedDateBackfill {
    fn field(&self) -> &'static str {
        REQUESTED_DELIVERY_DATE
    }

    fn propose(&self, line: &SaleLine) -> Option<NaiveDate> {
        if line.line_type != LineType::Line
            || line.product.is_none()
            || line.requested_delivery_date.is_some()
        {
            return None;
        }
        derive::shipping_date(line)
    }
}
