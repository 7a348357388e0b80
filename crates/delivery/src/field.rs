//! Field declaration and visibility.

use entrega_sales::{LineType, REQUESTED_DELIVERY_DATE, SaleLine};

/// Former names of the requested delivery date. Data under these columns is
/// moved forward by the schema migrations in `entrega-infra`.
pub const MANUAL_DELIVERY_DATE: &str = "manual_delivery_date";
pub const DELIVERY_DATE: &str = "delivery_date";

/// Declarative date field on the sale-line record: a column name plus a
/// visibility predicate computed over the record.
pub struct DateFieldDef {
    pub name: &'static str,
    pub invisible: fn(&SaleLine) -> bool,
}

impl DateFieldDef {
    pub fn is_visible(&self, line: &SaleLine) -> bool {
        !(self.invisible)(line)
    }
}

/// Hidden unless the row is a real product line with a strictly positive
/// quantity (unset counts as zero).
fn requested_date_invisible(line: &SaleLine) -> bool {
    line.line_type != LineType::Line || line.quantity.unwrap_or(0) <= 0
}

/// Superseded fields are always hidden, independent of the record.
fn superseded(_line: &SaleLine) -> bool {
    true
}

/// The field this module adds to sale lines.
pub const REQUESTED_DELIVERY_DATE_FIELD: DateFieldDef = DateFieldDef {
    name: REQUESTED_DELIVERY_DATE,
    invisible: requested_date_invisible,
};

/// Predecessor declarations, kept only so anything still referring to them
/// resolves; both are superseded.
pub const MANUAL_DELIVERY_DATE_FIELD: DateFieldDef = DateFieldDef {
    name: MANUAL_DELIVERY_DATE,
    invisible: superseded,
};

pub const DELIVERY_DATE_FIELD: DateFieldDef = DateFieldDef {
    name: DELIVERY_DATE,
    invisible: superseded,
};

#[cfg(test)]
mod tests {
    use super::*;
    use entrega_core::{ProductId, SaleLineId};

    #[test]
    fn visible_on_positive_quantity_product_line() {
        let line = SaleLine::product_line(SaleLineId::new(), ProductId::new(), 1, 10);
        assert!(REQUESTED_DELIVERY_DATE_FIELD.is_visible(&line));
    }

    #[test]
    fn hidden_on_zero_or_negative_quantity() {
        let mut line = SaleLine::product_line(SaleLineId::new(), ProductId::new(), 0, 10);
        assert!(!REQUESTED_DELIVERY_DATE_FIELD.is_visible(&line));

        line.quantity = Some(-3);
        assert!(!REQUESTED_DELIVERY_DATE_FIELD.is_visible(&line));
    }

    #[test]
    fn hidden_on_unset_quantity() {
        let mut line = SaleLine::product_line(SaleLineId::new(), ProductId::new(), 1, 10);
        line.quantity = None;
        assert!(!REQUESTED_DELIVERY_DATE_FIELD.is_visible(&line));
    }

    #[test]
    fn hidden_on_notes_and_sections() {
        let note = SaleLine::note(SaleLineId::new(), "gift wrap");
        let section = SaleLine::section(SaleLineId::new(), "accessories");
        assert!(!REQUESTED_DELIVERY_DATE_FIELD.is_visible(&note));
        assert!(!REQUESTED_DELIVERY_DATE_FIELD.is_visible(&section));
    }

    #[test]
    fn superseded_fields_are_always_hidden() {
        let line = SaleLine::product_line(SaleLineId::new(), ProductId::new(), 5, 10);
        assert!(!MANUAL_DELIVERY_DATE_FIELD.is_visible(&line));
        assert!(!DELIVERY_DATE_FIELD.is_visible(&line));
    }
}
