//! Sales Orders domain module.
//!
//! This crate contains the sales-order model and its extension points,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no
//! storage). Modules that add behavior to sales orders (default values for
//! line fields, shipment grouping criteria) implement the traits in
//! [`extension`] and are handed to the processing and grouping code paths
//! explicitly.

pub mod extension;
pub mod order;
pub mod process;
pub mod shipment;

pub use extension::{
    BatchWrite, FieldValue, LineDateDefault, LineUpdate, LineWriter, SaleExtensions,
    ShipmentKeyContributor, date_update,
};
pub use order::{LineType, REQUESTED_DELIVERY_DATE, Sale, SaleLine, SaleStatus};
pub use process::{apply_and_transition, process, stage_line_defaults};
pub use shipment::{GroupKey, KeyValue, MoveState, PLANNED_DATE, StockMove, plan_shipments};
