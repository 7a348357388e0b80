//! Infrastructure layer: sale-line persistence, schema migrations,
//! telemetry.

pub mod migrations;
pub mod store;
pub mod telemetry;

pub use migrations::{Migration, column_exists};
pub use store::SaleLineStore;
