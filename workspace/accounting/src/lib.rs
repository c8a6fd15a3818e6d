//! Pure accounting rules for the shared coffee stock.
//!
//! Every quantity here is *derived*: the database stores only the raw
//! counters and log rows, and both the self-serve and the
//! admin-on-behalf call sites go through these same functions so the
//! numbers can never disagree between endpoints.

mod allowance;
mod stock;

pub use allowance::remaining_allowance;
pub use stock::{derive_stock, StockDerived};
