//! Shared stageload model types.
//!
//! Pure data: table specifications, load strategies, deletion filters, tenant
//! identity, and date windows. No collaborator or I/O code lives here, so both
//! the engine and external `DataSource` implementations can depend on it.

#![warn(clippy::pedantic)]

pub mod dates;
pub mod environment;
pub mod filter;
pub mod identity;
pub mod table;

pub use dates::DateRange;
pub use environment::Environment;
pub use filter::{FilterClause, ReplaceFilter};
pub use identity::ClientIdentity;
pub use table::{Granularity, InvalidTableSpec, LoadStrategy, TableSchema, TableSpec};
