//! dg Store: `PostgreSQL` persistence behind the dispatch `Store` port.

pub mod error;
pub mod pg_store;
mod rows;
