//! Repository functions — one function per database operation.
//!
//! Every function takes a `&DbPool` and returns a `Result<T, DbError>`.
//! No business logic, no domain types beyond what's needed to (de)serialize
//! JSONB columns — pure SQL, run through the runtime query builder rather
//! than the compile-time-checked `query!`/`query_as!` macros, since these
//! queries are never checked against a live database during this build.

pub mod agents;
pub mod audit;
pub mod executions;
pub mod mandates;
