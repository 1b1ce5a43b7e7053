// SQL layer
//
// The read-only guard, the SQLite backend the SQL tools query, and the
// demo dataset seeder.

pub mod database;
pub mod guard;
pub mod seed;

pub use database::{Database, QueryBackend, QueryParams, QueryResult};
pub use guard::{check, GuardRejection, QueryGuardDecision, SqlGuard};
pub use seed::{seed_demo, SeedOptions, SeedSummary};
