//! Postgres helpers shared by the river merge pipeline.

pub mod schema;
pub mod sqlx;
