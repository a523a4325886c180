//! Persistence gateway.
//!
//! Plain async functions over an explicit executor: a `&PgPool` for one-shot
//! reads, or `&mut *tx` when the caller holds a transaction. Every query that
//! touches a user-owned row takes the caller's id and scopes by
//! `plants.user_id`, so an id owned by someone else behaves exactly like a
//! missing one.

pub mod energy;
pub mod items;
pub mod plants;
pub mod sensor_data;
pub mod sensors;
pub mod tokens;
pub mod users;
