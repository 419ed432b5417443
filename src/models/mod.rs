//! Data models for the bookstore catalog.
//!
//! This module contains the data structures exchanged with the catalog API:
//!
//! - `Book`, `NewBook`: catalog entries and the create payload
//! - `Genre`: catalog categories
//! - `UserProfile`: the authenticated user
//! - `Transaction`, `OrderItem`, `NewTransaction`: the purchase flow
//! - `TransactionStatistics`: aggregate purchase figures
//!
//! The upstream API is mid-migration and ships two spellings for several
//! fields; the models accept both (see the serde aliases on each type).

pub mod book;
pub mod genre;
pub mod transaction;
pub mod user;

pub use book::{Book, NewBook};
pub use genre::Genre;
pub use transaction::{
    NewOrderItem, NewTransaction, OrderItem, Transaction, TransactionStatistics,
};
pub use user::UserProfile;

use serde::{Deserialize, Deserializer};

/// Deserialize an id that may arrive as a string, a number, or be absent.
pub(crate) fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
