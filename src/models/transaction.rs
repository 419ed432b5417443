// Allow dead code: API response structs have fields for completeness
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

use crate::models::deserialize_opt_id;
use crate::utils::format_price;

/// A single purchased line item.
///
/// One upstream variant calls the title field `book_title`, the other `title`;
/// one nests items under `order_items`, the other under `items`. Aliases
/// absorb both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct OrderItem {
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub id: Option<String>,
    pub book_id: String,
    #[serde(default, alias = "title")]
    pub book_title: Option<String>,
    pub quantity: i64,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub subtotal_price: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl OrderItem {
    /// Line total, preferring the server-computed subtotal.
    pub fn subtotal(&self) -> f64 {
        self.subtotal_price
            .unwrap_or_else(|| self.price.unwrap_or(0.0) * self.quantity as f64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Transaction {
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub total_price: Option<f64>,
    #[serde(default, alias = "items")]
    pub order_items: Vec<OrderItem>,
}

impl Transaction {
    /// Transaction total, preferring the server-computed `total_price` and
    /// falling back to summing the line items.
    pub fn total(&self) -> f64 {
        self.total_price
            .unwrap_or_else(|| self.order_items.iter().map(OrderItem::subtotal).sum())
    }

    pub fn display_total(&self) -> String {
        format_price(self.total())
    }

    pub fn item_count(&self) -> usize {
        self.order_items.len()
    }
}

/// Request body for creating a transaction.
#[derive(Debug, Clone, Serialize)]
pub struct NewTransaction {
    pub user_id: String,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewOrderItem {
    pub book_id: String,
    pub quantity: i64,
}

/// Aggregate purchase statistics.
///
/// The two upstream variants disagree on both the field set and the casing,
/// so every field is optional and both spellings are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct TransactionStatistics {
    #[serde(default, alias = "totalTransactions")]
    pub total_transactions: Option<i64>,
    #[serde(default, alias = "totalRevenue")]
    pub total_revenue: Option<f64>,
    #[serde(default, alias = "totalBooksSold")]
    pub total_books_sold: Option<i64>,
    #[serde(default, alias = "averageTransactionValue")]
    pub average_transaction_value: Option<f64>,
    #[serde(default, alias = "mostGenre")]
    pub most_genre: Option<String>,
    #[serde(default, alias = "leastGenre")]
    pub least_genre: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_field_spellings() {
        let nested_as_order_items = r#"{"id":"t1","user_id":"u1","order_items":[{"book_id":"b1","quantity":2}]}"#;
        let nested_as_items = r#"{"id":"t1","user_id":"u1","items":[{"book_id":"b1","quantity":2}]}"#;

        let a: Transaction = serde_json::from_str(nested_as_order_items).expect("order_items");
        let b: Transaction = serde_json::from_str(nested_as_items).expect("items");
        assert_eq!(a.order_items.len(), 1);
        assert_eq!(b.order_items.len(), 1);
        assert_eq!(b.order_items[0].book_id, "b1");
    }

    #[test]
    fn test_item_title_spellings() {
        let with_book_title = r#"{"book_id":"b1","book_title":"Dune","quantity":1}"#;
        let with_title = r#"{"book_id":"b1","title":"Dune","quantity":1}"#;

        let a: OrderItem = serde_json::from_str(with_book_title).expect("book_title");
        let b: OrderItem = serde_json::from_str(with_title).expect("title");
        assert_eq!(a.book_title.as_deref(), Some("Dune"));
        assert_eq!(b.book_title.as_deref(), Some("Dune"));
    }

    #[test]
    fn test_total_prefers_server_value() {
        let tx: Transaction = serde_json::from_str(
            r#"{"id":"t1","total_price":500,"order_items":[{"book_id":"b1","quantity":2,"price":100}]}"#,
        )
        .expect("transaction");
        assert_eq!(tx.total(), 500.0);
    }

    #[test]
    fn test_total_falls_back_to_line_items() {
        let tx: Transaction = serde_json::from_str(
            r#"{"id":"t1","order_items":[
                {"book_id":"b1","quantity":2,"price":100},
                {"book_id":"b2","quantity":1,"subtotal_price":250}
            ]}"#,
        )
        .expect("transaction");
        assert_eq!(tx.total(), 450.0);
    }

    #[test]
    fn test_statistics_casing_variants() {
        let snake = r#"{"total_transactions":3,"average_transaction_value":150.5}"#;
        let camel = r#"{"totalTransactions":3,"averageTransactionValue":150.5,"mostGenre":"Sci-Fi"}"#;

        let a: TransactionStatistics = serde_json::from_str(snake).expect("snake_case");
        let b: TransactionStatistics = serde_json::from_str(camel).expect("camelCase");
        assert_eq!(a.total_transactions, Some(3));
        assert_eq!(b.total_transactions, Some(3));
        assert_eq!(b.most_genre.as_deref(), Some("Sci-Fi"));
    }
}
