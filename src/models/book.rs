// Allow dead code: API response structs have fields for completeness
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

use crate::utils::format_price;

/// A book in the catalog.
///
/// The upstream API ships two spellings for the stock field (`stock` and
/// `stock_quantity`); both deserialize into `stock_quantity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Book {
    pub id: String,
    pub title: String,
    pub writer: String,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub publication_year: Option<i32>,
    pub price: f64,
    #[serde(alias = "stock")]
    pub stock_quantity: i64,
    #[serde(default)]
    pub genre_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub publish_date: Option<String>,
}

impl Book {
    pub fn display_price(&self) -> String {
        format_price(self.price)
    }

    pub fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    pub fn stock_display(&self) -> String {
        if self.in_stock() {
            format!("{} units", self.stock_quantity)
        } else {
            "Out of Stock".to_string()
        }
    }
}

/// Request body for creating a book.
#[derive(Debug, Clone, Serialize)]
pub struct NewBook {
    pub title: String,
    pub writer: String,
    pub publisher: String,
    pub publication_year: i32,
    pub price: f64,
    pub stock_quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre_id: Option<String>,
}

impl NewBook {
    /// Check that every required field is filled in, returning the name of
    /// the first missing one.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.title.trim().is_empty() {
            return Err("title");
        }
        if self.writer.trim().is_empty() {
            return Err("writer");
        }
        if self.publisher.trim().is_empty() {
            return Err("publisher");
        }
        if self.publication_year <= 0 {
            return Err("publication_year");
        }
        if self.price < 0.0 {
            return Err("price");
        }
        if self.stock_quantity < 0 {
            return Err("stock_quantity");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_field_spellings() {
        let with_quantity = r#"{"id":"b1","title":"Dune","writer":"Frank Herbert","price":125000,"stock_quantity":4}"#;
        let with_stock = r#"{"id":"b1","title":"Dune","writer":"Frank Herbert","price":125000,"stock":4}"#;

        let a: Book = serde_json::from_str(with_quantity).expect("stock_quantity variant");
        let b: Book = serde_json::from_str(with_stock).expect("stock variant");
        assert_eq!(a.stock_quantity, 4);
        assert_eq!(b.stock_quantity, 4);
    }

    #[test]
    fn test_stock_display() {
        let mut book: Book = serde_json::from_str(
            r#"{"id":"b1","title":"Dune","writer":"Frank Herbert","price":125000,"stock":2}"#,
        )
        .expect("book");
        assert!(book.in_stock());
        assert_eq!(book.stock_display(), "2 units");

        book.stock_quantity = 0;
        assert!(!book.in_stock());
        assert_eq!(book.stock_display(), "Out of Stock");
    }

    #[test]
    fn test_new_book_validation() {
        let mut book = NewBook {
            title: "Dune".to_string(),
            writer: "Frank Herbert".to_string(),
            publisher: "Chilton".to_string(),
            publication_year: 1965,
            price: 125000.0,
            stock_quantity: 4,
            genre_id: None,
        };
        assert!(book.validate().is_ok());

        book.writer = "  ".to_string();
        assert_eq!(book.validate(), Err("writer"));
    }

    #[test]
    fn test_new_book_skips_absent_genre() {
        let book = NewBook {
            title: "Dune".to_string(),
            writer: "Frank Herbert".to_string(),
            publisher: "Chilton".to_string(),
            publication_year: 1965,
            price: 125000.0,
            stock_quantity: 4,
            genre_id: None,
        };
        let json = serde_json::to_value(&book).expect("serialize");
        assert!(json.get("genre_id").is_none());
    }
}
