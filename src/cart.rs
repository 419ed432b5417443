//! A locally persisted shopping cart.
//!
//! The cart lives in `cart.json` under the data directory and only talks to
//! the network at checkout, when its lines become a transaction request.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Book, NewOrderItem};
use crate::utils::format_price;

/// Cart file name in the data directory
const CART_FILE: &str = "cart.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub book_id: String,
    pub title: String,
    pub price: f64,
    pub quantity: i64,
}

impl CartItem {
    pub fn subtotal(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

/// On-disk form of the cart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CartData {
    items: Vec<CartItem>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

pub struct Cart {
    path: PathBuf,
    items: Vec<CartItem>,
}

impl Cart {
    /// Load the cart from disk; a missing file is an empty cart.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CART_FILE);
        let items = if path.exists() {
            let contents =
                std::fs::read_to_string(&path).context("Failed to read cart file")?;
            let data: CartData =
                serde_json::from_str(&contents).context("Failed to parse cart file")?;
            data.items
        } else {
            Vec::new()
        };
        Ok(Self { path, items })
    }

    /// Save the cart to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = CartData {
            items: self.items.clone(),
            updated_at: Some(Utc::now()),
        };
        let contents = serde_json::to_string_pretty(&data)?;
        std::fs::write(&self.path, contents).context("Failed to write cart file")?;
        Ok(())
    }

    /// Add a book to the cart, merging quantities when it is already there.
    /// Quantities below one are clamped to one.
    pub fn add(&mut self, book: &Book, quantity: i64) {
        let quantity = quantity.max(1);
        if let Some(item) = self.items.iter_mut().find(|i| i.book_id == book.id) {
            item.quantity += quantity;
        } else {
            self.items.push(CartItem {
                book_id: book.id.clone(),
                title: book.title.clone(),
                price: book.price,
                quantity,
            });
        }
    }

    /// Remove a book from the cart; returns whether it was present.
    pub fn remove(&mut self, book_id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.book_id != book_id);
        self.items.len() != before
    }

    /// Set the quantity for a book already in the cart; zero removes the
    /// line. Returns whether the book was present.
    pub fn update_quantity(&mut self, book_id: &str, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.remove(book_id);
        }
        match self.items.iter_mut().find(|i| i.book_id == book_id) {
            Some(item) => {
                item.quantity = quantity;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_price(&self) -> f64 {
        self.items.iter().map(CartItem::subtotal).sum()
    }

    pub fn display_total(&self) -> String {
        format_price(self.total_price())
    }

    /// The cart's lines as a transaction request body.
    pub fn to_order_items(&self) -> Vec<NewOrderItem> {
        self.items
            .iter()
            .map(|i| NewOrderItem {
                book_id: i.book_id.clone(),
                quantity: i.quantity,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(id: &str, price: f64) -> Book {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "title": format!("Book {}", id),
            "writer": "Anon",
            "price": price,
            "stock_quantity": 10
        }))
        .expect("book")
    }

    fn empty_cart(dir: &Path) -> Cart {
        Cart::load(dir).expect("load")
    }

    #[test]
    fn test_add_merges_quantities() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cart = empty_cart(dir.path());

        cart.add(&book("b1", 100.0), 1);
        cart.add(&book("b1", 100.0), 2);
        cart.add(&book("b2", 50.0), 1);

        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.items()[0].quantity, 3);
        assert_eq!(cart.total_price(), 350.0);
    }

    #[test]
    fn test_add_clamps_quantity_to_one() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cart = empty_cart(dir.path());
        cart.add(&book("b1", 100.0), 0);
        assert_eq!(cart.items()[0].quantity, 1);
    }

    #[test]
    fn test_update_quantity_and_remove() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cart = empty_cart(dir.path());
        cart.add(&book("b1", 100.0), 2);

        assert!(cart.update_quantity("b1", 5));
        assert_eq!(cart.items()[0].quantity, 5);

        // Zero removes the line
        assert!(cart.update_quantity("b1", 0));
        assert!(cart.is_empty());

        assert!(!cart.update_quantity("b1", 1));
        assert!(!cart.remove("b1"));
    }

    #[test]
    fn test_round_trip_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cart = empty_cart(dir.path());
        cart.add(&book("b1", 100.0), 2);
        cart.save().expect("save");

        let reloaded = Cart::load(dir.path()).expect("reload");
        assert_eq!(reloaded.items(), cart.items());
        assert_eq!(reloaded.total_price(), 200.0);
    }

    #[test]
    fn test_checkout_items() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cart = empty_cart(dir.path());
        cart.add(&book("b1", 100.0), 2);
        cart.add(&book("b2", 50.0), 1);

        let items = cart.to_order_items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].book_id, "b1");
        assert_eq!(items[0].quantity, 2);
    }
}
