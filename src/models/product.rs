//! Product snapshot, consumed read-only by the reporting code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stock counters for a product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub total: u32,
    pub available: u32,
    pub reserved: u32,
}

impl Inventory {
    /// `available + reserved` never exceeds `total`.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.available.saturating_add(self.reserved) <= self.total
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Active,
    Draft,
    Inactive,
}

/// A seller's product together with its default group terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default)]
    pub id: String,
    pub seller_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub group_price: f64,
    pub required_participants: u32,
    #[serde(default)]
    pub current_participants: u32,
    pub category: String,
    pub inventory: Inventory,
    #[serde(default)]
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_consistency() {
        let ok = Inventory {
            total: 10,
            available: 6,
            reserved: 4,
        };
        assert!(ok.is_consistent());

        let over = Inventory {
            total: 10,
            available: 8,
            reserved: 4,
        };
        assert!(!over.is_consistent());
    }
}
