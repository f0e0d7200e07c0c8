use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Medicine {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub stock: i32,
    pub image_url: Option<String>,
    pub category: String,
}

impl Medicine {
    /// Builds a catalog entry without an id; the store assigns one on insert.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        price: f64,
        stock: i32,
        category: impl Into<String>,
    ) -> Self {
        Medicine {
            id: String::new(),
            name: name.into(),
            description: description.into(),
            price,
            stock,
            image_url: None,
            category: category.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Sale {
    pub id: String,
    pub medicine_id: String,
    pub quantity: i32,
    pub sold_at: DateTime<Utc>,
    pub buyer_name: String,
    pub buyer_address: String,
    pub buyer_phone: String,
}

impl Sale {
    pub fn new(medicine_id: impl Into<String>, quantity: i32, buyer: &Buyer) -> Self {
        Sale {
            id: uuid::Uuid::new_v4().to_string(),
            medicine_id: medicine_id.into(),
            quantity,
            sold_at: Utc::now(),
            buyer_name: buyer.name.clone(),
            buyer_address: buyer.address.clone(),
            buyer_phone: buyer.phone.clone(),
        }
    }
}

/// Delivery details entered at checkout.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Buyer {
    pub name: String,
    pub address: String,
    pub phone: String,
}

impl Buyer {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Buyer {
            name: name.into(),
            address: address.into(),
            phone: phone.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.address.trim().is_empty()
            && !self.phone.trim().is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Identity returned by the auth provider after a successful sign-in or sign-up.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn medicine_defaults_are_empty() {
        let medicine = Medicine::default();
        assert_eq!(medicine.id, "");
        assert_eq!(medicine.name, "");
        assert_eq!(medicine.price, 0.0);
        assert_eq!(medicine.stock, 0);
        assert!(medicine.image_url.is_none());
        assert_eq!(medicine.category, "");
    }

    #[test]
    fn sale_copies_buyer_fields() {
        let buyer = Buyer::new("Jane Doe", "12 Nile St", "0123456789");
        let sale = Sale::new("med-1", 3, &buyer);
        assert_eq!(sale.medicine_id, "med-1");
        assert_eq!(sale.quantity, 3);
        assert_eq!(sale.buyer_name, "Jane Doe");
        assert_eq!(sale.buyer_address, "12 Nile St");
        assert_eq!(sale.buyer_phone, "0123456789");
        assert!(!sale.id.is_empty());
    }

    #[test]
    fn buyer_requires_every_field() {
        assert!(Buyer::new("a", "b", "c").is_complete());
        assert!(!Buyer::new("a", "  ", "c").is_complete());
        assert!(!Buyer::default().is_complete());
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("ADMIN".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert!("root".parse::<Role>().is_err());
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }
}
