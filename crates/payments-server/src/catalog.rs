//! Static Product Catalog

use serde::Serialize;

/// A purchasable product
#[derive(Clone, Debug, Serialize)]
pub struct Product {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,

    /// Price in cents
    pub price: i64,

    pub currency: &'static str,
}

/// Sample catalog; replace with real product data
pub const PRODUCTS: &[Product] = &[
    Product {
        id: "prod_1",
        name: "Premium Plan",
        description: "Access to all premium features",
        price: 2999, // $29.99
        currency: "usd",
    },
    Product {
        id: "prod_2",
        name: "Basic Plan",
        description: "Essential features for getting started",
        price: 999, // $9.99
        currency: "usd",
    },
    Product {
        id: "prod_3",
        name: "Enterprise Plan",
        description: "Full access with priority support",
        price: 9999, // $99.99
        currency: "usd",
    },
];
