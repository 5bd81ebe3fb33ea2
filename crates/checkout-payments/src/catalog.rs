//! Product Catalog
//!
//! The fixed set of purchasable services. Lookups never fail: an unknown id
//! resolves to the default product so a stale or hand-edited button still
//! produces a valid checkout.

use rust_decimal::Decimal;
use serde::Serialize;

/// Image shown on the hosted checkout page
const SERVICE_IMAGE: &str = "https://yourwebsite.com/service-image.jpg";

/// Id of the product used for unknown lookups
pub const DEFAULT_PRODUCT_ID: &str = "basic_service";

/// A purchasable product
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Price in cents
    pub unit_amount: i64,
    pub image_url: &'static str,
}

static PRODUCTS: [Product; 2] = [
    Product {
        id: DEFAULT_PRODUCT_ID,
        name: "In-Depth Assessment",
        description: "Detailed custom service assessment",
        unit_amount: 24700, // $247
        image_url: SERVICE_IMAGE,
    },
    Product {
        id: "with_upsell",
        name: "In-Depth Assessment + Priority Support",
        description: "Detailed assessment with priority support",
        unit_amount: 29600, // $247 + $49 upsell
        image_url: SERVICE_IMAGE,
    },
];

impl Product {
    /// Look up a product by id, falling back to the default product
    pub fn lookup(id: &str) -> &'static Self {
        PRODUCTS
            .iter()
            .find(|p| p.id == id)
            .unwrap_or(&PRODUCTS[0])
    }

    /// Whether `id` names a product in the catalog
    pub fn is_known(id: &str) -> bool {
        PRODUCTS.iter().any(|p| p.id == id)
    }
}

/// Format an amount in cents as a major-unit decimal with two places
pub fn format_amount(cents: i64) -> String {
    let mut amount = Decimal::new(cents, 2);
    amount.rescale(2);
    amount.to_string()
}
