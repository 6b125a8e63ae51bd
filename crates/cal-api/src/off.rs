//! Open Food Facts product lookup client.

use std::time::Duration;

use cal_core::nutrition::{CARBOHYDRATE, ENERGY, FAT, PROTEIN};
use cal_core::{Barcode, FoodRecord, LookupError, NutrientRecord, ProductLookup};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{ApiError, build_http, read_body};

pub const DEFAULT_PRODUCT_URL: &str = "https://world.openfoodfacts.org/api/v0/product";

const KJ_PER_KCAL: f64 = 4.184;
const UNNAMED_PRODUCT: &str = "Unknown product";

/// Open Food Facts client. Needs no API key.
#[derive(Debug, Clone)]
pub struct OffClient {
    http: reqwest::Client,
    product_url: String,
}

/// Outcome of a product lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductResult {
    Found(FoodRecord),
    NotFound,
}

impl OffClient {
    /// Creates a client for `product_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(product_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        Ok(Self {
            http: build_http(timeout)?,
            product_url: product_url.into(),
        })
    }

    fn product_endpoint(&self, barcode: &Barcode) -> String {
        format!("{}/{barcode}.json", self.product_url.trim_end_matches('/'))
    }

    /// Fetches nutrition per 100 g for `barcode`.
    pub async fn product(&self, barcode: &Barcode) -> Result<ProductResult, ApiError> {
        let response = self.http.get(self.product_endpoint(barcode)).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(%barcode, "product endpoint returned 404");
            return Ok(ProductResult::NotFound);
        }
        let body = read_body(response).await?;
        parse_product_response(&body)
    }
}

impl ProductLookup for OffClient {
    async fn lookup(&self, barcode: &Barcode) -> Result<FoodRecord, LookupError> {
        match self.product(barcode).await? {
            ProductResult::Found(record) => Ok(record),
            ProductResult::NotFound => Err(LookupError::NotFound {
                barcode: barcode.to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProductResponse {
    #[serde(default)]
    status: i64,
    product: Option<Product>,
}

#[derive(Debug, Deserialize)]
struct Product {
    product_name: Option<String>,
    #[serde(default)]
    nutriments: Map<String, Value>,
}

fn parse_product_response(body: &str) -> Result<ProductResult, ApiError> {
    let payload: ProductResponse =
        serde_json::from_str(body).map_err(|err| ApiError::InvalidResponse(err.to_string()))?;

    let product = match payload.product {
        Some(product) if payload.status != 0 => product,
        _ => return Ok(ProductResult::NotFound),
    };

    let name = product
        .product_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNNAMED_PRODUCT.to_string());

    let nutriments = &product.nutriments;
    let energy = number(nutriments, "energy-kcal_100g")
        .or_else(|| number(nutriments, "energy_100g").map(|kj| kj / KJ_PER_KCAL));

    let nutrients = [
        (ENERGY, energy),
        (PROTEIN, number(nutriments, "proteins_100g")),
        (CARBOHYDRATE, number(nutriments, "carbohydrates_100g")),
        (FAT, number(nutriments, "fat_100g")),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.map(|v| NutrientRecord::new(name, v)))
    .collect();

    Ok(ProductResult::Found(FoodRecord::new(name, nutrients)))
}

/// Reads a nutriment that may be encoded as a number or a numeric string.
fn number(nutriments: &Map<String, Value>, key: &str) -> Option<f64> {
    match nutriments.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
