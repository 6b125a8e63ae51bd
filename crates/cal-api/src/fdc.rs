//! USDA FoodData Central search client.

use std::fmt;
use std::time::Duration;

use cal_core::{FoodRecord, LookupError, NutrientRecord, NutritionSearch, SEARCH_PAGE_SIZE};
use serde::Deserialize;

use crate::{ApiError, build_http, get_text};

pub const DEFAULT_SEARCH_URL: &str = "https://api.nal.usda.gov/fdc/v1/foods/search";

/// FoodData Central client.
///
/// Safe to clone and share; clones share the connection pool.
#[derive(Clone)]
pub struct FdcClient {
    http: reqwest::Client,
    api_key: String,
    search_url: String,
}

impl fmt::Debug for FdcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FdcClient")
            .field("api_key", &"[REDACTED]")
            .field("search_url", &self.search_url)
            .finish_non_exhaustive()
    }
}

impl FdcClient {
    /// Creates a client for `search_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or whitespace-only, or if
    /// the HTTP client fails to build.
    pub fn new(
        api_key: impl Into<String>,
        search_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ApiError::InvalidApiKey {
                reason: "API key cannot be empty",
            });
        }
        if api_key.trim().is_empty() {
            return Err(ApiError::InvalidApiKey {
                reason: "API key cannot be whitespace-only",
            });
        }

        Ok(Self {
            http: build_http(timeout)?,
            api_key,
            search_url: search_url.into(),
        })
    }

    /// Searches foods matching `query`, returning at most five records.
    pub async fn search_foods(&self, query: &str) -> Result<Vec<FoodRecord>, ApiError> {
        let page_size = SEARCH_PAGE_SIZE.to_string();
        let request = self.http.get(&self.search_url).query(&[
            ("api_key", self.api_key.as_str()),
            ("query", query),
            ("pageSize", page_size.as_str()),
        ]);
        let body = get_text(request).await?;
        let records = parse_search_response(&body)?;
        tracing::debug!(query, count = records.len(), "food search complete");
        Ok(records)
    }
}

impl NutritionSearch for FdcClient {
    async fn search(&self, query: &str) -> Result<Vec<FoodRecord>, LookupError> {
        Ok(self.search_foods(query).await?)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    foods: Vec<SearchFood>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchFood {
    description: String,
    #[serde(default)]
    food_nutrients: Vec<SearchNutrient>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchNutrient {
    nutrient_name: Option<String>,
    value: Option<f64>,
}

fn parse_search_response(body: &str) -> Result<Vec<FoodRecord>, ApiError> {
    let payload: SearchResponse =
        serde_json::from_str(body).map_err(|err| ApiError::InvalidResponse(err.to_string()))?;

    Ok(payload
        .foods
        .into_iter()
        .take(SEARCH_PAGE_SIZE)
        .map(|food| {
            let nutrients = food
                .food_nutrients
                .into_iter()
                .filter_map(|n| Some(NutrientRecord::new(n.nutrient_name?, n.value.unwrap_or(0.0))))
                .collect();
            FoodRecord::new(food.description, nutrients)
        })
        .collect())
}
