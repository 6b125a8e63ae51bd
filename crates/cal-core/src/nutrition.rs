//! Nutrient extraction from raw food records.
//!
//! Search results and barcode lookups both arrive as a description plus an
//! unordered list of named nutrients. [`extract`] reduces that list to the four
//! fields the food log tracks.

use serde::{Deserialize, Serialize};

/// Nutrient name carrying energy in kcal.
pub const ENERGY: &str = "Energy";
/// Nutrient name carrying protein in grams.
pub const PROTEIN: &str = "Protein";
/// Nutrient name carrying carbohydrate in grams.
pub const CARBOHYDRATE: &str = "Carbohydrate, by difference";
/// Nutrient name carrying fat in grams.
pub const FAT: &str = "Total lipid (fat)";

/// A single named nutrient value as received from an external source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutrientRecord {
    pub name: String,
    pub value: f64,
}

impl NutrientRecord {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A raw food record from search or barcode lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodRecord {
    /// Display name of the food.
    pub description: String,
    /// Nutrients in source order. Duplicates are kept.
    pub nutrients: Vec<NutrientRecord>,
}

impl FoodRecord {
    pub fn new(description: impl Into<String>, nutrients: Vec<NutrientRecord>) -> Self {
        Self {
            description: description.into(),
            nutrients,
        }
    }

    /// Extracts the canonical nutrition for this record.
    pub fn nutrition(&self) -> CanonicalNutrition {
        extract(&self.description, &self.nutrients)
    }
}

/// The four tracked nutrition fields, per serving. All fields are non-negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalNutrition {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

/// Reduces a nutrient list to [`CanonicalNutrition`].
///
/// Names are matched exactly and case-sensitively; the first match wins.
/// Missing nutrients default to zero, as do negative or non-finite values.
pub fn extract(description: &str, nutrients: &[NutrientRecord]) -> CanonicalNutrition {
    let mut missing = Vec::new();
    let mut field = |name: &'static str| {
        nutrients
            .iter()
            .find(|n| n.name == name)
            .map_or_else(
                || {
                    missing.push(name);
                    0.0
                },
                |n| sanitize(description, name, n.value),
            )
    };

    let nutrition = CanonicalNutrition {
        calories: field(ENERGY),
        protein: field(PROTEIN),
        carbs: field(CARBOHYDRATE),
        fat: field(FAT),
    };

    if !missing.is_empty() {
        tracing::debug!(food = description, ?missing, "defaulting missing nutrients to zero");
    }
    nutrition
}

fn sanitize(description: &str, name: &str, value: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        tracing::debug!(food = description, nutrient = name, value, "clamping invalid nutrient value");
        0.0
    }
}
