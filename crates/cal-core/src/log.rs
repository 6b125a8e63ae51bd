//! The food log: logged entries and their derived totals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::nutrition::CanonicalNutrition;

/// Food log errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LogError {
    /// Servings must be a positive, finite number.
    #[error("servings must be greater than zero, got {value}")]
    InvalidInput { value: f64 },

    /// The index does not refer to a logged entry.
    #[error("no entry at index {index} (log has {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// A logged food item.
///
/// The nutrition is a per-serving snapshot taken when the entry was created;
/// only the servings can change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodEntry {
    name: String,
    nutrition: CanonicalNutrition,
    servings: f64,
    logged_at: DateTime<Utc>,
}

impl FoodEntry {
    fn new(name: String, nutrition: CanonicalNutrition) -> Self {
        Self {
            name,
            nutrition,
            servings: 1.0,
            logged_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Per-serving nutrition.
    pub const fn nutrition(&self) -> &CanonicalNutrition {
        &self.nutrition
    }

    pub const fn servings(&self) -> f64 {
        self.servings
    }

    pub const fn logged_at(&self) -> DateTime<Utc> {
        self.logged_at
    }

    /// Calories for the logged number of servings.
    pub fn calories(&self) -> f64 {
        self.nutrition.calories * self.servings
    }
}

/// Nutrition summed over every entry, weighted by servings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl Totals {
    /// Combined grams of protein, carbs and fat.
    pub fn macro_grams(&self) -> f64 {
        self.protein + self.carbs + self.fat
    }

    /// Share of each macro in the combined macro grams.
    pub fn macro_percentages(&self) -> MacroPercentages {
        let total = self.macro_grams();
        if total <= 0.0 {
            return MacroPercentages::default();
        }
        MacroPercentages {
            protein: self.protein / total * 100.0,
            carbs: self.carbs / total * 100.0,
            fat: self.fat / total * 100.0,
            has_macros: true,
        }
    }
}

/// Macro proportions in percent. All zero when nothing has been logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroPercentages {
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    /// False when protein, carbs and fat are all zero.
    pub has_macros: bool,
}

/// Ordered collection of logged entries, in insertion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FoodLog {
    entries: Vec<FoodEntry>,
}

impl FoodLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[FoodEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&FoodEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends an entry with one serving and returns it.
    pub fn add(&mut self, name: impl Into<String>, nutrition: CanonicalNutrition) -> FoodEntry {
        let entry = FoodEntry::new(name.into(), nutrition);
        tracing::debug!(name = %entry.name, index = self.entries.len(), "adding food entry");
        self.entries.push(entry.clone());
        entry
    }

    /// Replaces the servings of one entry.
    pub fn update_servings(&mut self, index: usize, servings: f64) -> Result<(), LogError> {
        if !servings.is_finite() || servings <= 0.0 {
            return Err(LogError::InvalidInput { value: servings });
        }
        let len = self.entries.len();
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(LogError::IndexOutOfRange { index, len })?;
        tracing::debug!(index, from = entry.servings, to = servings, "updating servings");
        entry.servings = servings;
        Ok(())
    }

    /// Removes the entry at `index`, shifting later entries down.
    pub fn delete(&mut self, index: usize) -> Result<FoodEntry, LogError> {
        if index >= self.entries.len() {
            return Err(LogError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        let removed = self.entries.remove(index);
        tracing::debug!(name = %removed.name, index, "deleted food entry");
        Ok(removed)
    }

    /// Sums nutrition over all entries. Recomputed on every call.
    pub fn totals(&self) -> Totals {
        self.entries.iter().fold(Totals::default(), |mut acc, entry| {
            acc.calories += entry.nutrition.calories * entry.servings;
            acc.protein += entry.nutrition.protein * entry.servings;
            acc.carbs += entry.nutrition.carbs * entry.servings;
            acc.fat += entry.nutrition.fat * entry.servings;
            acc
        })
    }

    pub fn macro_percentages(&self) -> MacroPercentages {
        self.totals().macro_percentages()
    }
}
