//! Core domain logic for the calorie logger.
//!
//! This crate contains:
//! - Nutrition extraction: mapping source nutrient lists to canonical values
//! - The food log: entries, serving edits and aggregate totals
//! - Search debouncing and the barcode scan session state machine
//! - The session controller and the tokio runtime that drives it

pub mod collaborator;
pub mod controller;
pub mod debounce;
pub mod log;
pub mod nutrition;
pub mod runtime;
pub mod scan;
mod types;

pub use collaborator::{
    BarcodeDecoder, Camera, CameraError, DetectionSink, FacingMode, LookupError, NutritionSearch,
    ProductLookup, SEARCH_PAGE_SIZE, StillFrame,
};
pub use controller::{Action, CAMERA_HINT, Input, Notice, SessionConfig, SessionController};
pub use debounce::{DEFAULT_DEBOUNCE_WINDOW, SearchDebouncer};
pub use log::{FoodEntry, FoodLog, LogError, MacroPercentages, Totals};
pub use nutrition::{CanonicalNutrition, FoodRecord, NutrientRecord, extract};
pub use runtime::{Collaborators, Session};
pub use scan::{ScanError, ScanPhase, Scanner};
pub use types::{Barcode, ScanId, SearchTicket, StreamHandle, ValidationError};
