//! Plain-text rendering of search results, the food log and totals.

use std::io::{self, Write};

use cal_core::{FoodLog, FoodRecord, MacroPercentages, ScanPhase, Totals};
use serde::Serialize;

/// JSON shape for `--json` output.
#[derive(Debug, Serialize)]
pub struct RecordJson<'a> {
    pub description: &'a str,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl<'a> From<&'a FoodRecord> for RecordJson<'a> {
    fn from(record: &'a FoodRecord) -> Self {
        let nutrition = record.nutrition();
        Self {
            description: &record.description,
            calories: nutrition.calories,
            protein: nutrition.protein,
            carbs: nutrition.carbs,
            fat: nutrition.fat,
        }
    }
}

pub fn write_record<W: Write>(writer: &mut W, record: &FoodRecord) -> io::Result<()> {
    let n = record.nutrition();
    writeln!(
        writer,
        "{}: {:.2} kcal, protein {:.2}g, carbs {:.2}g, fat {:.2}g",
        record.description, n.calories, n.protein, n.carbs, n.fat
    )
}

pub fn write_search_results<W: Write>(writer: &mut W, records: &[FoodRecord]) -> io::Result<()> {
    if records.is_empty() {
        return writeln!(writer, "No results.");
    }
    for (index, record) in records.iter().enumerate() {
        write!(writer, "{}. ", index + 1)?;
        write_record(writer, record)?;
    }
    Ok(())
}

pub fn write_log<W: Write>(writer: &mut W, log: &FoodLog) -> io::Result<()> {
    writeln!(writer, "Food Items")?;
    if log.is_empty() {
        return writeln!(writer, "(none)");
    }
    for (index, entry) in log.entries().iter().enumerate() {
        let unit = if (entry.servings() - 1.0).abs() < f64::EPSILON {
            "serving"
        } else {
            "servings"
        };
        writeln!(
            writer,
            "{}. {}: {} {unit}, {:.2} calories",
            index + 1,
            entry.name(),
            entry.servings(),
            entry.calories()
        )?;
    }
    Ok(())
}

pub fn write_totals<W: Write>(
    writer: &mut W,
    totals: &Totals,
    macros: &MacroPercentages,
) -> io::Result<()> {
    writeln!(writer, "Totals")?;
    writeln!(writer, "Calories: {:.2}", totals.calories)?;
    writeln!(writer, "Protein: {:.2}g", totals.protein)?;
    writeln!(writer, "Carbs: {:.2}g", totals.carbs)?;
    writeln!(writer, "Fat: {:.2}g", totals.fat)?;
    writeln!(writer, "Macro Percentages")?;
    if !macros.has_macros {
        return writeln!(writer, "No macros to display");
    }
    writeln!(writer, "protein: {:.1}%", macros.protein)?;
    writeln!(writer, "carbs: {:.1}%", macros.carbs)?;
    writeln!(writer, "fat: {:.1}%", macros.fat)
}

/// One-line description of a scan phase for the session prompt.
pub const fn describe_phase(phase: ScanPhase) -> &'static str {
    match phase {
        ScanPhase::Idle => "Scanner idle",
        ScanPhase::RequestingPermission => "Requesting camera access...",
        ScanPhase::Streaming => "Camera streaming",
        ScanPhase::Detecting => "Scanning: point the camera at a barcode (or type `detect <barcode>`)",
        ScanPhase::Captured => "Frame captured, scanner off",
        ScanPhase::Stopped => "Scanner off",
        ScanPhase::PermissionError => "Camera unavailable",
    }
}
