//! One-shot food search.

use std::io::Write;

use anyhow::{Context, Result};
use cal_core::{FoodRecord, NutritionSearch};

use crate::render::{self, RecordJson};

pub async fn run<W: Write, S: NutritionSearch>(
    writer: &mut W,
    search: &S,
    query: &str,
    json: bool,
) -> Result<()> {
    let query = query.trim();
    if query.is_empty() {
        anyhow::bail!("search query cannot be empty");
    }
    let records = search
        .search(query)
        .await
        .with_context(|| format!("failed to search for {query:?}"))?;
    write_results(writer, &records, json)
}

fn write_results<W: Write>(writer: &mut W, records: &[FoodRecord], json: bool) -> Result<()> {
    if json {
        let rows: Vec<RecordJson<'_>> = records.iter().map(RecordJson::from).collect();
        serde_json::to_writer_pretty(&mut *writer, &rows)?;
        writeln!(writer)?;
    } else {
        render::write_search_results(writer, records)?;
    }
    Ok(())
}
