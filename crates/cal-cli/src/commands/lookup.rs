//! One-shot barcode lookup.

use std::io::Write;

use anyhow::{Context, Result};
use cal_core::{Barcode, LookupError, ProductLookup};

use crate::render::{self, RecordJson};

pub async fn run<W: Write, L: ProductLookup>(
    writer: &mut W,
    lookup: &L,
    barcode: &str,
    json: bool,
) -> Result<()> {
    let barcode = Barcode::new(barcode).context("invalid barcode")?;

    match lookup.lookup(&barcode).await {
        Ok(record) => {
            if json {
                serde_json::to_writer_pretty(&mut *writer, &RecordJson::from(&record))?;
                writeln!(writer)?;
            } else {
                render::write_record(writer, &record)?;
            }
        }
        Err(LookupError::NotFound { .. }) => {
            if json {
                writeln!(writer, "null")?;
            } else {
                writeln!(writer, "Product not found for barcode {barcode}")?;
            }
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to look up {barcode}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use cal_core::{FoodRecord, NutrientRecord};

    use super::*;

    struct OneProduct;

    impl ProductLookup for OneProduct {
        async fn lookup(&self, barcode: &Barcode) -> Result<FoodRecord, LookupError> {
            if barcode.as_str() == "4006381333931" {
                Ok(FoodRecord::new(
                    "Muesli bar",
                    vec![NutrientRecord::new("Energy", 420.0)],
                ))
            } else {
                Err(LookupError::NotFound {
                    barcode: barcode.to_string(),
                })
            }
        }
    }

    async fn output(barcode: &str, json: bool) -> Result<String> {
        let mut output = Vec::new();
        run(&mut output, &OneProduct, barcode, json).await?;
        Ok(String::from_utf8(output).unwrap())
    }

    #[tokio::test]
    async fn prints_found_product() {
        assert_eq!(
            output("4006381333931", false).await.unwrap(),
            "Muesli bar: 420.00 kcal, protein 0.00g, carbs 0.00g, fat 0.00g\n"
        );
    }

    #[tokio::test]
    async fn not_found_is_not_an_error() {
        assert_eq!(
            output("0123456789012", false).await.unwrap(),
            "Product not found for barcode 0123456789012\n"
        );
        assert_eq!(output("0123456789012", true).await.unwrap(), "null\n");
    }

    #[tokio::test]
    async fn invalid_barcode_fails_before_lookup() {
        let err = output("12345", false).await.unwrap_err();
        assert_eq!(err.to_string(), "invalid barcode");
    }
}
