//! Receipt command implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use mony_core::ai::{AIBackend, AIClient, ReceiptExtractor};
use mony_core::models::{ExtractionOutcome, TransactionType};
use mony_core::pipeline::guess_media_type_from_filename;
use mony_core::ReceiptPipeline;

use super::{load_config, open_db};

/// Run the receipt pipeline on a local image.
///
/// `save_as` stores the result as a transaction of that type.
pub async fn cmd_extract(
    db_path: &Path,
    image: &Path,
    save_as: Option<&str>,
    json: bool,
    client: Option<AIClient>,
) -> Result<()> {
    let Some(client) = client else {
        bail!("No vision model configured. Set OLLAMA_HOST (or AI_BACKEND) to enable extraction.");
    };

    let transaction_type = save_as
        .map(|t| t.parse::<TransactionType>().map_err(anyhow::Error::msg))
        .transpose()?;

    let bytes = std::fs::read(image)
        .with_context(|| format!("Failed to read receipt image {}", image.display()))?;
    let media_type = image
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(guess_media_type_from_filename)
        .unwrap_or("application/octet-stream");

    let config = Arc::new(load_config()?);
    let db = open_db(db_path)?;

    if !json {
        println!("🧾 Reading {} with {}...", image.display(), client.model());
    }

    let extractor = ReceiptExtractor::new(client, config.clone())?;
    let pipeline = ReceiptPipeline::new(db, config, Some(extractor));

    match transaction_type {
        Some(t) => {
            let submission = pipeline.submit(&bytes, media_type, t).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&submission)?);
            } else {
                print_outcome(&ExtractionOutcome {
                    receipt: submission.receipt,
                    warnings: submission.warnings,
                });
                println!();
                println!("✅ Saved as transaction #{}", submission.transaction.id);
            }
        }
        None => {
            let outcome = pipeline.extract(&bytes, media_type).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
        }
    }

    Ok(())
}

fn print_outcome(outcome: &ExtractionOutcome) {
    let r = &outcome.receipt;
    println!();
    println!(
        "   Merchant: {}",
        if r.merchant.is_empty() { "(unknown)" } else { &r.merchant }
    );
    println!("   Date:     {}", r.date);
    println!("   Total:    {} {}", r.total_amount, r.currency);
    if !r.taxes.is_zero() {
        println!("   Taxes:    {} {}", r.taxes, r.currency);
    }
    if let Some(ref category) = r.category {
        println!("   Category: {}", category);
    }

    if !r.items.is_empty() {
        println!("   Items:");
        for item in &r.items {
            println!(
                "     {} × {} @ {} = {}",
                item.quantity,
                super::truncate(&item.name, 30),
                item.unit_price,
                item.total_price
            );
        }
    }

    for warning in &outcome.warnings {
        println!("   ⚠️  {}: {}", warning.field, warning.message);
    }
}
