//! Resolves a list of CNPJs from the command line and prints each merged
//! record as JSON.
//!
//! Usage: `batch_resolve <cnpj> [<cnpj> ...]`

use anyhow::Result;
use std::time::Duration;

use cnpj_finder::config::Config;
use cnpj_finder::enrichment::EnrichmentPipeline;

/// Pause between lookups to stay polite with the public registries.
const PAUSE: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cnpjs: Vec<String> = std::env::args().skip(1).collect();
    if cnpjs.is_empty() {
        anyhow::bail!("usage: batch_resolve <cnpj> [<cnpj> ...]");
    }

    println!("=== Batch CNPJ Resolution ===\n");

    let config = Config::from_env()?;
    let pipeline = EnrichmentPipeline::from_config(&config)?;

    let total = cnpjs.len();
    let mut success_count = 0;
    let mut fail_count = 0;

    for (idx, cnpj) in cnpjs.iter().enumerate() {
        println!("[{}/{}] Resolving CNPJ: {}", idx + 1, total, cnpj);

        match pipeline.resolve(cnpj).await {
            Ok(record) => {
                println!(
                    "  ✓ {} source(s): {}",
                    record.sources.len(),
                    record.sources.join(", ")
                );
                println!("{}", serde_json::to_string_pretty(&record)?);
                success_count += 1;
            }
            Err(e) => {
                println!("  ✗ {}", e);
                fail_count += 1;
            }
        }

        if idx + 1 < total {
            tokio::time::sleep(PAUSE).await;
        }
    }

    println!("\n=== Summary ===");
    println!("Total: {}", total);
    println!("✓ Success: {}", success_count);
    println!("✗ Failed: {}", fail_count);

    Ok(())
}
