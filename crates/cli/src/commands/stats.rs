//! Stats command handler.

use clap::Args;
use datalens_store::EmbeddingStore;

/// Show store statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, store: &dyn EmbeddingStore) -> anyhow::Result<()> {
        tracing::info!("Executing stats command");

        let stats = store.stats().await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!("Documents: {}", stats.document_count);
            println!("Dimensions: {}", stats.dimensions);
        }

        Ok(())
    }
}
