//! Search command handler.

use clap::Args;
use datalens_store::{EmbeddingStore, Metadata, SearchResults};

const PREVIEW_CHARS: usize = 160;

/// Rank stored chunks by similarity to a query
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Query text
    pub query: String,

    /// Number of chunks to return
    #[arg(short = 'n', long, default_value = "5")]
    pub n_results: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, store: &dyn EmbeddingStore) -> anyhow::Result<()> {
        tracing::info!("Executing search command (n_results={})", self.n_results);

        let results = store.search(&self.query, self.n_results).await?;

        tracing::debug!(
            "Search returned {} matches, confidence {:.3}",
            results.len(),
            results.confidence()
        );

        if self.json {
            println!("{}", serde_json::to_string_pretty(&to_json(&results))?);
        } else {
            print!("{}", render(&results));
        }

        Ok(())
    }
}

fn to_json(results: &SearchResults) -> serde_json::Value {
    serde_json::json!({
        "ids": results.ids,
        "documents": results.documents,
        "metadatas": results.metadatas,
        "distances": results.distances,
        "confidence": results.confidence(),
    })
}

fn render(results: &SearchResults) -> String {
    if results.is_empty() {
        return "No matching documents.\n".to_string();
    }

    let mut out = format!(
        "{} matches (confidence {:.2})\n",
        results.len(),
        results.confidence()
    );
    for (i, distance) in results.flat_distances().iter().enumerate() {
        out.push_str(&format!(
            "{}. [{:.4}] {}\n   {}\n",
            i + 1,
            distance,
            results.ids[i],
            preview(&results.documents[i])
        ));
        if !results.metadatas[i].is_empty() {
            out.push_str(&format!("   {}\n", format_metadata(&results.metadatas[i])));
        }
    }
    out
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    }
}

fn format_metadata(metadata: &Metadata) -> String {
    metadata
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}
