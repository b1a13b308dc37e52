//! Ingest command handler.
//!
//! Takes already-chunked text, attaches metadata and ids the same way for
//! every source, and hands the batch to the store in one call.

use anyhow::{bail, Context};
use clap::Args;
use datalens_store::{EmbeddingStore, Metadata, MetadataValue};
use serde::Deserialize;
use std::path::PathBuf;

/// Embed pre-chunked texts and add them to the store
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Chunk text to ingest (repeatable)
    #[arg(long = "text")]
    pub texts: Vec<String>,

    /// JSONL file with one {"id"?, "text", "metadata"?} object per line
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Document id; generated chunk ids are `<doc-id>_<n>` (default: random UUID)
    #[arg(long)]
    pub doc_id: Option<String>,

    /// Metadata applied to every chunk, as key=value (repeatable)
    #[arg(long = "meta", value_parser = parse_key_value)]
    pub meta: Vec<(String, MetadataValue)>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// One line of a JSONL chunk file.
#[derive(Debug, Deserialize)]
struct ChunkLine {
    id: Option<String>,
    text: String,
    #[serde(default)]
    metadata: Metadata,
}

/// Columns ready for `add_documents`.
#[derive(Debug)]
struct Batch {
    doc_id: String,
    texts: Vec<String>,
    metadatas: Vec<Metadata>,
    ids: Vec<String>,
}

fn parse_key_value(raw: &str) -> Result<(String, MetadataValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty metadata key in '{}'", raw));
    }
    Ok((key.to_string(), MetadataValue::parse_loose(value.trim())))
}

impl IngestCommand {
    pub async fn execute(&self, store: &dyn EmbeddingStore) -> anyhow::Result<()> {
        tracing::info!("Executing ingest command");

        let batch = self.build_batch()?;
        let count = batch.texts.len();
        let doc_id = batch.doc_id.clone();

        store
            .add_documents(batch.texts, batch.metadatas, batch.ids)
            .await
            .with_context(|| format!("Failed to ingest document '{}'", doc_id))?;

        let stats = store.stats().await?;

        if self.json {
            let output = serde_json::json!({
                "doc_id": doc_id,
                "ingested": count,
                "document_count": stats.document_count,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Ingested {} chunks for '{}' ({} documents in store)",
                count, doc_id, stats.document_count
            );
        }

        Ok(())
    }

    fn build_batch(&self) -> anyhow::Result<Batch> {
        let mut chunks: Vec<ChunkLine> = self
            .texts
            .iter()
            .map(|text| ChunkLine {
                id: None,
                text: text.clone(),
                metadata: Metadata::new(),
            })
            .collect();

        if let Some(ref path) = self.file {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read chunk file {:?}", path))?;
            for (n, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let chunk: ChunkLine = serde_json::from_str(line)
                    .with_context(|| format!("Invalid chunk at {:?} line {}", path, n + 1))?;
                chunks.push(chunk);
            }
        }

        if chunks.is_empty() {
            bail!("Nothing to ingest: pass --text or --file");
        }

        let doc_id = self
            .doc_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut shared = Metadata::new();
        shared.insert("file_id".to_string(), MetadataValue::from(doc_id.as_str()));
        for (key, value) in &self.meta {
            shared.insert(key.clone(), value.clone());
        }

        let mut batch = Batch {
            doc_id,
            texts: Vec::with_capacity(chunks.len()),
            metadatas: Vec::with_capacity(chunks.len()),
            ids: Vec::with_capacity(chunks.len()),
        };
        for (i, chunk) in chunks.into_iter().enumerate() {
            // Per-chunk metadata wins over batch-wide values
            let mut metadata = shared.clone();
            metadata.extend(chunk.metadata);

            batch
                .ids
                .push(chunk.id.unwrap_or_else(|| format!("{}_{}", batch.doc_id, i)));
            batch.texts.push(chunk.text);
            batch.metadatas.push(metadata);
        }

        tracing::debug!(
            "Prepared {} chunks for document '{}'",
            batch.texts.len(),
            batch.doc_id
        );
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datalens_store::{Encoder, VectorStore};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn command() -> IngestCommand {
        IngestCommand {
            texts: vec![],
            file: None,
            doc_id: Some("sales".to_string()),
            meta: vec![],
            json: false,
        }
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("rows=120").unwrap(),
            ("rows".to_string(), MetadataValue::Int(120))
        );
        assert_eq!(
            parse_key_value("sheet = Q3 totals").unwrap(),
            ("sheet".to_string(), MetadataValue::Str("Q3 totals".to_string()))
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn test_texts_get_legacy_ids_and_file_id() {
        let cmd = IngestCommand {
            texts: vec!["North,1200".to_string(), "South,900".to_string()],
            meta: vec![("format".to_string(), MetadataValue::from("csv"))],
            ..command()
        };

        let batch = cmd.build_batch().unwrap();
        assert_eq!(batch.ids, vec!["sales_0", "sales_1"]);
        assert_eq!(batch.texts, vec!["North,1200", "South,900"]);
        assert_eq!(
            batch.metadatas[1].get("file_id"),
            Some(&MetadataValue::from("sales"))
        );
        assert_eq!(
            batch.metadatas[0].get("format"),
            Some(&MetadataValue::from("csv"))
        );
    }

    #[test]
    fn test_jsonl_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("chunks.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"id":"custom","text":"Revenue rose","metadata":{"page":2}}"#,
                "\n\n",
                r#"{"text":"Costs fell","metadata":{"file_id":"override"}}"#,
                "\n"
            ),
        )
        .unwrap();

        let cmd = IngestCommand {
            texts: vec!["Inline first".to_string()],
            file: Some(path),
            ..command()
        };

        let batch = cmd.build_batch().unwrap();
        assert_eq!(batch.ids, vec!["sales_0", "custom", "sales_2"]);
        assert_eq!(batch.metadatas[1].get("page"), Some(&MetadataValue::Int(2)));
        assert_eq!(
            batch.metadatas[2].get("file_id"),
            Some(&MetadataValue::from("override"))
        );
    }

    #[test]
    fn test_bad_jsonl_line_reports_location() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("chunks.jsonl");
        std::fs::write(&path, "{\"text\":\"ok\"}\n{oops}\n").unwrap();

        let cmd = IngestCommand {
            file: Some(path),
            ..command()
        };
        let err = cmd.build_batch().unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(command().build_batch().is_err());
    }

    #[test]
    fn test_generated_doc_id() {
        let cmd = IngestCommand {
            texts: vec!["x".to_string()],
            doc_id: None,
            ..command()
        };
        let batch = cmd.build_batch().unwrap();
        assert!(batch.ids[0].ends_with("_0"));
        assert_eq!(batch.ids[0].len(), 36 + 2);
    }

    #[tokio::test]
    async fn test_execute_adds_to_store() {
        let tmp = TempDir::new().unwrap();
        let config = datalens_core::EncoderConfig {
            dimensions: 32,
            ..Default::default()
        };
        let encoder: Arc<dyn Encoder> = datalens_store::create_encoder(&config).unwrap();
        let store = VectorStore::open(tmp.path(), encoder).await.unwrap();

        let cmd = IngestCommand {
            texts: vec!["Revenue rose".to_string(), "Costs fell".to_string()],
            json: true,
            ..command()
        };
        cmd.execute(&store).await.unwrap();

        assert_eq!(store.stats().await.unwrap().document_count, 2);
    }
}
