//! `llmsx extract`: run the pipeline once and print or write the result.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use llmsx_core::{AGENT_GUIDE_FILENAME, ExtractionResult, FULL_DOCUMENT_FILENAME, Service};
use tracing::info;

use super::LOCAL_CLIENT;
use crate::output::OutputFormat;

/// Extract `url` and print the outcome, writing files under `out` if given.
pub async fn execute(
    service: &Service,
    url: &str,
    out: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let result = service.extract(LOCAL_CLIENT, url).await?;

    let written = match out {
        Some(dir) => write_artifacts(dir, &result)
            .with_context(|| format!("Failed to write documents to {}", dir.display()))?,
        None => Vec::new(),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_summary(&result, out, written.len()),
    }
    Ok(())
}

/// Write each document plus the full document and agent guide into `dir`.
///
/// Returns the written paths in write order.
pub fn write_artifacts(dir: &Path, result: &ExtractionResult) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(result.documents.len() + 2);
    let files = result
        .documents
        .iter()
        .map(|doc| (doc.filename.as_str(), doc.content.as_str()))
        .chain([
            (FULL_DOCUMENT_FILENAME, result.full_document.as_str()),
            (AGENT_GUIDE_FILENAME, result.agent_guide.as_str()),
        ]);

    for (name, content) in files {
        let path = dir.join(name);
        fs::write(&path, content)?;
        written.push(path);
    }

    info!(dir = %dir.display(), files = written.len(), "wrote extraction output");
    Ok(written)
}

fn print_summary(result: &ExtractionResult, out: Option<&Path>, written: usize) {
    println!(
        "{} {} documents (~{} tokens) from {} in {}ms",
        "✓".green(),
        result.stats.document_count,
        result.stats.total_tokens,
        result.source_url.cyan(),
        result.stats.processing_time_ms
    );

    let width = result
        .documents
        .iter()
        .map(|doc| doc.filename.len())
        .max()
        .unwrap_or(0);
    for doc in &result.documents {
        println!(
            "  {:<width$}  {}  {}",
            doc.filename,
            doc.title.bold(),
            format!("(~{} tokens)", doc.tokens).dimmed()
        );
    }

    if let Some(dir) = out {
        println!("Wrote {written} files to {}", dir.display());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use llmsx_core::{Document, ExtractionStats};

    fn result() -> ExtractionResult {
        let documents = vec![
            Document {
                filename: "01-intro.md".into(),
                title: "Intro".into(),
                content: "# Intro\n\nHello\n".into(),
                tokens: 4,
            },
            Document {
                filename: "02-api.md".into(),
                title: "API".into(),
                content: "# API\n".into(),
                tokens: 2,
            },
        ];
        ExtractionResult {
            url: "https://a.dev".into(),
            source_url: "https://a.dev/llms.txt".into(),
            raw_content: "# Intro\n\nHello\n\n## API".into(),
            documents,
            full_document: "full".into(),
            agent_guide: "guide".into(),
            stats: ExtractionStats {
                total_tokens: 6,
                document_count: 2,
                processing_time_ms: 3,
            },
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_write_artifacts_creates_every_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("docs");

        let written = write_artifacts(&dir, &result()).unwrap();

        let names: Vec<_> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            ["01-intro.md", "02-api.md", FULL_DOCUMENT_FILENAME, AGENT_GUIDE_FILENAME]
        );
        assert_eq!(
            fs::read_to_string(dir.join("01-intro.md")).unwrap(),
            "# Intro\n\nHello\n"
        );
        assert_eq!(fs::read_to_string(dir.join(AGENT_GUIDE_FILENAME)).unwrap(), "guide");
    }
}
