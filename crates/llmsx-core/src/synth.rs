//! Turns parsed sections into downloadable documents.
//!
//! For every [`Section`] the synthesizer emits one markdown [`Document`]
//! named `NN-slug.md`. It also builds two derived artifacts:
//!
//! - the **full document**: every section concatenated under a header
//!   naming the source, separated by horizontal rules
//! - the **agent guide**: an index of the documents with token estimates
//!   and instructions for an LLM agent on how to load them
//!
//! ```rust
//! use llmsx_core::{DocumentSynthesizer, Section};
//!
//! let sections = vec![Section {
//!     title: "Getting Started".to_string(),
//!     level: 1,
//!     body: "Install with npm.".to_string(),
//!     start_line: 1,
//!     end_line: 3,
//! }];
//!
//! let output = DocumentSynthesizer::synthesize("https://hono.dev/llms.txt", &sections);
//! assert_eq!(output.documents[0].filename, "01-getting-started.md");
//! assert!(output.full_document.contains("# Getting Started"));
//! ```

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::heading::slugify;
use crate::parser::Section;

/// Filename of the concatenated document when written to disk.
pub const FULL_DOCUMENT_FILENAME: &str = "llms-full.md";

/// Filename of the agent guide when written to disk.
pub const AGENT_GUIDE_FILENAME: &str = "AGENT_GUIDE.md";

/// One synthesized per-section document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Unique, ordered filename (`01-getting-started.md`).
    pub filename: String,
    /// Section title.
    pub title: String,
    /// Markdown content: the title as H1 followed by the section body.
    pub content: String,
    /// Estimated token count of `content`.
    pub tokens: usize,
}

/// Everything the synthesizer produces for one manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesis {
    /// One document per section, in manifest order.
    pub documents: Vec<Document>,
    /// All documents concatenated.
    pub full_document: String,
    /// Usage guide for agents.
    pub agent_guide: String,
    /// Sum of document token estimates.
    pub total_tokens: usize,
}

/// Rough token estimate: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Stateless document builder.
pub struct DocumentSynthesizer;

impl DocumentSynthesizer {
    /// Build documents, the full document, and the agent guide.
    ///
    /// `source_url` is the manifest URL the sections came from; it is
    /// quoted in the full document header and the guide.
    pub fn synthesize(source_url: &str, sections: &[Section]) -> Synthesis {
        let documents = Self::documents(sections);
        let total_tokens = documents.iter().map(|doc| doc.tokens).sum();
        let full_document = Self::full_document(source_url, &documents);
        let agent_guide = Self::agent_guide(source_url, &documents, total_tokens);

        Synthesis {
            documents,
            full_document,
            agent_guide,
            total_tokens,
        }
    }

    fn documents(sections: &[Section]) -> Vec<Document> {
        let width = sections.len().to_string().len().max(2);

        sections
            .iter()
            .enumerate()
            .map(|(idx, section)| {
                let mut slug = slugify(&section.title);
                if slug.is_empty() {
                    slug = "section".to_string();
                }
                // The index prefix keeps names unique even when slugs collide.
                let filename = format!("{:0width$}-{slug}.md", idx + 1);

                let content = if section.body.is_empty() {
                    format!("# {}\n", section.title)
                } else {
                    format!("# {}\n\n{}\n", section.title, section.body)
                };
                let tokens = estimate_tokens(&content);

                Document {
                    filename,
                    title: section.title.clone(),
                    content,
                    tokens,
                }
            })
            .collect()
    }

    fn full_document(source_url: &str, documents: &[Document]) -> String {
        let capacity = documents.iter().map(|d| d.content.len() + 8).sum::<usize>() + 128;
        let mut full = String::with_capacity(capacity);
        let _ = writeln!(full, "<!-- Source: {source_url} -->");
        let _ = writeln!(full, "<!-- Documents: {} -->", documents.len());

        for doc in documents {
            full.push('\n');
            full.push_str(doc.content.trim_end());
            full.push_str("\n\n---\n");
        }

        full
    }

    fn agent_guide(source_url: &str, documents: &[Document], total_tokens: usize) -> String {
        let mut guide = String::new();
        let _ = writeln!(guide, "# Agent Guide\n");
        let _ = writeln!(
            guide,
            "Documentation extracted from <{source_url}> into {} documents (~{total_tokens} tokens).\n",
            documents.len()
        );

        let _ = writeln!(guide, "## Documents\n");
        let _ = writeln!(guide, "| File | Title | Tokens |");
        let _ = writeln!(guide, "|------|-------|--------|");
        for doc in documents {
            let _ = writeln!(
                guide,
                "| `{}` | {} | {} |",
                doc.filename,
                doc.title.replace('|', "\\|"),
                doc.tokens
            );
        }

        let _ = writeln!(guide, "\n## How to use these files\n");
        let _ = writeln!(
            guide,
            "1. Read this guide first; it is the index of everything available."
        );
        let _ = writeln!(
            guide,
            "2. Load only the documents relevant to the task, using the token counts to stay within your context budget."
        );
        let _ = writeln!(
            guide,
            "3. Load `{FULL_DOCUMENT_FILENAME}` when the task needs the whole documentation set at once."
        );
        let _ = writeln!(
            guide,
            "4. Cite the document filename when answering from its content."
        );
        guide
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(title: &str, body: &str) -> Section {
        Section {
            title: title.to_string(),
            level: 2,
            body: body.to_string(),
            start_line: 1,
            end_line: 1,
        }
    }

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens("éééé"), 1, "counts chars, not bytes");
    }

    #[test]
    fn test_documents_are_numbered_and_slugged() {
        let output = DocumentSynthesizer::synthesize(
            "https://example.com/llms.txt",
            &[section("Intro", "Hello"), section("API: Routes", "GET /")],
        );

        let names: Vec<&str> = output.documents.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, vec!["01-intro.md", "02-api-routes.md"]);
        assert_eq!(output.documents[0].content, "# Intro\n\nHello\n");
        assert_eq!(output.documents[0].tokens, estimate_tokens("# Intro\n\nHello\n"));
    }

    #[test]
    fn test_unsluggable_title_falls_back() {
        let output =
            DocumentSynthesizer::synthesize("https://example.com", &[section("日本語", "テキスト")]);
        assert_eq!(output.documents[0].filename, "01-section.md");
    }

    #[test]
    fn test_index_width_grows_with_section_count() {
        let sections: Vec<Section> = (0..120).map(|i| section(&format!("S{i}"), "x")).collect();
        let output = DocumentSynthesizer::synthesize("https://example.com", &sections);
        assert_eq!(output.documents[0].filename, "001-s0.md");
        assert_eq!(output.documents[119].filename, "120-s119.md");
    }

    #[test]
    fn test_total_tokens_sums_documents() {
        let output = DocumentSynthesizer::synthesize(
            "https://example.com",
            &[section("A", "one two three"), section("B", "")],
        );
        let sum: usize = output.documents.iter().map(|d| d.tokens).sum();
        assert_eq!(output.total_tokens, sum);
        assert_eq!(output.documents[1].content, "# B\n");
    }

    #[test]
    fn test_full_document_contains_every_section_in_order() {
        let output = DocumentSynthesizer::synthesize(
            "https://example.com/llms.txt",
            &[section("First", "alpha"), section("Second", "beta")],
        );

        let full = &output.full_document;
        assert!(full.starts_with("<!-- Source: https://example.com/llms.txt -->"));
        let first = full.find("# First").unwrap_or(usize::MAX);
        let second = full.find("# Second").unwrap_or(0);
        assert!(first < second);
        assert_eq!(full.matches("\n---\n").count(), 2);
    }

    #[test]
    fn test_agent_guide_lists_documents() {
        let output = DocumentSynthesizer::synthesize(
            "https://example.com/llms.txt",
            &[section("Pipes | Filters", "x")],
        );

        assert!(output.agent_guide.starts_with("# Agent Guide"));
        assert!(output.agent_guide.contains("`01-pipes-filters.md`"));
        assert!(output.agent_guide.contains("Pipes \\| Filters"));
        assert!(output.agent_guide.contains(FULL_DOCUMENT_FILENAME));
    }
}
