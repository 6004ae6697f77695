//! Mermaid diagram extraction
//!
//! Fenced ```mermaid blocks are lifted out of an answer and turned into
//! render URLs: the trimmed block body, URL-safe base64 encoded (with
//! padding), appended to the render base URL.

use std::sync::LazyLock;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use regex::Regex;

pub const DEFAULT_RENDER_BASE_URL: &str = "https://mermaid.ink/svg/";

const OPENING_FENCE: &str = "```mermaid";

static MERMAID_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```mermaid(.*?)```").unwrap());

/// A diagram block that was opened but never closed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid Mermaid syntax in response: the diagram block opened on line {line} is never closed")]
pub struct MalformedDiagramMarkup {
    pub line: usize,
}

/// Answer text with diagrams lifted out
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDiagrams {
    /// Text with every diagram block removed, trimmed
    pub text: String,
    /// One URL per complete block, in source order
    pub urls: Vec<String>,
    pub warning: Option<MalformedDiagramMarkup>,
}

/// Turns diagram blocks into render URLs
#[derive(Debug, Clone)]
pub struct DiagramRenderer {
    base_url: String,
}

impl Default for DiagramRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_RENDER_BASE_URL)
    }
}

impl DiagramRenderer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Extract every complete block
    ///
    /// An unterminated block produces a warning, no URL, and is dropped from
    /// the text along with everything after its opening fence.
    pub fn extract(&self, content: &str) -> ExtractedDiagrams {
        let mut text = String::with_capacity(content.len());
        let mut urls = Vec::new();
        let mut last = 0;

        for caps in MERMAID_BLOCK_RE.captures_iter(content) {
            let (Some(block), Some(body)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            text.push_str(&content[last..block.start()]);
            urls.push(self.encode(body.as_str().trim()));
            last = block.end();
        }

        let rest = &content[last..];
        let warning = match rest.find(OPENING_FENCE) {
            Some(pos) => {
                text.push_str(&rest[..pos]);
                let line = content[..last + pos].matches('\n').count() + 1;
                tracing::warn!(line, "Unterminated mermaid block");
                Some(MalformedDiagramMarkup { line })
            }
            None => {
                text.push_str(rest);
                None
            }
        };

        ExtractedDiagrams {
            text: text.trim().to_string(),
            urls,
            warning,
        }
    }

    /// Render URL for one diagram body
    pub fn encode(&self, markup: &str) -> String {
        format!("{}{}", self.base_url, URL_SAFE.encode(markup.as_bytes()))
    }

    /// Recover the diagram body from a render URL
    pub fn decode_payload(&self, url: &str) -> Option<String> {
        let payload = url.strip_prefix(&self.base_url)?;
        let bytes = URL_SAFE.decode(payload).ok()?;
        String::from_utf8(bytes).ok()
    }
}

/// Complete diagram blocks, verbatim including fences
pub fn fenced_blocks(content: &str) -> Vec<&str> {
    MERMAID_BLOCK_RE
        .find_iter(content)
        .map(|m| m.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ERD: &str = "erDiagram\n    CUSTOMERS ||--o{ ORDERS : places\n    CUSTOMERS {\n        int id PK\n        string name\n    }";

    #[test]
    fn test_extract_single_block() {
        let renderer = DiagramRenderer::default();
        let content = format!("Here is the diagram:\n\n```mermaid\n{}\n```\n\nCustomers place orders.", ERD);

        let extracted = renderer.extract(&content);

        assert_eq!(extracted.urls.len(), 1);
        assert!(extracted.urls[0].starts_with("https://mermaid.ink/svg/"));
        assert_eq!(extracted.text, "Here is the diagram:\n\n\n\nCustomers place orders.");
        assert!(!extracted.text.contains("```"));
        assert!(extracted.warning.is_none());
        assert_eq!(renderer.decode_payload(&extracted.urls[0]).unwrap(), ERD);
    }

    #[test]
    fn test_extract_keeps_source_order() {
        let renderer = DiagramRenderer::default();
        let content = "```mermaid\ngraph TD; A-->B\n```\ntext\n```mermaid\ngraph TD; C-->D\n```";

        let extracted = renderer.extract(content);
        let bodies: Vec<String> = extracted
            .urls
            .iter()
            .map(|u| renderer.decode_payload(u).unwrap())
            .collect();

        assert_eq!(bodies, vec!["graph TD; A-->B", "graph TD; C-->D"]);
        assert_eq!(extracted.text, "text");
    }

    #[test]
    fn test_no_blocks() {
        let extracted = DiagramRenderer::default().extract("  plain answer \n");
        assert_eq!(extracted.text, "plain answer");
        assert!(extracted.urls.is_empty());
        assert!(extracted.warning.is_none());
    }

    #[test]
    fn test_unterminated_block() {
        let renderer = DiagramRenderer::default();
        let content = "```mermaid\ngraph TD; A-->B\n```\nMore:\n```mermaid\nerDiagram\n  A ||--o{ B : has";

        let extracted = renderer.extract(content);

        assert_eq!(extracted.urls.len(), 1);
        assert_eq!(extracted.text, "More:");
        assert_eq!(extracted.warning, Some(MalformedDiagramMarkup { line: 5 }));
    }

    #[test]
    fn test_encoding_uses_url_safe_alphabet_with_padding() {
        let renderer = DiagramRenderer::default();
        // Standard base64 of this body contains '/' and ends in padding
        let url = renderer.encode("graph LR; A-->B>>?~");

        assert_eq!(url, "https://mermaid.ink/svg/Z3JhcGggTFI7IEEtLT5CPj4_fg==");
        assert_eq!(renderer.decode_payload(&url).unwrap(), "graph LR; A-->B>>?~");
    }

    #[test]
    fn test_round_trip_unicode() {
        let renderer = DiagramRenderer::new("https://render.example/svg/");
        let body = "erDiagram\n  CLIENTÈLE ||--o{ COMMANDE : passe";
        let url = renderer.encode(body);
        assert!(url.starts_with("https://render.example/svg/"));
        assert_eq!(renderer.decode_payload(&url).unwrap(), body);
    }

    #[test]
    fn test_decode_rejects_foreign_urls() {
        let renderer = DiagramRenderer::default();
        assert!(renderer.decode_payload("https://example.com/abc").is_none());
        assert!(renderer.decode_payload("https://mermaid.ink/svg/!!!").is_none());
    }

    #[test]
    fn test_fenced_blocks() {
        let content = "a\n```mermaid\nx\n```\nb";
        assert_eq!(fenced_blocks(content), vec!["```mermaid\nx\n```"]);
    }
}
