//! Text extraction from fetched source documents.

use std::path::Path;

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    Html,
    PlainText,
}

impl ContentType {
    /// Detect content type from file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("md") | Some("markdown") => Some(Self::Markdown),
            Some("html") | Some("htm") => Some(Self::Html),
            Some("txt") => Some(Self::PlainText),
            _ => None,
        }
    }

    /// Detect content type from an HTTP `Content-Type` header value.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.to_ascii_lowercase();
        if mime.contains("html") {
            Some(Self::Html)
        } else if mime.contains("markdown") {
            Some(Self::Markdown)
        } else if mime.starts_with("text/plain") {
            Some(Self::PlainText)
        } else {
            None
        }
    }

    /// Guess from the document body when nothing else says.
    pub fn sniff(body: &str) -> Self {
        let head: String = body
            .trim_start()
            .chars()
            .take(512)
            .collect::<String>()
            .to_ascii_lowercase();
        if head.starts_with("<!doctype html") || head.contains("<html") {
            Self::Html
        } else {
            Self::PlainText
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::PlainText => "text",
        }
    }
}

/// Title and clean text extracted from a document.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub title: Option<String>,
    pub text: String,
}

/// Extract the title and clean text from a raw document.
pub fn parse_document(raw: &str, content_type: ContentType) -> ParsedDocument {
    match content_type {
        ContentType::Html => ParsedDocument {
            title: html_title(raw),
            text: clean_html(raw),
        },
        ContentType::Markdown => ParsedDocument {
            title: markdown_title(raw),
            text: clean_markdown(raw),
        },
        ContentType::PlainText => ParsedDocument {
            title: None,
            text: raw.trim().to_string(),
        },
    }
}

/// Clean markdown by removing excess formatting.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();

        // Horizontal rules and code fences
        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }

        if !trimmed.is_empty() {
            result.push_str(trimmed);
            result.push('\n');
        }
    }

    result.trim().to_string()
}

fn markdown_title(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| line.starts_with("# "))
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .filter(|t| !t.is_empty())
}

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "tr", "td", "th", "table", "h1", "h2", "h3", "h4", "h5",
    "h6", "section", "article", "header", "footer", "nav", "main", "blockquote", "pre", "title",
];

/// Strip tags, scripts, styles and comments from HTML.
///
/// Block-level tags become line breaks; whitespace within a line is collapsed.
fn clean_html(html: &str) -> String {
    // ASCII lowering keeps byte offsets aligned with `html`.
    let lower = html.to_ascii_lowercase();

    let mut out = String::with_capacity(html.len());
    let mut tag = String::new();
    let mut in_tag = false;
    let mut skipping: Option<&'static str> = None;

    for (i, ch) in html.char_indices() {
        if let Some(end) = skipping {
            if lower[i..].starts_with(end) {
                skipping = None;
                in_tag = true;
                tag.clear();
            }
            continue;
        }

        if in_tag {
            if ch != '>' {
                tag.push(ch);
                continue;
            }
            in_tag = false;

            let name = tag_name(&tag);
            let opening = !tag.starts_with('/') && !tag.ends_with('/');
            if opening && name == "script" {
                skipping = Some("</script");
            } else if opening && name == "style" {
                skipping = Some("</style");
            } else if BLOCK_TAGS.contains(&name.as_str()) {
                out.push('\n');
            }
            tag.clear();
            continue;
        }

        if ch == '<' {
            if lower[i..].starts_with("<!--") {
                skipping = Some("-->");
            } else {
                in_tag = true;
            }
            continue;
        }

        out.push(ch);
    }

    decode_entities(&out)
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn html_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let content_start = open + lower[open..].find('>')? + 1;
    let content_end = content_start + lower[content_start..].find("</title")?;

    let title = decode_entities(&html[content_start..content_end])
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}
