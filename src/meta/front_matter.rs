//! Front matter detection and structured-data parsing.
//!
//! | Opening line | Closing line | Format |
//! |--------------|--------------|--------|
//! | `{`…         | …`}`         | JSON (delimiters are part of the data) |
//! | `---`        | `---`        | YAML |
//! | `+++`        | `+++`        | TOML |
//! | ```` ```yaml ```` / `toml` / `json` | ```` ``` ```` | fenced |
//!
//! Anything else means the document has no front matter.

use super::{MetaTable, Value};
use thiserror::Error;

/// Structured-data formats understood in metadata sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    Toml,
}

impl Format {
    /// Format for a data file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Yaml => "YAML",
            Self::Toml => "TOML",
        }
    }
}

#[derive(Debug, Error)]
pub enum FrontMatterError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0} data is not a table")]
    NotATable(&'static str),

    #[error("unterminated {0} front matter")]
    Unterminated(&'static str),
}

/// A document split into its metadata block and body.
#[derive(Debug)]
pub struct FrontMatter<'a> {
    pub meta: Option<MetaTable>,
    pub body: &'a str,
}

// ============================================================================
// Public API
// ============================================================================

/// Split a document into front matter and body.
pub fn split(text: &str) -> Result<FrontMatter<'_>, FrontMatterError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let first = text.lines().next().unwrap_or_default().trim_end();

    let (format, closing) = match first {
        "---" => (Format::Yaml, "---"),
        "+++" => (Format::Toml, "+++"),
        "```yaml" | "```yml" => (Format::Yaml, "```"),
        "```toml" => (Format::Toml, "```"),
        "```json" => (Format::Json, "```"),
        line if line.starts_with('{') => return split_json(text),
        _ => {
            return Ok(FrontMatter {
                meta: None,
                body: text,
            });
        }
    };

    let mut lines = line_spans(text);
    let Some((_, after_open, _)) = lines.next() else {
        return Err(FrontMatterError::Unterminated(format.label()));
    };
    for (start, end, line) in lines {
        if line.trim_end() == closing {
            let meta = parse_data(format, &text[after_open..start])?;
            return Ok(FrontMatter {
                meta: Some(meta),
                body: &text[end..],
            });
        }
    }
    Err(FrontMatterError::Unterminated(format.label()))
}

/// Parse a whole structured-data document into a table.
///
/// Empty input is an empty table.
pub fn parse_data(format: Format, text: &str) -> Result<MetaTable, FrontMatterError> {
    if text.trim().is_empty() {
        return Ok(MetaTable::new());
    }
    let value = match format {
        Format::Json => Value::from(serde_json::from_str::<serde_json::Value>(text)?),
        Format::Yaml => Value::from(serde_yaml::from_str::<serde_json::Value>(text)?),
        Format::Toml => Value::from(toml::from_str::<toml::Value>(text)?),
    };
    match value {
        Value::Table(table) => Ok(table),
        _ => Err(FrontMatterError::NotATable(format.label())),
    }
}

/// Parse a declaration file whose format is not known from its name.
///
/// `{` means JSON, a `+++` block means TOML; otherwise YAML is tried first
/// and TOML second.
pub fn parse_sniffed(text: &str) -> Result<MetaTable, FrontMatterError> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') {
        return parse_data(Format::Json, text);
    }
    if trimmed.starts_with("+++") {
        let inner = trimmed
            .trim_start_matches("+++")
            .trim_end()
            .trim_end_matches("+++");
        return parse_data(Format::Toml, inner);
    }
    match parse_data(Format::Yaml, text) {
        Ok(table) => Ok(table),
        Err(yaml_err) => parse_data(Format::Toml, text).map_err(|_| yaml_err),
    }
}

// ============================================================================
// Internal
// ============================================================================

/// JSON front matter ends at the first line closing a parseable object.
fn split_json(text: &str) -> Result<FrontMatter<'_>, FrontMatterError> {
    let mut last_err = None;
    for (_, end, line) in line_spans(text) {
        if !line.trim_end().ends_with('}') {
            continue;
        }
        match parse_data(Format::Json, &text[..end]) {
            Ok(meta) => {
                return Ok(FrontMatter {
                    meta: Some(meta),
                    body: &text[end..],
                });
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or(FrontMatterError::Unterminated("JSON")))
}

/// Lines with their byte span; `end` includes the newline.
fn line_spans(text: &str) -> impl Iterator<Item = (usize, usize, &str)> {
    text.split_inclusive('\n').scan(0, |offset, line| {
        let start = *offset;
        *offset += line.len();
        Some((start, *offset, line.trim_end_matches(['\n', '\r'])))
    })
}
