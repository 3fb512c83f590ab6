use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::voices::Speaker;

/// Structural or content rule a candidate script broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Missing,
    WrongType(&'static str),
    Blank,
    Markdown,
    UnknownSpeaker(String),
    NoItems,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Missing => f.write_str("field is required"),
            Rule::WrongType(expected) => write!(f, "expected {expected}"),
            Rule::Blank => f.write_str("must not be empty or whitespace"),
            Rule::Markdown => f.write_str(
                "must not contain markdown emphasis (**, __, _) or list markers (* , - )",
            ),
            Rule::UnknownSpeaker(found) => {
                write!(f, "speaker must be 'Host' or 'Guest', found {found:?}")
            }
            Rule::NoItems => f.write_str("must contain at least one item"),
        }
    }
}

/// A candidate document failed validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {rule}")]
pub struct SchemaViolation {
    /// Path to the offending field, e.g. `script_segments[0].paragraphs[2].text`.
    pub field: String,
    pub rule: Rule,
}

impl SchemaViolation {
    fn new(field: impl Into<String>, rule: Rule) -> Self {
        Self {
            field: field.into(),
            rule,
        }
    }
}

/// A validated podcast script.
///
/// Only obtainable through [`ScriptDocument::validate`], so holding one means
/// every invariant holds: a non-blank title, at least one segment, at least
/// one paragraph per segment, plain-prose paragraph text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptDocument {
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(rename = "script_segments")]
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    #[serde(rename = "segment_title", skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    paragraphs: Vec<Paragraph>,
}

/// Smallest unit of speech: one role reading one plain-prose paragraph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paragraph {
    speaker: Speaker,
    text: String,
}

impl ScriptDocument {
    /// Validate a parsed JSON candidate into a typed document.
    ///
    /// Rules are checked bottom-up (paragraph, then segment, then document)
    /// and the first violation rejects the whole document.
    pub fn validate(candidate: &Value) -> Result<Self, SchemaViolation> {
        let root = as_object(candidate, "$")?;

        let (key, segments) = match (root.get("script_segments"), root.get("segments")) {
            (Some(v), _) => ("script_segments", v),
            (None, Some(v)) => ("segments", v),
            (None, None) => return Err(SchemaViolation::new("script_segments", Rule::Missing)),
        };
        let segments = segments
            .as_array()
            .ok_or_else(|| SchemaViolation::new(key, Rule::WrongType("array")))?
            .iter()
            .enumerate()
            .map(|(i, segment)| Segment::validate(segment, &format!("{key}[{i}]")))
            .collect::<Result<Vec<_>, _>>()?;
        if segments.is_empty() {
            return Err(SchemaViolation::new(key, Rule::NoItems));
        }

        let title = required_str(root, "title", "title")?;
        if title.trim().is_empty() {
            return Err(SchemaViolation::new("title", Rule::Blank));
        }
        let summary = optional_str(root, "summary", "summary")?;

        Ok(Self {
            title: title.to_string(),
            summary: summary.map(str::to_string),
            segments,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Every paragraph in document order.
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.segments.iter().flat_map(|s| s.paragraphs.iter())
    }

    pub fn paragraph_count(&self) -> usize {
        self.segments.iter().map(|s| s.paragraphs.len()).sum()
    }

    /// Flatten the script into a plain transcript.
    ///
    /// Title, summary and segment titles are headings followed by a blank
    /// line; paragraphs follow on consecutive lines, in document order.
    pub fn transcript(&self) -> String {
        let mut parts = vec![format!("{}\n", self.title)];
        if let Some(summary) = &self.summary {
            parts.push(format!("{summary}\n"));
        }
        for segment in &self.segments {
            if let Some(title) = &segment.title {
                parts.push(format!("{title}\n"));
            }
            parts.extend(segment.paragraphs.iter().map(|p| p.text.clone()));
        }
        parts.join("\n")
    }
}

impl Segment {
    fn validate(value: &Value, path: &str) -> Result<Self, SchemaViolation> {
        let obj = as_object(value, path)?;

        let paragraphs_path = format!("{path}.paragraphs");
        let paragraphs = obj
            .get("paragraphs")
            .ok_or_else(|| SchemaViolation::new(&paragraphs_path, Rule::Missing))?
            .as_array()
            .ok_or_else(|| SchemaViolation::new(&paragraphs_path, Rule::WrongType("array")))?
            .iter()
            .enumerate()
            .map(|(i, p)| Paragraph::validate(p, &format!("{paragraphs_path}[{i}]")))
            .collect::<Result<Vec<_>, _>>()?;
        if paragraphs.is_empty() {
            return Err(SchemaViolation::new(paragraphs_path, Rule::NoItems));
        }

        let title = match obj.get("segment_title") {
            Some(_) => optional_str(obj, "segment_title", &format!("{path}.segment_title"))?,
            None => optional_str(obj, "title", &format!("{path}.title"))?,
        };

        Ok(Self {
            title: title.map(str::to_string),
            paragraphs,
        })
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }
}

impl Paragraph {
    fn validate(value: &Value, path: &str) -> Result<Self, SchemaViolation> {
        let obj = as_object(value, path)?;

        let speaker_path = format!("{path}.speaker");
        let speaker = required_str(obj, "speaker", &speaker_path)?
            .parse::<Speaker>()
            .map_err(|found| SchemaViolation::new(&speaker_path, Rule::UnknownSpeaker(found)))?;

        let text_path = format!("{path}.text");
        let text = required_str(obj, "text", &text_path)?;
        if text.trim().is_empty() {
            return Err(SchemaViolation::new(text_path, Rule::Blank));
        }
        if contains_markdown(text) {
            return Err(SchemaViolation::new(text_path, Rule::Markdown));
        }

        Ok(Self {
            speaker,
            text: text.trim().to_string(),
        })
    }

    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// True when `text` carries markdown the speech engine would read aloud.
///
/// Flags `**`, `__`, an underscore that does not continue a word, and a `*`
/// or `-` that starts the text or follows whitespace and is itself followed
/// by whitespace.
pub fn contains_markdown(text: &str) -> bool {
    if text.contains("**") || text.contains("__") {
        return true;
    }

    let chars: Vec<char> = text.chars().collect();
    chars.iter().enumerate().any(|(i, &ch)| {
        let prev = i.checked_sub(1).map(|j| chars[j]);
        match ch {
            '_' => !prev.is_some_and(is_word_char),
            '*' | '-' => {
                prev.is_none_or(char::is_whitespace)
                    && chars.get(i + 1).is_some_and(|next| next.is_whitespace())
            }
            _ => false,
        }
    })
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn as_object<'v>(value: &'v Value, path: &str) -> Result<&'v Map<String, Value>, SchemaViolation> {
    value
        .as_object()
        .ok_or_else(|| SchemaViolation::new(path, Rule::WrongType("object")))
}

fn required_str<'v>(
    obj: &'v Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'v str, SchemaViolation> {
    match obj.get(key) {
        None | Some(Value::Null) => Err(SchemaViolation::new(path, Rule::Missing)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(SchemaViolation::new(path, Rule::WrongType("string"))),
    }
}

fn optional_str<'v>(
    obj: &'v Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<&'v str>, SchemaViolation> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(SchemaViolation::new(path, Rule::WrongType("string"))),
    }
}
