/// Narrative templates — parsing and infallible rendering.
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template parse error: {0}")]
    Parse(String),
    #[error("unknown template field '{0}'")]
    UnknownField(String),
}

/// A value a template can interpolate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateField {
    Subject,
    Author,
    ShortSha,
    /// Percentage of the history walked, 0-100.
    Progress,
    /// One-based position of the current commit.
    CommitNumber,
    Total,
    Chapter,
    TimeOfDay,
    Hp,
    MaxHp,
    Level,
    Xp,
    ItemCount,
    AuthorCount,
}

impl TemplateField {
    fn from_name(name: &str) -> Option<TemplateField> {
        let field = match name {
            "subject" => Self::Subject,
            "author" => Self::Author,
            "short_sha" => Self::ShortSha,
            "progress" => Self::Progress,
            "commit_number" => Self::CommitNumber,
            "total" => Self::Total,
            "chapter" => Self::Chapter,
            "time_of_day" => Self::TimeOfDay,
            "hp" => Self::Hp,
            "max_hp" => Self::MaxHp,
            "level" => Self::Level,
            "xp" => Self::Xp,
            "item_count" => Self::ItemCount,
            "author_count" => Self::AuthorCount,
            _ => return None,
        };
        Some(field)
    }
}

/// A segment of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateSegment {
    /// Literal text, emitted as-is.
    Literal(String),
    /// Interpolated value: `{field}`.
    Field(TemplateField),
}

/// Source of field values during rendering.
pub trait FieldSource {
    fn field(&self, field: TemplateField) -> Cow<'_, str>;
}

/// A parsed template: a sequence of segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub segments: Vec<TemplateSegment>,
}

impl Template {
    /// Parse a template string into a sequence of segments.
    ///
    /// Syntax:
    /// - `{field}` → `Field` (see `TemplateField` for names)
    /// - `{{` / `}}` → literal braces
    /// - Everything else → `Literal`
    pub fn parse(input: &str) -> Result<Template, TemplateError> {
        let mut segments = Vec::new();
        let mut literal_buf = String::new();
        let chars: Vec<char> = input.chars().collect();
        let len = chars.len();
        let mut i = 0;

        while i < len {
            if chars[i] == '{' {
                // Escaped brace
                if i + 1 < len && chars[i + 1] == '{' {
                    literal_buf.push('{');
                    i += 2;
                    continue;
                }

                if !literal_buf.is_empty() {
                    segments.push(TemplateSegment::Literal(std::mem::take(&mut literal_buf)));
                }

                let start = i + 1;
                let mut end = start;
                while end < len && chars[end] != '}' {
                    if chars[end] == '{' {
                        return Err(TemplateError::Parse(
                            "nested braces are not allowed".to_string(),
                        ));
                    }
                    end += 1;
                }
                if end == len {
                    return Err(TemplateError::Parse("unclosed brace".to_string()));
                }

                let name: String = chars[start..end].iter().collect();
                let name = name.trim();
                if name.is_empty() {
                    return Err(TemplateError::Parse("empty braces".to_string()));
                }
                let field = TemplateField::from_name(name)
                    .ok_or_else(|| TemplateError::UnknownField(name.to_string()))?;
                segments.push(TemplateSegment::Field(field));
                i = end + 1;
            } else if chars[i] == '}' {
                if i + 1 < len && chars[i + 1] == '}' {
                    literal_buf.push('}');
                    i += 2;
                    continue;
                }
                return Err(TemplateError::Parse(
                    "unmatched closing brace".to_string(),
                ));
            } else {
                literal_buf.push(chars[i]);
                i += 1;
            }
        }

        if !literal_buf.is_empty() {
            segments.push(TemplateSegment::Literal(literal_buf));
        }

        Ok(Template { segments })
    }

    /// Render against a field source. Never fails: every field was checked at parse time.
    pub fn render(&self, source: &dyn FieldSource) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                TemplateSegment::Literal(text) => out.push_str(text),
                TemplateSegment::Field(field) => out.push_str(&source.field(*field)),
            }
        }
        out
    }

    /// Fields referenced by this template, in order of appearance.
    pub fn fields(&self) -> impl Iterator<Item = TemplateField> + '_ {
        self.segments.iter().filter_map(|s| match s {
            TemplateSegment::Field(f) => Some(*f),
            TemplateSegment::Literal(_) => None,
        })
    }
}
