//! BibTeX record parsing and annotation merge
//!
//! The export service returns a blank-line separated sequence of records. Each
//! record is parsed into a lead (`@type{`), an identifier segment, a list of
//! fields and a closing; serializing an unmodified record reproduces its input
//! byte for byte. Tags and notes are added as fields before the closing brace.

use std::borrow::Cow;
use thiserror::Error;

/// Width of a bibliographic code
pub const BIBCODE_LEN: usize = 19;

/// Record separator in export text
const RECORD_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BibtexError {
    #[error("Record has no entry marker: {0}")]
    MissingMarker(String),

    #[error("Record identifier is shorter than 19 characters: {0}")]
    ShortIdentifier(String),

    #[error("Record is not terminated: {0}")]
    Unterminated(String),
}

/// One `name = value` field, kept as raw text
#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    /// Lower-cased field name; empty when the segment has no `=`
    name: String,
    /// Segment text between the surrounding commas
    raw: String,
}

/// A parsed record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    lead: String,
    bibcode: String,
    key_segment: String,
    fields: Vec<Field>,
    trailing_comma: bool,
    before_close: String,
    trailer: String,
}

impl Record {
    pub fn parse(text: &str) -> Result<Self, BibtexError> {
        let at = text
            .find('@')
            .ok_or_else(|| BibtexError::MissingMarker(excerpt(text)))?;
        let open = text[at..]
            .find('{')
            .map(|i| at + i)
            .ok_or_else(|| BibtexError::MissingMarker(excerpt(text)))?;

        let entry_type = &text[at + 1..open];
        if entry_type.is_empty() || !entry_type.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(BibtexError::MissingMarker(excerpt(text)));
        }

        let body_start = open + 1;
        let bibcode: String = text[body_start..].chars().take(BIBCODE_LEN).collect();
        if bibcode.chars().count() < BIBCODE_LEN || bibcode.contains(&['\n', ',', '}'][..]) {
            return Err(BibtexError::ShortIdentifier(excerpt(text)));
        }

        // Top-level commas split segments; the brace that returns depth to zero closes
        let mut depth = 1usize;
        let mut in_quote = false;
        let mut splits = Vec::new();
        let mut close = None;
        for (i, c) in text[body_start..].char_indices() {
            let pos = body_start + i;
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(pos);
                        break;
                    }
                }
                '"' if depth == 1 => in_quote = !in_quote,
                ',' if depth == 1 && !in_quote => splits.push(pos),
                _ => {}
            }
        }
        let close = close.ok_or_else(|| BibtexError::Unterminated(excerpt(text)))?;

        let mut segments = Vec::with_capacity(splits.len() + 1);
        let mut start = body_start;
        for split in splits {
            segments.push(&text[start..split]);
            start = split + 1;
        }
        segments.push(&text[start..close]);

        let mut key_segment = segments[0].to_string();
        let mut fields: Vec<Field> = segments[1..].iter().map(|s| Field::from_raw(s)).collect();

        let mut trailing_comma = false;
        let before_close = match fields.last_mut() {
            Some(last) if last.raw.trim().is_empty() => {
                trailing_comma = true;
                let whitespace = last.raw.clone();
                fields.pop();
                whitespace
            }
            Some(last) => split_trailing_whitespace(&mut last.raw),
            None => split_trailing_whitespace(&mut key_segment),
        };

        Ok(Record {
            lead: text[..body_start].to_string(),
            bibcode,
            key_segment,
            fields,
            trailing_comma,
            before_close,
            trailer: text[close..].to_string(),
        })
    }

    pub fn bibcode(&self) -> &str {
        &self.bibcode
    }

    /// Merge tags into the keywords field, creating it when absent
    pub fn merge_keywords(&mut self, tags: &[String]) {
        if tags.is_empty() {
            return;
        }
        let joined = tags.join(", ");

        match self.fields.iter_mut().find(|f| f.name == "keywords") {
            Some(field) => field.merge_value(&joined),
            None => self.push_field("keywords", &joined),
        }
    }

    /// Append a notes field; existing notes are left alone
    pub fn append_notes(&mut self, notes: &[String]) {
        if notes.is_empty() {
            return;
        }
        self.push_field("notes", &notes.join(", "));
    }

    fn push_field(&mut self, name: &str, value: &str) {
        let indent = self
            .fields
            .first()
            .map(|f| f.indent())
            .unwrap_or_else(|| " ".to_string());

        self.fields.push(Field {
            name: name.to_string(),
            raw: format!("\n{}{} = {{{}}}", indent, name, brace_safe(value)),
        });
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.lead)?;
        f.write_str(&self.key_segment)?;
        for field in &self.fields {
            f.write_str(",")?;
            f.write_str(&field.raw)?;
        }
        if self.trailing_comma {
            f.write_str(",")?;
        }
        f.write_str(&self.before_close)?;
        f.write_str(&self.trailer)
    }
}

impl Field {
    fn from_raw(raw: &str) -> Self {
        let name = raw
            .split_once('=')
            .map(|(name, _)| name.trim().to_ascii_lowercase())
            .unwrap_or_default();
        Field {
            name,
            raw: raw.to_string(),
        }
    }

    /// Whitespace that precedes the name on its own line
    fn indent(&self) -> String {
        let lead = &self.raw[..self.raw.len() - self.raw.trim_start().len()];
        match lead.rfind('\n') {
            Some(i) => lead[i + 1..].to_string(),
            None => lead.to_string(),
        }
    }

    /// Append to the existing value, keeping it first
    fn merge_value(&mut self, addition: &str) {
        let Some(eq) = self.raw.find('=') else {
            return;
        };
        let after_eq = &self.raw[eq + 1..];
        let value_start = eq + 1 + (after_eq.len() - after_eq.trim_start().len());
        let value = self.raw[value_start..].trim_end();
        let tail = self.raw[value_start + value.len()..].to_string();

        let existing = if (value.starts_with('{') && value.ends_with('}'))
            || (value.starts_with('"') && value.ends_with('"') && value.len() >= 2)
        {
            &value[1..value.len() - 1]
        } else {
            value
        };

        let merged = if existing.trim().is_empty() {
            brace_safe(addition).into_owned()
        } else {
            format!("{}, {}", existing, brace_safe(addition))
        };

        self.raw = format!("{}{{{}}}{}", &self.raw[..value_start], merged, tail);
    }
}

/// Strip braces from values that would unbalance the record
fn brace_safe(value: &str) -> Cow<'_, str> {
    let mut depth = 0i64;
    for c in value.chars() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    break;
                }
            }
            _ => {}
        }
    }

    if depth == 0 {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(value.chars().filter(|c| *c != '{' && *c != '}').collect())
    }
}

fn split_trailing_whitespace(text: &mut String) -> String {
    let kept = text.trim_end().len();
    text.split_off(kept)
}

fn excerpt(text: &str) -> String {
    text.trim().chars().take(60).collect()
}

/// Split export text into non-blank records
pub fn split_records(text: &str) -> impl Iterator<Item = &str> {
    text.split(RECORD_SEPARATOR).filter(|r| !r.trim().is_empty())
}

/// Parse every record in `text`, annotate it and join the result
///
/// Any record that fails to parse fails the whole text.
pub fn annotate<F>(text: &str, mut annotations: F) -> Result<String, BibtexError>
where
    F: FnMut(&str) -> Option<(Vec<String>, Vec<String>)>,
{
    let mut out = Vec::new();
    for raw in split_records(text) {
        let mut record = Record::parse(raw)?;
        if let Some((tags, notes)) = annotations(record.bibcode()) {
            record.merge_keywords(&tags);
            record.append_notes(&notes);
        }
        out.push(record.to_string());
    }
    Ok(out.join(RECORD_SEPARATOR))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = "@ARTICLE{2015MNRAS.446.4239E,\n   author = {{Elliott}, J. and {de Grijs}, R.},\n    title = \"{Tidal streams, part 1}\",\n keywords = {foo},\n     year = 2015\n}";

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_round_trip_preserves_text() {
        let record = Record::parse(RECORD).unwrap();
        assert_eq!(record.bibcode(), "2015MNRAS.446.4239E");
        assert_eq!(record.to_string(), RECORD);
    }

    #[test]
    fn test_round_trip_with_trailing_comma() {
        let text = "@INPROCEEDINGS{2015A&C....10...61E,\n  year = 2015,\n}";
        assert_eq!(Record::parse(text).unwrap().to_string(), text);
    }

    #[test]
    fn test_keywords_merged_after_existing() {
        let mut record = Record::parse(RECORD).unwrap();
        record.merge_keywords(&tags(&["bar"]));

        let out = record.to_string();
        assert!(out.contains("keywords = {foo, bar}"));
        assert_eq!(out.matches("keywords").count(), 1);
    }

    #[test]
    fn test_keywords_added_when_absent() {
        let text = "@ARTICLE{2015MNRAS.446.4239E,\n   year = 2015\n}";
        let mut record = Record::parse(text).unwrap();
        record.merge_keywords(&tags(&["baz"]));

        assert_eq!(
            record.to_string(),
            "@ARTICLE{2015MNRAS.446.4239E,\n   year = 2015,\n   keywords = {baz}\n}"
        );
    }

    #[test]
    fn test_notes_always_appended() {
        let text = "@ARTICLE{2015MNRAS.446.4239E,\n   notes = {old},\n   year = 2015\n}";
        let mut record = Record::parse(text).unwrap();
        record.append_notes(&tags(&["first", "second"]));

        let out = record.to_string();
        assert!(out.contains("notes = {old}"));
        assert!(out.ends_with("year = 2015,\n   notes = {first, second}\n}"));
    }

    #[test]
    fn test_keyword_names_match_case_insensitively() {
        let text = "@ARTICLE{2015MNRAS.446.4239E,\n KEYWORDS = \"alpha\"\n}";
        let mut record = Record::parse(text).unwrap();
        record.merge_keywords(&tags(&["beta"]));
        assert!(record.to_string().contains("KEYWORDS = {alpha, beta}"));
    }

    #[test]
    fn test_unbalanced_tag_braces_stripped() {
        let text = "@ARTICLE{2015MNRAS.446.4239E,\n year = 2015\n}";
        let mut record = Record::parse(text).unwrap();
        record.merge_keywords(&tags(&["bad}tag"]));
        assert!(record.to_string().contains("keywords = {badtag}"));
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(
            Record::parse("no marker here"),
            Err(BibtexError::MissingMarker(_))
        ));
        assert!(matches!(
            Record::parse("@ARTICLE{short,\n year = 1\n}"),
            Err(BibtexError::ShortIdentifier(_))
        ));
        assert!(matches!(
            Record::parse("@ARTICLE{2015MNRAS.446.4239E,\n title = {open\n"),
            Err(BibtexError::Unterminated(_))
        ));
    }

    #[test]
    fn test_annotate_aborts_on_bad_record() {
        let text = format!("{}\n\nnot a record\n\n", RECORD);
        assert!(annotate(&text, |_| None).is_err());
    }

    #[test]
    fn test_annotate_leaves_unannotated_records() {
        let second = "@ARTICLE{2015A&C....10...61E,\n year = 2015\n}";
        let text = format!("{}\n\n{}\n", RECORD, second);

        let out = annotate(&text, |bibcode| {
            (bibcode == "2015A&C....10...61E").then(|| (tags(&["x"]), Vec::new()))
        })
        .unwrap();

        let records: Vec<&str> = split_records(&out).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], RECORD);
        assert!(records[1].contains("keywords = {x}"));
    }
}
