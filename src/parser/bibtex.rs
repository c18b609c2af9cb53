//! BibTeX reading and writing.
//!
//! The reader is a tolerant segmenting parser: it finds `@type{...}` blocks by
//! brace matching, then splits each block into a citation key and
//! `name = value` assignments. Malformed blocks are skipped with an actionable
//! message instead of failing the whole collection.

use std::fmt::Write as _;

use tracing::{debug, instrument};

const IGNORED_BLOCK_TYPES: [&str; 3] = ["comment", "preamble", "string"];

/// One bibliographic record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibEntry {
    /// Entry type, lowercased (`article`, `book`, `misc`, ...).
    pub entry_type: String,
    /// Citation key after `@type{`.
    pub key: String,
    fields: Vec<(String, String)>,
}

impl BibEntry {
    /// Creates an entry with no fields.
    #[must_use]
    pub fn new(entry_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            entry_type: entry_type.into().to_ascii_lowercase(),
            key: key.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style field setter, mostly for tests and the Zotero client.
    #[must_use]
    pub fn with_field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_field(name, value);
        self
    }

    /// Returns a field value by case-insensitive name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field_name, _)| field_name.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Sets a field, replacing an existing value in place or appending.
    pub fn set_field(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(slot) = self
            .fields
            .iter_mut()
            .find(|(field_name, _)| field_name.eq_ignore_ascii_case(name))
        {
            slot.1 = value;
        } else {
            self.fields.push((name.to_ascii_lowercase(), value));
        }
    }

    /// Fields in source order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

/// Batch parse result for BibTeX input.
#[derive(Debug, Clone, Default)]
pub struct BibtexParseResult {
    /// Parsed entries in input order.
    pub entries: Vec<BibEntry>,
    /// Actionable messages for skipped blocks.
    pub skipped: Vec<String>,
}

/// Parses every BibTeX entry in `input`.
#[instrument(skip(input), fields(input_len = input.len()))]
#[must_use]
pub fn parse_bibtex(input: &str) -> BibtexParseResult {
    let mut result = BibtexParseResult::default();

    for raw_entry in segment_entries(input) {
        match parse_entry(&raw_entry) {
            EntryOutcome::Parsed(entry) => result.entries.push(entry),
            EntryOutcome::Ignore => {}
            EntryOutcome::Skip(message) => {
                debug!(message = %message, "Skipped BibTeX block");
                result.skipped.push(message);
            }
        }
    }

    result
}

/// Renders entries back to BibTeX text, one block per entry.
#[must_use]
pub fn render_bibtex(entries: &[BibEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(out, "@{}{{{},", entry.entry_type, entry.key);
        for (name, value) in entry.fields() {
            let _ = writeln!(out, "  {name} = {{{value}}},");
        }
        out.push_str("}\n\n");
    }
    out
}

#[derive(Debug)]
enum EntryOutcome {
    Parsed(BibEntry),
    Ignore,
    Skip(String),
}

fn segment_entries(input: &str) -> Vec<String> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut entries = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        if chars[i].1 != '@' {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < chars.len() && chars[j].1.is_ascii_alphabetic() {
            j += 1;
        }
        while j < chars.len() && chars[j].1.is_whitespace() {
            j += 1;
        }

        if j >= chars.len() || chars[j].1 != '{' {
            i += 1;
            continue;
        }

        let start = chars[i].0;
        match find_block_end(&chars, j) {
            Some(end_index) => {
                let end_exclusive = chars.get(end_index + 1).map_or(input.len(), |c| c.0);
                entries.push(input[start..end_exclusive].trim().to_string());
                i = end_index + 1;
            }
            None => {
                // Unbalanced block: capture up to the next `@` at a line start
                // so one broken entry does not swallow the rest of the file.
                let recovery = (i + 1..chars.len())
                    .find(|&k| chars[k].1 == '@' && matches!(chars[k - 1].1, '\n' | '\r'));
                if let Some(recovery) = recovery {
                    entries.push(input[start..chars[recovery].0].trim().to_string());
                    i = recovery;
                } else {
                    entries.push(input[start..].trim().to_string());
                    break;
                }
            }
        }
    }

    entries
}

fn find_block_end(chars: &[(usize, char)], open_index: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut escape = false;

    for (k, (_, ch)) in chars.iter().enumerate().skip(open_index) {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' => escape = true,
            '"' if depth <= 1 => in_quotes = !in_quotes,
            _ if in_quotes => {}
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(k);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_entry(raw_entry: &str) -> EntryOutcome {
    let trimmed = raw_entry.trim();
    let Some(after_at) = trimmed.strip_prefix('@') else {
        return EntryOutcome::Skip(
            "What: malformed BibTeX entry. Why: missing '@type{...}' prefix. Fix: start entries with @article{key, ...}."
                .to_string(),
        );
    };
    let Some(brace_pos) = after_at.find('{') else {
        return EntryOutcome::Skip(format!(
            "What: malformed BibTeX entry `{}`. Why: missing opening '{{' after entry type. Fix: use `@type{{key, field = value}}`.",
            preview(trimmed)
        ));
    };

    let entry_type = after_at[..brace_pos].trim().to_ascii_lowercase();
    if IGNORED_BLOCK_TYPES.contains(&entry_type.as_str()) {
        return EntryOutcome::Ignore;
    }
    if entry_type.is_empty() {
        return EntryOutcome::Skip(format!(
            "What: malformed BibTeX entry `{}`. Why: empty entry type. Fix: use `@type{{key, field = value}}`.",
            preview(trimmed)
        ));
    }

    if !trimmed.ends_with('}') {
        return EntryOutcome::Skip(format!(
            "What: malformed BibTeX entry `{}`. Why: unbalanced braces (entry never closed). Fix: ensure each '{{' has a matching '}}'.",
            preview(trimmed)
        ));
    }
    let body = &after_at[brace_pos + 1..after_at.len() - 1];
    let (key_raw, fields_raw) = body.split_once(',').unwrap_or((body, ""));

    let key = key_raw.trim();
    if key.is_empty() {
        return EntryOutcome::Skip(format!(
            "What: malformed BibTeX entry `{}`. Why: empty citation key. Fix: provide a non-empty key before the first comma.",
            preview(trimmed)
        ));
    }

    match parse_fields(fields_raw) {
        Ok(fields) => EntryOutcome::Parsed(BibEntry {
            entry_type,
            key: key.to_string(),
            fields,
        }),
        Err(reason) => EntryOutcome::Skip(format!(
            "What: malformed BibTeX field assignment in `{}`. Why: {reason}. Fix: use `field = {{value}}` or `field = \"value\"` with commas between fields.",
            preview(trimmed)
        )),
    }
}

fn parse_fields(input: &str) -> Result<Vec<(String, String)>, String> {
    let mut pairs = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut escape = false;

    for ch in input.chars() {
        if escape {
            current.push(ch);
            escape = false;
            continue;
        }
        match ch {
            '\\' => escape = true,
            '"' if depth == 0 => in_quotes = !in_quotes,
            _ if in_quotes => {}
            '{' => depth += 1,
            '}' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "closing brace without matching opening brace".to_string())?;
            }
            ',' if depth == 0 => {
                let segment = current.trim();
                if !segment.is_empty() {
                    pairs.push(segment.to_string());
                }
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }

    if in_quotes {
        return Err("unterminated quoted value".to_string());
    }
    if depth != 0 {
        return Err("unbalanced braces in field values".to_string());
    }

    let tail = current.trim();
    if !tail.is_empty() {
        pairs.push(tail.to_string());
    }

    let mut fields: Vec<(String, String)> = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let Some((name, value_raw)) = pair.split_once('=') else {
            return Err(format!("missing '=' in field segment `{}`", preview(&pair)));
        };
        let field_name = name.trim().to_ascii_lowercase();
        if field_name.is_empty() {
            return Err("empty field name".to_string());
        }
        let value = strip_bibtex_value(value_raw)
            .ok_or_else(|| format!("invalid value in field `{field_name}`"))?;
        // First value wins, as BibTeX itself does.
        if !fields.iter().any(|(existing, _)| *existing == field_name) {
            fields.push((field_name, value));
        }
    }

    Ok(fields)
}

fn strip_bibtex_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(inner) = trimmed
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
    {
        return Some(inner.trim().to_string());
    }
    if let Some(inner) = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        return Some(inner.replace("\\\"", "\"").trim().to_string());
    }

    Some(trimmed.to_string())
}

fn preview(input: &str) -> String {
    const MAX: usize = 80;
    if input.chars().count() <= MAX {
        return input.to_string();
    }
    let shortened: String = input.chars().take(MAX).collect();
    format!("{shortened}...")
}
