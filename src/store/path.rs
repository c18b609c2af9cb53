//! Directory and file naming for stored sources.

use std::collections::{HashMap, HashSet};

use crate::config::NamingConfig;
use crate::network::media::extension_for_media_type;
use crate::parser::BibEntry;
use crate::pattern::{NAMING_VARS, Pattern, PatternError, PatternValues, render_first};

const FALLBACK_FILE_STEM: &str = "source";

/// Names chosen for one stored source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePath {
    /// Directory name under the store root.
    pub directory_name: String,
    /// File name inside the directory.
    pub file_name: String,
}

/// Renders naming patterns and keeps directory names unique.
///
/// The first pattern whose variables all have values is used. `/` in a
/// rendered name becomes `-`. When two records render the same directory
/// name the later one gets an ordinal suffix (`name-1`, `name-2`, ...),
/// skipping any name already handed out to another record. A record seen
/// again keeps the name it was first given.
#[derive(Debug, Clone)]
pub struct SourcePathTemplate {
    directory_patterns: Vec<Pattern>,
    file_patterns: Vec<Pattern>,
    occurrences: HashMap<String, usize>,
    taken: HashSet<String>,
    assigned: HashMap<String, String>,
}

impl SourcePathTemplate {
    /// Builds a template from the naming configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if a pattern uses an unknown variable.
    pub fn from_config(config: &NamingConfig) -> Result<Self, PatternError> {
        let parse = |patterns: &[String]| {
            patterns
                .iter()
                .map(|pattern| Pattern::parse(pattern, NAMING_VARS))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            directory_patterns: parse(&config.directory_names)?,
            file_patterns: parse(&config.file_names)?,
            occurrences: HashMap::new(),
            taken: HashSet::new(),
            assigned: HashMap::new(),
        })
    }

    /// Names the source of `entry`.
    ///
    /// `original_file_name` is the name the content arrived with and
    /// `media_type` its media type.
    pub fn execute(
        &mut self,
        entry: &BibEntry,
        doi: Option<&str>,
        original_file_name: &str,
        media_type: &str,
    ) -> SourcePath {
        let extension = extension_for_media_type(media_type);
        let values = naming_values(entry, doi, original_file_name, extension);

        let file_name = render_first(&self.file_patterns, &values)
            .and_then(|name| sanitize_name(&name))
            .unwrap_or_else(|| format!("{FALLBACK_FILE_STEM}{}", extension.unwrap_or_default()));

        let directory_name = if let Some(existing) = self.assigned.get(&entry.key) {
            existing.clone()
        } else {
            let base = render_first(&self.directory_patterns, &values)
                .and_then(|name| sanitize_name(&name))
                .or_else(|| sanitize_name(&entry.key))
                .unwrap_or_else(|| "entry".to_string());
            let unique = self.unique_directory(base);
            self.assigned.insert(entry.key.clone(), unique.clone());
            unique
        };

        SourcePath {
            directory_name,
            file_name,
        }
    }

    fn unique_directory(&mut self, base: String) -> String {
        let ordinal = self.occurrences.entry(base.clone()).or_insert(0);
        loop {
            let candidate = if *ordinal == 0 {
                base.clone()
            } else {
                format!("{base}-{ordinal}")
            };
            *ordinal += 1;
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

fn naming_values(
    entry: &BibEntry,
    doi: Option<&str>,
    original_file_name: &str,
    extension: Option<&str>,
) -> PatternValues {
    let non_empty = |value: Option<&str>| {
        value
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToString::to_string)
    };
    let year = non_empty(entry.field("year")).or_else(|| {
        non_empty(entry.field("date"))
            .and_then(|date| date.split('-').next().map(ToString::to_string))
    });

    PatternValues::new()
        .with('i', non_empty(Some(entry.key.as_str())))
        .with('d', non_empty(doi))
        .with('t', non_empty(entry.field("title")))
        .with('y', year)
        .with('a', non_empty(entry.field("author")))
        .with('o', non_empty(Some(original_file_name)))
        .with('e', extension)
}

fn sanitize_name(name: &str) -> Option<String> {
    let cleaned: String = name
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .collect();
    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return None;
    }
    Some(cleaned)
}
