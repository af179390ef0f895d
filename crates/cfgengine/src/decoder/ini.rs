//! INI decoder.
//!
//! The accepted dialect follows Python's `configparser` defaults:
//!
//! - `[section]` headers, names taken verbatim (case-sensitive)
//! - `key = value` or `key: value`, split at the first delimiter
//! - keys are lower-cased, keys and values are trimmed
//! - full-line comments starting with `#` or `;`
//! - lines indented deeper than their key continue the previous value
//! - entries of `[DEFAULT]` are inherited by every other section
//!
//! Every value is a string. The output is always two levels deep:
//! `Map<section, Map<key, string>>`.

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;

use super::{decode_error, FormatDecoder};
use crate::error::Result;
use crate::value::{ConfigMap, ConfigValue};

const DEFAULT_SECTION: &str = "DEFAULT";

/// Decoder for INI files.
#[derive(Debug, Clone, Copy, Default)]
pub struct IniDecoder;

impl FormatDecoder for IniDecoder {
    fn name(&self) -> &'static str {
        "INI"
    }

    fn decode_str(&self, source: &str, path: &Path) -> Result<ConfigMap> {
        let document = parse(source).map_err(|e| decode_error(self.name(), path, e))?;
        Ok(document.into_config())
    }
}

/// Syntax error in an INI source, with its 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniSyntaxError {
    pub line: usize,
    pub kind: IniErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IniErrorKind {
    /// A key appeared before any `[section]` header.
    MissingSectionHeader,
    /// `[name` without the closing bracket.
    UnterminatedHeader,
    /// A non-blank, non-comment line without `=` or `:`.
    MissingDelimiter,
    /// A line of the form `= value`.
    EmptyKey,
    DuplicateSection(String),
    DuplicateKey { section: String, key: String },
}

impl fmt::Display for IniSyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            IniErrorKind::MissingSectionHeader => {
                write!(f, "line {}: file contains no section headers", self.line)
            }
            IniErrorKind::UnterminatedHeader => {
                write!(f, "line {}: unterminated section header", self.line)
            }
            IniErrorKind::MissingDelimiter => {
                write!(f, "line {}: expected 'key = value' or 'key: value'", self.line)
            }
            IniErrorKind::EmptyKey => write!(f, "line {}: empty key", self.line),
            IniErrorKind::DuplicateSection(name) => {
                write!(f, "line {}: section '{}' already exists", self.line, name)
            }
            IniErrorKind::DuplicateKey { section, key } => write!(
                f,
                "line {}: option '{}' in section '{}' already exists",
                self.line, key, section
            ),
        }
    }
}

impl std::error::Error for IniSyntaxError {}

/// Parsed sections before defaults are merged in.
#[derive(Debug, Default)]
struct IniDocument {
    defaults: IndexMap<String, String>,
    sections: IndexMap<String, IndexMap<String, String>>,
}

impl IniDocument {
    fn into_config(self) -> ConfigMap {
        let IniDocument { defaults, sections } = self;
        sections
            .into_iter()
            .map(|(name, mut entries)| {
                for (key, value) in &defaults {
                    if !entries.contains_key(key) {
                        entries.insert(key.clone(), value.clone());
                    }
                }
                let section = entries
                    .into_iter()
                    .map(|(k, v)| (k, ConfigValue::String(v)))
                    .collect();
                (name, ConfigValue::Map(section))
            })
            .collect()
    }

    fn section_mut(&mut self, name: &str) -> &mut IndexMap<String, String> {
        if name == DEFAULT_SECTION {
            &mut self.defaults
        } else {
            self.sections.entry(name.to_string()).or_default()
        }
    }
}

/// Where the parser currently is.
struct Cursor {
    section: Option<String>,
    /// Key being written and the indentation of its line, for continuations.
    open_key: Option<(String, usize)>,
}

fn parse(source: &str) -> std::result::Result<IniDocument, IniSyntaxError> {
    let mut doc = IniDocument::default();
    let mut seen_default = false;
    let mut cursor = Cursor {
        section: None,
        open_key: None,
    };

    for (index, raw) in source.lines().enumerate() {
        let line_no = index + 1;
        let err = |kind| IniSyntaxError {
            line: line_no,
            kind,
        };
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            cursor.open_key = None;
            continue;
        }
        if trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        let indent = raw.len() - raw.trim_start().len();

        // Continuation of the previous value.
        if let (Some(section), Some((key, key_indent))) = (&cursor.section, &cursor.open_key) {
            if indent > *key_indent {
                let (section, key) = (section.clone(), key.clone());
                if let Some(value) = doc.section_mut(&section).get_mut(&key) {
                    if !value.is_empty() {
                        value.push('\n');
                    }
                    value.push_str(trimmed);
                }
                continue;
            }
        }

        if let Some(rest) = trimmed.strip_prefix('[') {
            let close = rest
                .rfind(']')
                .ok_or_else(|| err(IniErrorKind::UnterminatedHeader))?;
            let name = &rest[..close];
            if name.is_empty() {
                return Err(err(IniErrorKind::UnterminatedHeader));
            }
            let duplicate = if name == DEFAULT_SECTION {
                std::mem::replace(&mut seen_default, true)
            } else {
                doc.sections.contains_key(name)
            };
            if duplicate {
                return Err(err(IniErrorKind::DuplicateSection(name.to_string())));
            }
            doc.section_mut(name);
            cursor.section = Some(name.to_string());
            cursor.open_key = None;
            continue;
        }

        let section = cursor
            .section
            .clone()
            .ok_or_else(|| err(IniErrorKind::MissingSectionHeader))?;
        let delimiter = trimmed
            .find(['=', ':'])
            .ok_or_else(|| err(IniErrorKind::MissingDelimiter))?;
        let key = trimmed[..delimiter].trim_end().to_lowercase();
        if key.is_empty() {
            return Err(err(IniErrorKind::EmptyKey));
        }
        let value = trimmed[delimiter + 1..].trim().to_string();

        let entries = doc.section_mut(&section);
        if entries.contains_key(&key) {
            return Err(err(IniErrorKind::DuplicateKey { section, key }));
        }
        entries.insert(key.clone(), value);
        cursor.open_key = Some((key, indent));
    }

    Ok(doc)
}
