use crate::constants::{MAX_LEVEL, MIN_LEVEL, XML_EXTENSIONS};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One named sub-entry of a record (an `<object name=".."/>` in XML input).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
}

/// One parsed input unit.
///
/// `id` is never empty. `level` is expected within `MIN_LEVEL..=MAX_LEVEL` but is
/// not clamped or rejected when it falls outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub level: i64,
    pub entries: Vec<Entry>,
}

impl Record {
    pub fn level_in_documented_range(&self) -> bool {
        (MIN_LEVEL..=MAX_LEVEL).contains(&self.level)
    }
}

/// One archive member queued for extraction.
///
/// Owned by exactly one worker once claimed from the work source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    /// File name of the archive the member was read from
    pub archive: String,
    /// Member path inside the archive
    pub member: String,
    pub payload: Vec<u8>,
}

/// Row of the `id,level` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScalarRow {
    pub id: String,
    pub level: i64,
}

/// Row of the `id,object_name` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailRow {
    pub id: String,
    pub object_name: String,
}

/// The rows derived from a single record: exactly one scalar row and one detail
/// row per entry, in the record's entry order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowBatch {
    pub scalar: ScalarRow,
    pub details: Vec<DetailRow>,
}

impl RowBatch {
    pub fn detail_count(&self) -> usize {
        self.details.len()
    }
}

/// Input formats the extractor understands.
///
/// New formats are added as a variant plus a parser module, never by string lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    #[default]
    Xml,
}

impl InputFormat {
    /// Returns a human-readable name for the format.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Xml => "XML",
        }
    }

    /// File extensions (without dot, lowercase) that carry this format.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Xml => XML_EXTENSIONS,
        }
    }

    /// Whether an archive member with this name should be handed to the extractor.
    pub fn accepts_member(&self, member_name: &str) -> bool {
        Path::new(member_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                self.extensions()
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_format_accepts_xml_members_case_insensitively() {
        let format = InputFormat::Xml;
        assert!(format.accepts_member("test0.xml"));
        assert!(format.accepts_member("nested/dir/TEST1.XML"));
        assert!(!format.accepts_member("readme.txt"));
        assert!(!format.accepts_member("xml"));
        assert!(!format.accepts_member("folder/"));
    }

    #[test]
    fn level_range_is_reported_not_enforced() {
        let mut record = Record {
            id: "r1".to_string(),
            level: 100,
            entries: vec![],
        };
        assert!(record.level_in_documented_range());
        record.level = 0;
        assert!(!record.level_in_documented_range());
        record.level = -5;
        assert_eq!(record.level, -5);
    }

    #[test]
    fn input_format_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Holder {
            format: InputFormat,
        }
        let holder: Holder = toml::from_str("format = \"xml\"").unwrap();
        assert_eq!(holder.format, InputFormat::Xml);
        assert_eq!(holder.format.display_name(), "XML");
    }
}
