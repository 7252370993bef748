use crate::constants::{ID_VAR, LEVEL_VAR, OBJECTS_TAG, OBJECT_TAG, VAR_TAG};
use crate::errors::ExtractError;
use crate::models::{Entry, Record};
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::io::Cursor;
use tracing::debug;

/// Builder for a `Record` while walking the XML events of one document.
/// The first `id` and `level` vars win; later duplicates are ignored.
struct RecordBuilder {
    id: Option<String>,
    level: Option<String>,
    entries: Vec<Entry>,
    unnamed_objects: usize,
}

impl RecordBuilder {
    fn new() -> Self {
        Self {
            id: None,
            level: None,
            entries: Vec::with_capacity(10),
            unnamed_objects: 0,
        }
    }

    fn set_var(&mut self, name: &str, value: Option<String>) {
        match name {
            ID_VAR if self.id.is_none() => self.id = value,
            LEVEL_VAR if self.level.is_none() => self.level = value,
            _ => {}
        }
    }

    fn push_object(&mut self, name: Option<String>) {
        match name {
            Some(name) => self.entries.push(Entry { name }),
            None => self.unnamed_objects += 1,
        }
    }

    fn build(self) -> Result<Record, ExtractError> {
        let id = match self.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => {
                return Err(ExtractError::Malformed(
                    "no non-empty 'id' var found".to_string(),
                ))
            }
        };

        let raw_level = self.level.ok_or_else(|| ExtractError::MissingField {
            id: id.clone(),
            field: LEVEL_VAR,
            detail: "is absent".to_string(),
        })?;
        let level = raw_level
            .trim()
            .parse::<i64>()
            .map_err(|_| ExtractError::MissingField {
                id: id.clone(),
                field: LEVEL_VAR,
                detail: format!("is not an integer: '{raw_level}'"),
            })?;

        if self.unnamed_objects > 0 {
            return Err(ExtractError::MissingField {
                id,
                field: "object.name",
                detail: format!("is absent on {} object element(s)", self.unnamed_objects),
            });
        }

        Ok(Record {
            id,
            level,
            entries: self.entries,
        })
    }
}

/// Reads and unescapes the value of attribute `key`, if present.
fn attribute_value(element: &BytesStart, key: &[u8]) -> Result<Option<String>, ExtractError> {
    for attr in element.attributes() {
        let attr =
            attr.map_err(|e| ExtractError::Malformed(format!("invalid attribute: {e}")))?;
        if attr.key.as_ref() == key {
            let raw = std::str::from_utf8(&attr.value).map_err(|e| {
                ExtractError::Malformed(format!("attribute value is not valid UTF-8: {e}"))
            })?;
            let value = unescape(raw)
                .map_err(|e| ExtractError::Malformed(format!("invalid attribute value: {e}")))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn handle_element(
    builder: &mut RecordBuilder,
    element: &BytesStart,
    inside_objects: bool,
) -> Result<(), ExtractError> {
    match element.name().as_ref() {
        VAR_TAG => {
            if let Some(name) = attribute_value(element, b"name")? {
                let value = attribute_value(element, b"value")?;
                builder.set_var(&name, value);
            }
        }
        OBJECT_TAG if inside_objects => {
            builder.push_object(attribute_value(element, b"name")?);
        }
        _ => {}
    }
    Ok(())
}

/// Parses one XML record document:
///
/// ```xml
/// <root>
///     <var name="id" value="..."/>
///     <var name="level" value="42"/>
///     <objects>
///         <object name="..."/>
///     </objects>
/// </root>
/// ```
///
/// The root tag name is not checked. `var` elements are read anywhere below the
/// root; `object` elements only count inside `objects`.
///
/// # Errors
///
/// - `Malformed` for XML syntax errors, a missing or repeated root element, input
///   ending inside an element, or a missing/empty `id`.
/// - `MissingField` when `level` is absent or not an integer, or an `object` has
///   no `name`.
pub fn parse_record_bytes(content: &[u8]) -> Result<Record, ExtractError> {
    let mut reader = Reader::from_reader(Cursor::new(content));
    reader.config_mut().trim_text(true);

    let mut buf = Vec::with_capacity(1024);
    let mut builder = RecordBuilder::new();
    let mut depth = 0usize;
    let mut root_seen = false;
    let mut inside_objects = false;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            ExtractError::Malformed(format!(
                "XML error at byte {}: {e}",
                reader.buffer_position()
            ))
        })?;

        match event {
            Event::Start(e) => {
                if depth == 0 {
                    if root_seen {
                        return Err(ExtractError::Malformed(
                            "more than one root element".to_string(),
                        ));
                    }
                    root_seen = true;
                } else {
                    handle_element(&mut builder, &e, inside_objects)?;
                    if e.name().as_ref() == OBJECTS_TAG {
                        inside_objects = true;
                    }
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 0 {
                    if root_seen {
                        return Err(ExtractError::Malformed(
                            "more than one root element".to_string(),
                        ));
                    }
                    root_seen = true;
                } else {
                    handle_element(&mut builder, &e, inside_objects)?;
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                if e.name().as_ref() == OBJECTS_TAG {
                    inside_objects = false;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !root_seen {
        return Err(ExtractError::Malformed("no root element".to_string()));
    }
    if depth != 0 {
        return Err(ExtractError::Malformed(
            "input ended inside an open element".to_string(),
        ));
    }

    let record = builder.build()?;
    if !record.level_in_documented_range() {
        debug!(
            id = record.id.as_str(),
            level = record.level,
            "Level outside documented range, passing through"
        );
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENERATED_RECORD: &str = r#"<?xml version='1.0' encoding='utf-8'?>
<root>
	<var name="id" value="0d6b1f3e-5a1b-11ee-8c99-0242ac120002" />
	<var name="level" value="57" />
	<objects>
		<object name="kQwErTyUiO" />
		<object name="ZxCvBnMaSd" />
		<object name="PoIuYtReWq" />
	</objects>
</root>"#;

    fn expect_missing_field(result: Result<Record, ExtractError>, expected_field: &str) {
        match result {
            Err(ExtractError::MissingField { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("expected MissingField({expected_field}), got {other:?}"),
        }
    }

    #[test]
    fn test_parse_generated_record() {
        let record = parse_record_bytes(GENERATED_RECORD.as_bytes()).unwrap();
        assert_eq!(record.id, "0d6b1f3e-5a1b-11ee-8c99-0242ac120002");
        assert_eq!(record.level, 57);
        let names: Vec<&str> = record.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["kQwErTyUiO", "ZxCvBnMaSd", "PoIuYtReWq"]);
    }

    #[test]
    fn test_parse_single_quoted_attributes_and_entities() {
        let xml = r#"<root><var name='id' value='a&amp;b'/><var name='level' value=' 7 '/><objects><object name='x&lt;y'/></objects></root>"#;
        let record = parse_record_bytes(xml.as_bytes()).unwrap();
        assert_eq!(record.id, "a&b");
        assert_eq!(record.level, 7);
        assert_eq!(record.entries[0].name, "x<y");
    }

    #[test]
    fn test_parse_zero_entries_is_valid() {
        let xml = r#"<root><var name="id" value="empty"/><var name="level" value="3"/><objects/></root>"#;
        let record = parse_record_bytes(xml.as_bytes()).unwrap();
        assert!(record.entries.is_empty());

        let no_container = r#"<root><var name="id" value="bare"/><var name="level" value="3"/></root>"#;
        let record = parse_record_bytes(no_container.as_bytes()).unwrap();
        assert!(record.entries.is_empty());
    }

    #[test]
    fn test_objects_outside_container_are_ignored() {
        let xml = r#"<root><var name="id" value="r"/><var name="level" value="1"/><object name="stray"/><objects><object name="kept"/></objects></root>"#;
        let record = parse_record_bytes(xml.as_bytes()).unwrap();
        assert_eq!(record.entries, vec![Entry { name: "kept".to_string() }]);
    }

    #[test]
    fn test_out_of_range_level_passes_through() {
        let xml = r#"<root><var name="id" value="r"/><var name="level" value="-250"/></root>"#;
        let record = parse_record_bytes(xml.as_bytes()).unwrap();
        assert_eq!(record.level, -250);
    }

    #[test]
    fn test_missing_level_is_missing_field() {
        let xml = r#"<root><var name="id" value="r"/><objects><object name="a"/></objects></root>"#;
        expect_missing_field(parse_record_bytes(xml.as_bytes()), "level");
    }

    #[test]
    fn test_non_integer_level_is_missing_field() {
        let xml = r#"<root><var name="id" value="r"/><var name="level" value="high"/></root>"#;
        let result = parse_record_bytes(xml.as_bytes());
        match &result {
            Err(ExtractError::MissingField { id, detail, .. }) => {
                assert_eq!(id, "r");
                assert!(detail.contains("high"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        expect_missing_field(result, "level");
    }

    #[test]
    fn test_unnamed_object_is_missing_field() {
        let xml = r#"<root><var name="id" value="r"/><var name="level" value="1"/><objects><object/></objects></root>"#;
        expect_missing_field(parse_record_bytes(xml.as_bytes()), "object.name");
    }

    #[test]
    fn test_missing_or_empty_id_is_malformed() {
        let no_id = r#"<root><var name="level" value="1"/></root>"#;
        assert!(matches!(
            parse_record_bytes(no_id.as_bytes()),
            Err(ExtractError::Malformed(_))
        ));

        let empty_id = r#"<root><var name="id" value="  "/><var name="level" value="1"/></root>"#;
        assert!(matches!(
            parse_record_bytes(empty_id.as_bytes()),
            Err(ExtractError::Malformed(_))
        ));
    }

    #[test]
    fn test_non_xml_is_malformed() {
        assert!(matches!(
            parse_record_bytes(b"this is not a record"),
            Err(ExtractError::Malformed(_))
        ));
        assert!(matches!(
            parse_record_bytes(b""),
            Err(ExtractError::Malformed(_))
        ));
    }

    #[test]
    fn test_invalid_utf8_attribute_is_malformed() {
        let xml = b"<root><var name=\"id\" value=\"ab\xff\"/><var name=\"level\" value=\"1\"/></root>";
        match parse_record_bytes(xml) {
            Err(ExtractError::Malformed(msg)) => assert!(msg.contains("UTF-8"), "{msg}"),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_document_is_malformed() {
        let xml = r#"<root><var name="id" value="r"/><var name="level" value="1"/><objects>"#;
        assert!(matches!(
            parse_record_bytes(xml.as_bytes()),
            Err(ExtractError::Malformed(_))
        ));
    }

    #[test]
    fn test_mismatched_tags_are_malformed() {
        let xml = r#"<root><var name="id" value="r"/><objects></root></objects>"#;
        assert!(matches!(
            parse_record_bytes(xml.as_bytes()),
            Err(ExtractError::Malformed(_))
        ));
    }

    #[test]
    fn test_second_root_is_malformed() {
        let xml = r#"<root><var name="id" value="r"/><var name="level" value="1"/></root><root/>"#;
        assert!(matches!(
            parse_record_bytes(xml.as_bytes()),
            Err(ExtractError::Malformed(_))
        ));
    }
}
