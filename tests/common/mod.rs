//! Common test utilities for integration tests

use std::fs;
use std::io::Write;
use std::path::Path;

/// Helper function to create a test ZIP file with specified members
#[allow(dead_code)]
pub fn create_test_zip(
    zip_path: &Path,
    files: &[(&str, &str)],
) -> Result<(), Box<dyn std::error::Error>> {
    use zip::write::FileOptions;
    use zip::ZipWriter;

    if let Some(parent) = zip_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(zip_path)?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, content) in files {
        zip.start_file(*name, options)?;
        zip.write_all(content.as_bytes())?;
    }

    zip.finish()?;
    Ok(())
}

/// Builds a record document in the generator's layout.
#[allow(dead_code)]
pub fn record_xml(id: &str, level: i64, objects: &[&str]) -> String {
    let mut xml = String::from("<?xml version='1.0' encoding='utf-8'?>\n<root>\n");
    xml.push_str(&format!("\t<var name=\"id\" value=\"{id}\" />\n"));
    xml.push_str(&format!("\t<var name=\"level\" value=\"{level}\" />\n"));
    xml.push_str("\t<objects>\n");
    for name in objects {
        xml.push_str(&format!("\t\t<object name=\"{name}\" />\n"));
    }
    xml.push_str("\t</objects>\n</root>");
    xml
}

/// Reads a CSV sink: (header, data rows).
#[allow(dead_code)]
pub fn read_sink(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader
        .headers()
        .unwrap()
        .iter()
        .map(str::to_string)
        .collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    (header, rows)
}

/// Counts lines equal to `header` in a file.
#[allow(dead_code)]
pub fn count_header_lines(path: &Path, header: &str) -> usize {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|line| *line == header)
        .count()
}

/// Malformed member payload
#[allow(dead_code)]
pub const MALFORMED_XML: &str = r#"<?xml version="1.0"?>
<root>
  <var name="id" value="broken"/>
  <objects>
</root>"#;
