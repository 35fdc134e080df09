//! Input readers.
//!
//! CSV files are decoded with encoding and delimiter auto-detection; JSON
//! files are parsed and optionally descended into via a dotted root path.
//! Both produce a list of record values; which one is used depends on the
//! file extension.

use std::path::Path;

use tracing::{debug, info};

use crate::error::{InputError, InputResult};
use crate::models::{Record, Value};

mod json;

pub use json::{parse_json_str, read_json_file};

/// Read records from a `.csv` or `.json` file.
///
/// `json_root` is a dotted path to the record list inside a JSON object
/// root; it is ignored for CSV.
pub fn read_records(path: &Path, json_root: Option<&str>) -> InputResult<Vec<Value>> {
    if !path.exists() {
        return Err(InputError::NotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => {
            let result = parse_csv_file_auto(path)?;
            info!(
                "Read {} records from CSV file {} ({}, delimiter '{}')",
                result.records.len(),
                path.display(),
                result.encoding,
                format_delimiter(result.delimiter)
            );
            Ok(result.records)
        }
        "json" => {
            let records = read_json_file(path, json_root)?;
            info!("Read {} records from JSON file {}", records.len(), path.display());
            Ok(records)
        }
        _ => Err(InputError::UnsupportedFormat(format!(".{extension}"))),
    }
}

// =============================================================================
// CSV
// =============================================================================

/// CSV parsing error with context.
#[derive(Debug, Clone)]
pub struct CsvError {
    pub line: usize,
    pub column: Option<String>,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.column {
            Some(col) => write!(f, "Line {}, column '{}': {}", self.line, col, self.message),
            None => write!(f, "Line {}: {}", self.line, self.message),
        }
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column: None,
            message: message.into(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

/// Result of parsing with metadata.
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// One record per data row.
    pub records: Vec<Value>,
    /// Detected encoding.
    pub encoding: String,
    /// Detected delimiter.
    pub delimiter: char,
    /// Column headers.
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes with the given encoding. Unknown encodings decode as lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting candidates in the first line.
///
/// Ties and delimiter-free headers resolve to a comma.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = ',';
    let mut best_count = 0;

    for sep in [',', ';', '\t', '|'] {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV text into records with an explicit delimiter.
///
/// Quoted fields are honored. Values and headers are trimmed; blank rows
/// are skipped; cells missing from short rows are null.
pub fn parse_csv_str(content: &str, delimiter: char) -> Result<(Vec<String>, Vec<Value>), CsvError> {
    let content = content.trim_start_matches('\u{feff}');
    if content.trim().is_empty() {
        return Err(CsvError::new(1, "Empty CSV file"));
    }

    let delimiter = u8::try_from(delimiter)
        .map_err(|_| CsvError::new(0, format!("Unsupported delimiter '{delimiter}'")))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CsvError::new(1, format!("Cannot read header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(CsvError::new(1, "No headers found"));
    }

    let mut records = Vec::new();
    for (row_idx, row) in reader.records().enumerate() {
        let line_num = row_idx + 2;
        let row = row.map_err(|e| {
            let line = e
                .position()
                .map(|pos| pos.line() as usize)
                .unwrap_or(line_num);
            CsvError::new(line, format!("Cannot read row: {e}"))
        })?;

        if row.iter().all(str::is_empty) {
            continue;
        }

        let record: Record = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let value = row.get(i).map(Value::from).unwrap_or(Value::Null);
                (header.clone(), value)
            })
            .collect();
        records.push(Value::Map(record));
    }

    debug!("Parsed {} CSV rows with {} columns", records.len(), headers.len());
    Ok((headers, records))
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> Result<ParseResult, CsvError> {
    let bytes = std::fs::read(path.as_ref())
        .map_err(|e| CsvError::new(0, format!("Cannot read file: {e}")))?;

    parse_bytes_auto(&bytes)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
///
/// Valid UTF-8 is decoded as such; chardet is only consulted otherwise.
pub fn parse_bytes_auto(bytes: &[u8]) -> Result<ParseResult, CsvError> {
    let (encoding, content) = match std::str::from_utf8(bytes) {
        Ok(text) => ("utf-8".to_string(), text.to_string()),
        Err(_) => {
            let encoding = detect_encoding(bytes);
            let content = decode_content(bytes, &encoding);
            (encoding, content)
        }
    };
    let delimiter = detect_delimiter(&content);
    let (headers, records) = parse_csv_str(&content, delimiter)?;

    Ok(ParseResult {
        records,
        encoding,
        delimiter,
        headers,
    })
}

fn format_delimiter(delimiter: char) -> String {
    match delimiter {
        '\t' => "\\t".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn text<'a>(record: &'a Value, key: &str) -> Option<&'a str> {
        record.as_record()?.get(key)?.as_str()
    }

    #[test]
    fn test_simple_csv() {
        let (headers, rows) = parse_csv_str("name;age\nAlice;30\nBob;25", ';').unwrap();

        assert_eq!(headers, vec!["name", "age"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(text(&rows[0], "name"), Some("Alice"));
        assert_eq!(text(&rows[1], "age"), Some("25"));
    }

    #[test]
    fn test_quoted_values_keep_delimiters() {
        let csv = "award_id,pi_name\n123,\"Doe, Jan\"\n";
        let (_, rows) = parse_csv_str(csv, ',').unwrap();
        assert_eq!(text(&rows[0], "pi_name"), Some("Doe, Jan"));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let (_, rows) = parse_csv_str("a;b\n1;2\n\n3;4\n", ';').unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_missing_values() {
        let (_, rows) = parse_csv_str("a;b;c\n1;;3\n4", ';').unwrap();
        assert_eq!(text(&rows[0], "b"), Some(""));
        let short = rows[1].as_record().unwrap();
        assert_eq!(short.get("c"), Some(&Value::Null));
        assert!(short.resolve("c").is_none());
    }

    #[test]
    fn test_extra_columns_ignored() {
        let (_, rows) = parse_csv_str("a;b\n1;2;3;4", ';').unwrap();
        assert_eq!(rows[0].as_record().unwrap().len(), 2);
    }

    #[test]
    fn test_bom_stripped() {
        let (headers, _) = parse_csv_str("\u{feff}award_id,title\n1,x", ',').unwrap();
        assert_eq!(headers[0], "award_id");
    }

    #[test]
    fn test_error_message_format() {
        let msg = CsvError::new(5, "Invalid value").with_column("age").to_string();
        assert!(msg.contains("Line 5"));
        assert!(msg.contains("column 'age'"));
    }

    #[test]
    fn test_empty_csv_error() {
        let err = parse_csv_str("", ',').unwrap_err();
        assert!(err.message.contains("Empty"));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
        assert_eq!(detect_delimiter("award_id\n1"), ',');
    }

    #[test]
    fn test_auto_parse() {
        let result = parse_bytes_auto(b"name;age\nAlice;30\nBob;25").unwrap();
        assert_eq!(result.delimiter, ';');
        assert_eq!(result.encoding, "utf-8");
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.headers, vec!["name", "age"]);
    }

    #[test]
    fn test_auto_parse_keeps_utf8() {
        let result = parse_bytes_auto("id,name\n1,Müller\n".as_bytes()).unwrap();
        assert_eq!(result.encoding, "utf-8");
        assert_eq!(text(&result.records[0], "name"), Some("Müller"));
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        assert_eq!(decode_content(bytes, "iso-8859-1"), "Société");
    }

    #[test]
    fn test_read_records_dispatch() {
        let dir = tempfile::tempdir().unwrap();

        let csv_path = dir.path().join("grants.CSV");
        std::fs::write(&csv_path, "award_id,amount\n123,5000\n").unwrap();
        let records = read_records(&csv_path, None).unwrap();
        assert_eq!(text(&records[0], "award_id"), Some("123"));

        let json_path = dir.path().join("grants.json");
        let mut file = std::fs::File::create(&json_path).unwrap();
        write!(file, r#"{{"data": {{"grants": [{{"award_id": 7}}]}}}}"#).unwrap();
        let records = read_records(&json_path, Some("data.grants")).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_read_records_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.csv");
        assert!(matches!(
            read_records(&missing, None),
            Err(InputError::NotFound(_))
        ));

        let xlsx = dir.path().join("grants.xlsx");
        std::fs::write(&xlsx, "x").unwrap();
        match read_records(&xlsx, None) {
            Err(InputError::UnsupportedFormat(ext)) => assert_eq!(ext, ".xlsx"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
