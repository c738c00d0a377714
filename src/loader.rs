use crate::cell::{CellValue, format_number};
use crate::error::IngestError;
use crate::table::HeaderedTable;
use calamine::{Data, Ods, Range, Reader, Xls, Xlsx};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Timelike, Utc};
use std::error::Error;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

/// Header written for uploads whose content is not parsed
pub const MEDIA_HEADER: [&str; 4] = ["Timestamp", "Filename", "Size", "MIME Type"];

const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// Container flavour of a spreadsheet workbook
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkbookKind {
    Xlsx,
    Xls,
    Ods,
}

/// How an upload is read, picked from its declared extension
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFormat {
    /// Comma separated text (`.csv`, `.txt`)
    DelimitedText,
    /// A JSON list of objects
    StructuredList,
    /// Spreadsheet workbook, first sheet only
    Workbook(WorkbookKind),
    /// Audio and other media: only metadata is recorded
    OpaqueMedia,
}

impl SourceFormat {
    /// Maps a file extension (case-insensitive, without the dot) to a format
    ///
    /// # Arguments
    /// * `extension` - The extension declared by the uploaded filename
    ///
    /// # Returns
    /// * `Result<SourceFormat, IngestError>` - The format, or `UnsupportedFormat`
    ///
    /// # Examples
    /// ```
    /// use faultsheet::loader::SourceFormat;
    ///
    /// assert_eq!(SourceFormat::from_extension("CSV").unwrap(), SourceFormat::DelimitedText);
    /// assert!(SourceFormat::from_extension("pdf").is_err());
    /// ```
    pub fn from_extension(extension: &str) -> Result<Self, IngestError> {
        match extension.to_ascii_lowercase().as_str() {
            "csv" | "txt" => Ok(SourceFormat::DelimitedText),
            "json" => Ok(SourceFormat::StructuredList),
            "xlsx" | "xlsm" => Ok(SourceFormat::Workbook(WorkbookKind::Xlsx)),
            "xls" => Ok(SourceFormat::Workbook(WorkbookKind::Xls)),
            "ods" => Ok(SourceFormat::Workbook(WorkbookKind::Ods)),
            "wav" | "mp3" | "flac" | "ogg" | "m4a" => Ok(SourceFormat::OpaqueMedia),
            other => Err(IngestError::UnsupportedFormat(other.to_string())),
        }
    }

    fn label(self) -> &'static str {
        match self {
            SourceFormat::DelimitedText => "CSV",
            SourceFormat::StructuredList => "JSON",
            SourceFormat::Workbook(WorkbookKind::Xlsx) => "XLSX",
            SourceFormat::Workbook(WorkbookKind::Xls) => "XLS",
            SourceFormat::Workbook(WorkbookKind::Ods) => "ODS",
            SourceFormat::OpaqueMedia => "Media",
        }
    }
}

/// A file as received by the upload route
#[derive(Clone, Debug)]
pub struct Upload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Upload {
            filename: filename.into(),
            content_type: None,
            bytes,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Text after the last dot of the filename, lowercased. A name without a
    /// dot is its own extension.
    pub fn extension(&self) -> String {
        self.filename
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_lowercase()
    }
}

/// Normalize an uploaded file into a headered table
///
/// The format is picked from the filename's extension. Media files are not
/// read; a single metadata row stamped with the current time is produced
/// instead.
///
/// # Arguments
/// * `upload` - The uploaded file
///
/// # Returns
/// * `Result<HeaderedTable, IngestError>` - The unsanitized table or an error
///
/// # Examples
/// ```
/// use faultsheet::loader::{Upload, normalize};
///
/// let upload = Upload::new("thermal.csv", b"timestamp,temperature\n2024-01-01,22.5\n".to_vec());
/// let table = normalize(&upload).unwrap();
/// assert_eq!(table.header, vec!["timestamp", "temperature"]);
/// assert_eq!(table.rows.len(), 1);
/// ```
pub fn normalize(upload: &Upload) -> Result<HeaderedTable, IngestError> {
    normalize_at(upload, Utc::now())
}

/// Same as [`normalize`] with an explicit ingestion time for media metadata
pub fn normalize_at(
    upload: &Upload,
    received: DateTime<Utc>,
) -> Result<HeaderedTable, IngestError> {
    let extension = upload.extension();
    let format = SourceFormat::from_extension(&extension)?;
    let content_type = upload
        .content_type
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| guess_media_type(&extension));
    let media = MediaInfo {
        filename: &upload.filename,
        content_type,
        received,
    };

    dispatch(format, &upload.bytes, media)
}

/// Normalize raw bytes given only a declared extension
///
/// Media extensions still produce a metadata row; the filename recorded is
/// `upload.<extension>`.
pub fn normalize_bytes(bytes: &[u8], extension: &str) -> Result<HeaderedTable, IngestError> {
    let format = SourceFormat::from_extension(extension)?;
    let extension = extension.to_ascii_lowercase();
    let filename = format!("upload.{}", extension);
    let media = MediaInfo {
        filename: &filename,
        content_type: guess_media_type(&extension),
        received: Utc::now(),
    };

    dispatch(format, bytes, media)
}

/// Read a file from disk and normalize it
///
/// # Examples
/// ```no_run
/// use faultsheet::loader::load_file;
///
/// match load_file("readings.xlsx") {
///     Ok(table) => println!("{} data rows", table.rows.len()),
///     Err(e) => eprintln!("Error loading file: {}", e),
/// }
/// ```
pub fn load_file(filepath: impl AsRef<Path>) -> Result<HeaderedTable, Box<dyn Error>> {
    let path = filepath.as_ref();
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or("File has no name")?
        .to_string();
    let bytes = std::fs::read(path)?;

    Ok(normalize(&Upload::new(filename, bytes))?)
}

/// What gets recorded for an upload whose content is not parsed
struct MediaInfo<'a> {
    filename: &'a str,
    content_type: &'a str,
    received: DateTime<Utc>,
}

fn dispatch(
    format: SourceFormat,
    bytes: &[u8],
    media: MediaInfo<'_>,
) -> Result<HeaderedTable, IngestError> {
    match format {
        SourceFormat::DelimitedText => from_delimited(bytes),
        SourceFormat::StructuredList => from_structured(bytes),
        SourceFormat::Workbook(kind) => from_workbook(kind, bytes),
        SourceFormat::OpaqueMedia => {
            log::info!(
                "Received binary file: {}. Only logging metadata.",
                media.filename
            );
            Ok(media_metadata(&media, bytes.len()))
        }
    }
}

fn from_delimited(bytes: &[u8]) -> Result<HeaderedTable, IngestError> {
    let label = SourceFormat::DelimitedText.label();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut records = reader.records();

    let header = match records.next() {
        Some(record) => record.map_err(|e| IngestError::malformed(label, e))?,
        None => return Err(IngestError::EmptyInput(label.to_string())),
    };
    let header: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            if idx == 0 {
                name.trim_start_matches('\u{feff}').to_string()
            } else {
                name.to_string()
            }
        })
        .collect();

    let mut table = HeaderedTable::new(header);
    for record in records {
        let record = record.map_err(|e| IngestError::malformed(label, e))?;
        table.push_row(record.iter().map(CellValue::text).collect());
    }

    Ok(table)
}

fn from_structured(bytes: &[u8]) -> Result<HeaderedTable, IngestError> {
    use serde_json::Value;

    let label = SourceFormat::StructuredList.label();
    let value: Value = serde_json::from_slice(bytes).map_err(|e| IngestError::malformed(label, e))?;
    let Value::Array(items) = value else {
        return Err(IngestError::malformed(label, "expected a list of objects"));
    };
    let Some(first) = items.first() else {
        return Err(IngestError::EmptyInput(label.to_string()));
    };
    let Value::Object(first) = first else {
        return Err(IngestError::malformed(label, "first element is not an object"));
    };
    if first.is_empty() {
        return Err(IngestError::EmptyInput(label.to_string()));
    }

    let mut table = HeaderedTable::new(first.keys().cloned().collect());
    for item in &items {
        let row = table
            .header
            .iter()
            .map(|key| item.get(key).map(CellValue::from_json).unwrap_or_default())
            .collect();
        table.push_row(row);
    }

    Ok(table)
}

fn from_workbook(kind: WorkbookKind, bytes: &[u8]) -> Result<HeaderedTable, IngestError> {
    let label = SourceFormat::Workbook(kind).label();
    let cursor = Cursor::new(bytes);
    let range = match kind {
        WorkbookKind::Xlsx => {
            let workbook: Xlsx<_> =
                Xlsx::new(cursor).map_err(|e| IngestError::malformed(label, e))?;
            first_sheet(workbook, label)?
        }
        WorkbookKind::Xls => {
            let workbook: Xls<_> =
                Xls::new(cursor).map_err(|e| IngestError::malformed(label, e))?;
            first_sheet(workbook, label)?
        }
        WorkbookKind::Ods => {
            let workbook: Ods<_> =
                Ods::new(cursor).map_err(|e| IngestError::malformed(label, e))?;
            first_sheet(workbook, label)?
        }
    };

    if range.is_empty() {
        return Err(IngestError::EmptyInput(label.to_string()));
    }

    // Cells are indexed from the first used column, so a sheet whose data
    // starts at B3 reads the same as one starting at A1.
    let mut rows = range.rows().map(|row| row.iter().map(display_cell).collect::<Vec<_>>());

    let header = rows
        .next()
        .ok_or_else(|| IngestError::EmptyInput(label.to_string()))?
        .iter()
        .map(|cell| cell.to_string())
        .collect();
    let mut table = HeaderedTable::new(header);
    for row in rows {
        table.push_row(row);
    }

    Ok(table)
}

fn first_sheet<RS, R>(mut workbook: R, label: &str) -> Result<Range<Data>, IngestError>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: std::fmt::Display,
{
    match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => Ok(range),
        Some(Err(e)) => Err(IngestError::malformed(label, e)),
        None => Err(IngestError::EmptyInput(label.to_string())),
    }
}

/// Coerces a workbook cell to the text a spreadsheet would display
fn display_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::text(s.as_str()),
        Data::Int(i) => CellValue::Text(i.to_string()),
        Data::Float(f) => CellValue::Text(format_number(*f)),
        Data::Bool(b) => CellValue::text(if *b { "TRUE" } else { "FALSE" }),
        Data::DateTime(dt) if dt.is_datetime() => match dt.as_datetime() {
            Some(value) => CellValue::Text(format_sheet_datetime(value)),
            None => CellValue::Text(format_number(dt.as_f64())),
        },
        Data::DateTime(dt) => CellValue::Text(format_number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::text(s.as_str()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

fn format_sheet_datetime(value: NaiveDateTime) -> String {
    if value.num_seconds_from_midnight() == 0 {
        value.format("%Y-%m-%d").to_string()
    } else {
        value.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

fn media_metadata(media: &MediaInfo<'_>, size: usize) -> HeaderedTable {
    let mut table = HeaderedTable::new(MEDIA_HEADER.iter().map(|h| h.to_string()).collect());
    table.push_row(vec![
        CellValue::Text(media.received.to_rfc3339_opts(SecondsFormat::Millis, true)),
        CellValue::text(media.filename),
        CellValue::Text(format!("{} bytes", size)),
        CellValue::text(media.content_type),
    ]);
    table
}

fn guess_media_type(extension: &str) -> &'static str {
    match extension {
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        _ => DEFAULT_MEDIA_TYPE,
    }
}
