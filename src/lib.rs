/*!
# faultsheet

Upload proxy and records API for a spreadsheet-backed sensor fault dashboard.

## Overview

Operators upload thermal, acoustic and vibration readings as CSV, JSON or
workbook files. The server turns each file into a uniform table, drops blank
rows and appends what is left to the spreadsheet tab for that sensor
category. The dashboard reads those tabs back through the spreadsheet's
visualization query endpoint; this crate resolves the loosely named columns
of those rows into canonical records.

## Architecture

### Ingestion
- **loader**: Picks a reader from the file extension (delimited text, JSON
  list of objects, xlsx/xls/ods workbooks, media metadata) and produces a
  `HeaderedTable`
- **table**, **cell**: The uniform row model and blank-row sanitization

### Resolution
- **fields**: Alias-ordered field lookup, insensitive to case and separators
- **timestamp**: Splits timestamps of any supported encoding (native, `Date(...)`
  constructor text, day serials, date strings) into date and time parts
- **gviz**: Parses the query endpoint's JavaScript-wrapped JSON
- **records**: Category definitions, normalized records, merging by
  timestamp and fault counting

### Service (feature `web`)
- **sink**: Appends data rows to a category's tab in one bulk call
- **source**: Fetches every category tab concurrently
- **app**: Routing and middleware

## Configuration

All settings come from environment variables; see [`config::Config`].

## REST API Endpoints

- `POST /api/upload-data` - Multipart `file` plus `dataType`
- `GET /api/records?category=<name>` - Normalized records
- `GET /api/merged` - Records merged across categories by timestamp
- `GET /api/faults` - Fault counts per category
- `GET /health` - Liveness
*/

pub mod cell;
pub mod config;
pub mod error;
pub mod fields;
pub mod gviz;
pub mod loader;
pub mod records;
pub mod table;
pub mod timestamp;

pub mod app;
pub mod sink;
pub mod source;

pub use cell::CellValue;
pub use error::{ConfigError, IngestError, SinkError};
pub use loader::{SourceFormat, Upload, normalize};
pub use records::{NormalizedRecord, SensorCategory};
pub use table::{HeaderedTable, RawRow};
pub use timestamp::{TimestampParts, decompose_timestamp};
