// Roster loading: delimiter detection, column mapping, title filtering and
// guest expansion.
//
// Meetup exports attendee lists either comma- or tab-delimited without
// declaring which, so the delimiter is inferred from the header line.

use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::attendee::{add_guests, Attendee, GuestCountError};
use crate::config::ColumnMapping;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("roster file not found or unreadable: {path}: {source}")]
    NotFound {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed roster {path}: {source}")]
    Format {
        path: PathBuf,
        source: RosterFormatError,
    },
}

/// Why a roster's contents could not be turned into attendees.
#[derive(Debug, Error)]
pub enum RosterFormatError {
    #[error("file has no header line")]
    MissingHeader,

    #[error("header has no `{column}` column")]
    MissingColumn { column: String },

    #[error(transparent)]
    GuestCount(#[from] GuestCountError),

    #[error("file is not valid {encoding}: {detail}")]
    Encoding {
        encoding: &'static str,
        detail: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

// ---------------------------------------------------------------------------
// Text decoding
// ---------------------------------------------------------------------------

/// Text encodings a roster export may arrive in, told apart by byte order
/// mark. Files without a BOM are read as UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl TextEncoding {
    /// Identify the encoding from the leading bytes, returning it with the
    /// length of the BOM to skip.
    fn sniff(bytes: &[u8]) -> (Self, usize) {
        match bytes {
            [0xEF, 0xBB, 0xBF, ..] => (TextEncoding::Utf8, 3),
            [0xFF, 0xFE, ..] => (TextEncoding::Utf16Le, 2),
            [0xFE, 0xFF, ..] => (TextEncoding::Utf16Be, 2),
            _ => (TextEncoding::Utf8, 0),
        }
    }

    fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Utf16Le => "UTF-16LE",
            TextEncoding::Utf16Be => "UTF-16BE",
        }
    }

    fn unit(self, pair: [u8; 2]) -> u16 {
        match self {
            TextEncoding::Utf16Be => u16::from_be_bytes(pair),
            _ => u16::from_le_bytes(pair),
        }
    }

    /// Strict decode: malformed input is an error, never replaced.
    fn decode(self, bytes: &[u8]) -> Result<String, RosterFormatError> {
        let invalid = |detail: String| RosterFormatError::Encoding {
            encoding: self.name(),
            detail,
        };
        match self {
            TextEncoding::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| {
                invalid(format!(
                    "invalid byte sequence after byte {}",
                    e.utf8_error().valid_up_to()
                ))
            }),
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
                if bytes.len() % 2 != 0 {
                    return Err(invalid("odd number of bytes".to_string()));
                }
                let units = bytes.chunks_exact(2).map(|c| self.unit([c[0], c[1]]));
                char::decode_utf16(units)
                    .map(|r| {
                        r.map_err(|e| {
                            invalid(format!("unpaired surrogate {:#06x}", e.unpaired_surrogate()))
                        })
                    })
                    .collect()
            }
        }
    }
}

/// Decode a roster file's bytes, honoring a UTF-8, UTF-16LE or UTF-16BE byte
/// order mark.
pub fn decode_roster(bytes: &[u8]) -> Result<String, RosterFormatError> {
    let (encoding, bom) = TextEncoding::sniff(bytes);
    encoding.decode(&bytes[bom..])
}

// ---------------------------------------------------------------------------
// Delimiter detection
// ---------------------------------------------------------------------------

/// Choose the delimiter for a header line: tab when tabs strictly outnumber
/// commas, comma otherwise (ties and delimiter-free lines included).
pub fn detect_delimiter_in_line(line: &str) -> u8 {
    let commas = line.matches(',').count();
    let tabs = line.matches('\t').count();
    if tabs > commas {
        b'\t'
    } else {
        b','
    }
}

/// Detect the delimiter of a roster file by reading only its first line.
pub fn detect_delimiter(path: &Path) -> Result<u8, RosterError> {
    let not_found = |e: std::io::Error| RosterError::NotFound {
        path: path.to_path_buf(),
        source: e,
    };
    let file = std::fs::File::open(path).map_err(not_found)?;
    let mut reader = BufReader::new(file);

    let (encoding, bom) = TextEncoding::sniff(reader.fill_buf().map_err(not_found)?);
    reader.consume(bom);

    let mut line = Vec::new();
    match encoding {
        TextEncoding::Utf8 => {
            reader.read_until(b'\n', &mut line).map_err(not_found)?;
        }
        TextEncoding::Utf16Le | TextEncoding::Utf16Be => loop {
            let mut pair = [0u8; 2];
            match reader.read_exact(&mut pair) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(not_found(e)),
            }
            line.extend_from_slice(&pair);
            if encoding.unit(pair) == u16::from(b'\n') {
                break;
            }
        },
    }

    let first_line = encoding.decode(&line).map_err(|e| RosterError::Format {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(detect_delimiter_in_line(&first_line))
}

// ---------------------------------------------------------------------------
// Reader-based loading (enables testing without temp files)
// ---------------------------------------------------------------------------

/// Column positions resolved against an actual header row.
struct ColumnIndices {
    name: usize,
    title: usize,
    guests: usize,
}

impl ColumnIndices {
    fn resolve(
        headers: &csv::StringRecord,
        columns: &ColumnMapping,
    ) -> Result<Self, RosterFormatError> {
        let find = |column: &str| {
            headers
                .iter()
                .position(|h| h.trim() == column)
                .ok_or_else(|| RosterFormatError::MissingColumn {
                    column: column.to_string(),
                })
        };
        Ok(ColumnIndices {
            name: find(columns.name.as_str())?,
            title: find(columns.title.as_str())?,
            guests: find(columns.guests.as_str())?,
        })
    }
}

/// Returns `None` for blank or missing cells.
fn field(record: &csv::StringRecord, index: usize) -> Option<String> {
    record
        .get(index)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse a header-having delimited table into every record it contains,
/// before any filtering.
pub fn read_attendees<R: Read>(
    rdr: R,
    delimiter: u8,
    columns: &ColumnMapping,
) -> Result<Vec<Attendee>, RosterFormatError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(rdr);

    let headers = reader.headers()?.clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(RosterFormatError::MissingHeader);
    }
    let idx = ColumnIndices::resolve(&headers, columns)?;

    let mut attendees = Vec::new();
    for result in reader.records() {
        let record = result?;
        let Some(name) = field(&record, idx.name) else {
            warn!(
                "skipping roster row {}: blank `{}`",
                record.position().map_or(0, |p| p.line()),
                columns.name
            );
            continue;
        };
        attendees.push(Attendee {
            name,
            title: field(&record, idx.title),
            guests: field(&record, idx.guests),
        });
    }
    Ok(attendees)
}

/// Build the draw roster from the text of a roster file: detect the
/// delimiter, drop titled rows and append guests.
pub fn load_attendees_from_str(
    content: &str,
    columns: &ColumnMapping,
) -> Result<Vec<Attendee>, RosterFormatError> {
    // Callers holding already-decoded text may still carry the BOM.
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let first_line = content.lines().next().unwrap_or_default();
    let delimiter = detect_delimiter_in_line(first_line);
    debug!(
        "roster delimiter detected: {}",
        if delimiter == b'\t' { "tab" } else { "comma" }
    );

    let records = read_attendees(content.as_bytes(), delimiter, columns)?;
    let total = records.len();

    let mut roster: Vec<Attendee> = records
        .into_iter()
        .filter(Attendee::is_plain_attendee)
        .collect();
    let titled = total - roster.len();

    let guests = add_guests(&mut roster)?;

    info!(
        "Roster loaded: {} rows, {} excluded by title, {} guests added, {} entries",
        total,
        titled,
        guests,
        roster.len()
    );
    Ok(roster)
}

// ---------------------------------------------------------------------------
// Public path-based loader
// ---------------------------------------------------------------------------

/// Load the draw roster from a comma- or tab-delimited file.
///
/// Loading is all-or-nothing: any format problem, including bytes that do
/// not decode, fails the whole load.
pub fn load_attendees(path: &Path, columns: &ColumnMapping) -> Result<Vec<Attendee>, RosterError> {
    let bytes = std::fs::read(path).map_err(|e| RosterError::NotFound {
        path: path.to_path_buf(),
        source: e,
    })?;
    decode_roster(&bytes)
        .and_then(|content| load_attendees_from_str(&content, columns))
        .map_err(|e| RosterError::Format {
            path: path.to_path_buf(),
            source: e,
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
