//! CSV candle loading.
//!
//! One file per instrument with columns `timestamp, open, high, low, close`
//! and an optional `volume`. Column lookup ignores case and surrounding
//! whitespace. Timestamps without an offset are taken as UTC.
//!
//! Rows are returned in file order. Ordering and spacing problems are left to
//! the engine's series validation so they surface with the instrument name.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

use fxlab_core::domain::Candle;
use fxlab_core::engine::InstrumentSeries;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: CSV error: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{}: missing column '{column}'", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("{} line {line}: unparseable timestamp '{value}'", path.display())]
    BadTimestamp { path: PathBuf, line: usize, value: String },

    #[error("{} line {line}: bad {column} value '{value}'", path.display())]
    BadNumber {
        path: PathBuf,
        line: usize,
        column: &'static str,
        value: String,
    },
}

const NAIVE_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse an ISO-8601 timestamp. RFC 3339 offsets are converted to UTC;
/// naive timestamps are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Load one instrument's candles from a CSV file.
pub fn load_candles(path: &Path) -> Result<Vec<Candle>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_candles(file, path)
}

/// Read candles from any reader; `path` is only used in error messages.
pub fn read_candles<R: Read>(reader: R, path: &Path) -> Result<Vec<Candle>, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers().map_err(csv_err)?.clone();
    let find = |name: &'static str| {
        headers
            .iter()
            .position(|h| h.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case(name))
    };
    let required = |name: &'static str| {
        find(name).ok_or_else(|| LoadError::MissingColumn {
            path: path.to_path_buf(),
            column: name,
        })
    };
    let ts_col = required("timestamp")?;
    let price_cols = [
        ("open", required("open")?),
        ("high", required("high")?),
        ("low", required("low")?),
        ("close", required("close")?),
    ];
    let volume_col = find("volume");

    let mut candles = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record.map_err(csv_err)?;
        // Header is line 1
        let line = i + 2;
        let field = |col: usize| record.get(col).unwrap_or("");

        let raw_ts = field(ts_col);
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| LoadError::BadTimestamp {
            path: path.to_path_buf(),
            line,
            value: raw_ts.to_string(),
        })?;

        let number = |column: &'static str, col: usize| {
            let raw = field(col);
            raw.parse::<f64>().map_err(|_| LoadError::BadNumber {
                path: path.to_path_buf(),
                line,
                column,
                value: raw.to_string(),
            })
        };
        let [open, high, low, close] = [
            number(price_cols[0].0, price_cols[0].1)?,
            number(price_cols[1].0, price_cols[1].1)?,
            number(price_cols[2].0, price_cols[2].1)?,
            number(price_cols[3].0, price_cols[3].1)?,
        ];
        let volume = match volume_col {
            Some(col) if !field(col).is_empty() => number("volume", col)?,
            _ => 0.0,
        };
        candles.push(Candle::new(timestamp, open, high, low, close, volume));
    }
    Ok(candles)
}

/// Deterministic BLAKE3 hash over every candle, in the given series order.
pub fn dataset_hash(series: &[InstrumentSeries]) -> String {
    let mut hasher = blake3::Hasher::new();
    for s in series {
        hasher.update(s.symbol.as_bytes());
        for c in &s.candles {
            hasher.update(&c.timestamp.timestamp().to_le_bytes());
            hasher.update(&c.open.to_le_bytes());
            hasher.update(&c.high.to_le_bytes());
            hasher.update(&c.low.to_le_bytes());
            hasher.update(&c.close.to_le_bytes());
            hasher.update(&c.volume.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
