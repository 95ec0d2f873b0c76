//! Candle series validation and chronological event merge.

pub mod merge;
pub mod validate;

pub use merge::{merge_series, BarEvent, MergedEvents};
pub use validate::{validate_series, DataGap, DataIntegrityError, GapPolicy, SeriesReport};
