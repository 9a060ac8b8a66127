//! Timestamp formatting

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tracing_subscriber::fmt::time::UtcTime;

/// Timestamp layout used by every strata logger: `YYYY-MM-DD HH:MM:SS` (UTC).
pub const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Timer for fmt layers.
pub(crate) fn make_timer() -> UtcTime<&'static [BorrowedFormatItem<'static>]> {
    UtcTime::new(TIMESTAMP_FORMAT)
}
