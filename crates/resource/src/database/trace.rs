//! Trace lines for executed statements.
//!
//! After each statement the database handle emits a [`TraceEvent`]; a
//! [`TraceSink`] renders it into a [`TraceLine`] with the parameters
//! substituted into the statement text and writes it out. Rendering never
//! fails: malformed templates and count mismatches degrade to leaving the
//! placeholder in place.
//!
//! Two placeholder dialects are recognised. A template containing `$<digits>`
//! is numbered (`$1` is the first value); otherwise every `?` is positional.

use std::borrow::Cow;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::{Datelike, NaiveDateTime, Timelike};
use regex::{Captures, Regex};
use strata_log::NamedLogger;
use unicode_general_category::{GeneralCategory, get_general_category};

use super::value::{TIMESTAMP_FORMAT, Value};

static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\d+)").expect("static pattern is valid"));

const ZERO_TIME: &str = "'0000-00-00 00:00:00'";

/// What a trace event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    /// A statement ran
    Execution,
    /// A free-form diagnostic from the data-access layer
    Message,
}

/// One traced statement or message.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEvent {
    /// Event kind
    pub kind: TraceKind,
    /// Wall time of the statement
    pub duration: Option<Duration>,
    /// Statement template, or the message text
    pub statement: String,
    /// Parameters bound to the template
    pub parameters: Vec<Value>,
    /// Rows affected or returned
    pub rows: Option<u64>,
    /// `file:line` of the caller
    pub source: String,
}

impl TraceEvent {
    /// An execution event.
    pub fn execution(
        statement: impl Into<String>,
        parameters: Vec<Value>,
        duration: Duration,
        rows: Option<u64>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            kind: TraceKind::Execution,
            duration: Some(duration),
            statement: statement.into(),
            parameters,
            rows,
            source: source.into(),
        }
    }

    /// A message event.
    pub fn message(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            kind: TraceKind::Message,
            duration: None,
            statement: text.into(),
            parameters: Vec::new(),
            rows: None,
            source: source.into(),
        }
    }
}

/// A rendered event, ready to be logged.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceLine {
    /// Event kind
    pub kind: TraceKind,
    /// Statement with parameters substituted, or the message text
    pub statement: String,
    /// Wall time of the statement
    pub elapsed: Option<Duration>,
    /// Rows affected or returned
    pub rows: Option<u64>,
    /// `file:line` of the caller
    pub source: String,
}

/// Render an event. Message events are passed through unchanged.
pub fn render(event: &TraceEvent) -> TraceLine {
    let statement = match event.kind {
        TraceKind::Execution => substitute(&event.statement, &event.parameters),
        TraceKind::Message => event.statement.clone(),
    };
    TraceLine {
        kind: event.kind,
        statement,
        elapsed: event.duration,
        rows: event.rows,
        source: event.source.clone(),
    }
}

/// Substitute rendered `values` into `template`.
///
/// Numbered: each `$k` with `1 <= k <= values.len()` becomes the k-th
/// value; other `$k` stay as written. Substituted text is never scanned
/// again. Positional: the i-th `?` becomes the i-th value; surplus `?` stay
/// as written and surplus values are dropped.
pub fn substitute(template: &str, values: &[Value]) -> String {
    let rendered: Vec<Cow<'static, str>> = values.iter().map(render_value).collect();

    if NUMBERED.is_match(template) {
        return NUMBERED
            .replace_all(template, |caps: &Captures<'_>| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|k| k.checked_sub(1))
                    .and_then(|i| rendered.get(i))
                    .map_or_else(|| caps[0].to_string(), ToString::to_string)
            })
            .into_owned();
    }

    let mut out = String::with_capacity(template.len());
    for (i, segment) in template.split('?').enumerate() {
        if i > 0 {
            match rendered.get(i - 1) {
                Some(value) => out.push_str(value),
                None => out.push('?'),
            }
        }
        out.push_str(segment);
    }
    out
}

/// Render one value the way it would appear in a hand-written statement.
fn render_value(value: &Value) -> Cow<'static, str> {
    match value {
        Value::Null | Value::Optional(None) => Cow::Borrowed("NULL"),
        Value::Optional(Some(inner)) => render_value(inner),
        Value::Bool(b) => Cow::Owned(b.to_string()),
        Value::Int(i) => Cow::Owned(i.to_string()),
        Value::UInt(u) => Cow::Owned(u.to_string()),
        Value::Float(f) => Cow::Owned(f.to_string()),
        Value::Timestamp(ts) if is_zero_time(ts) => Cow::Borrowed(ZERO_TIME),
        Value::Timestamp(ts) => Cow::Owned(format!("'{}'", ts.format(TIMESTAMP_FORMAT))),
        Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) if text.chars().all(is_printable) => Cow::Owned(format!("'{text}'")),
            _ => Cow::Borrowed("'<binary>'"),
        },
        Value::Text(s) => Cow::Owned(format!("'{s}'")),
        Value::Uuid(u) => Cow::Owned(format!("'{u}'")),
        Value::Json(j) => Cow::Owned(format!("'{j}'")),
    }
}

/// The zero date (`0001-01-01 00:00:00`) or the Unix epoch.
fn is_zero_time(ts: &NaiveDateTime) -> bool {
    let midnight = ts.num_seconds_from_midnight() == 0 && ts.nanosecond() == 0;
    let zero_date = ts.year() == 1 && ts.ordinal() == 1;
    let epoch = ts.and_utc().timestamp() == 0;
    midnight && (zero_date || epoch)
}

/// Letters, marks, numbers, punctuation, symbols and the ASCII space.
fn is_printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    !matches!(
        get_general_category(c),
        GeneralCategory::Control
            | GeneralCategory::Format
            | GeneralCategory::Surrogate
            | GeneralCategory::PrivateUse
            | GeneralCategory::Unassigned
            | GeneralCategory::SpaceSeparator
            | GeneralCategory::LineSeparator
            | GeneralCategory::ParagraphSeparator
    )
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Receives every trace event a database handle emits.
pub trait TraceSink: Send + Sync {
    /// Consume one event.
    fn record(&self, event: TraceEvent);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn record(&self, _event: TraceEvent) {}
}

/// Writes trace lines into a named logger.
///
/// Executions log at DEBUG, messages at ERROR, both as `[sql] <text>` with
/// timing, row count and caller location as separate fields.
#[derive(Debug, Clone)]
pub struct LogSink {
    logger: Arc<NamedLogger>,
}

impl LogSink {
    /// Sink writing into `logger`.
    pub fn new(logger: Arc<NamedLogger>) -> Self {
        Self { logger }
    }

    /// The logger lines go to.
    pub fn logger(&self) -> &NamedLogger {
        &self.logger
    }
}

impl TraceSink for LogSink {
    fn record(&self, event: TraceEvent) {
        let line = render(&event);
        let elapsed_ms = line.elapsed.map(|d| d.as_secs_f64() * 1000.0);

        self.logger.in_scope(|| match line.kind {
            TraceKind::Execution => tracing::debug!(
                target: "strata::sql",
                elapsed_ms,
                rows = line.rows,
                source = %line.source,
                "[sql] {}",
                line.statement
            ),
            TraceKind::Message => tracing::error!(
                target: "strata::sql",
                source = %line.source,
                "[sql] {}",
                line.statement
            ),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> Value {
        Value::Timestamp(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, min, s)
                .unwrap(),
        )
    }

    #[test]
    fn numbered_dialect() {
        let out = substitute("a=$1 AND b=$2", &[Value::Int(5), "x".into()]);
        assert_eq!(out, "a=5 AND b='x'");
    }

    #[test]
    fn positional_dialect() {
        let out = substitute("(?, ?)", &[Value::Int(1), Value::Bool(true)]);
        assert_eq!(out, "(1, true)");
    }

    #[test]
    fn numbered_out_of_range_stays_literal() {
        let out = substitute("x=$1 OR y=$3 OR z=$0", &[Value::Int(9)]);
        assert_eq!(out, "x=9 OR y=$3 OR z=$0");
    }

    #[test]
    fn numbered_values_are_not_rescanned() {
        let out = substitute("a=$1 AND b=$2", &["$2".into(), Value::Int(3)]);
        assert_eq!(out, "a='$2' AND b=3");
    }

    #[test]
    fn numbered_two_digit_index() {
        let values: Vec<Value> = (1..=10).map(Value::Int).collect();
        assert_eq!(substitute("$10,$1", &values), "10,1");
    }

    #[test]
    fn positional_count_mismatch() {
        assert_eq!(substitute("(?, ?, ?)", &[Value::Int(1)]), "(1, ?, ?)");
        assert_eq!(
            substitute("(?)", &[Value::Int(1), Value::Int(2)]),
            "(1)"
        );
    }

    #[rstest]
    #[case(ts(1, 1, 1, 0, 0, 0), "'0000-00-00 00:00:00'")]
    #[case(ts(1970, 1, 1, 0, 0, 0), "'0000-00-00 00:00:00'")]
    #[case(ts(2024, 3, 5, 7, 8, 9), "'2024-03-05 07:08:09'")]
    #[case(ts(1, 1, 1, 0, 0, 1), "'0001-01-01 00:00:01'")]
    fn timestamps(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(substitute("?", &[value]), expected);
    }

    #[rstest]
    #[case(b"plain text".to_vec(), "'plain text'")]
    #[case(vec![0x00, 0xff, 0x10], "'<binary>'")]
    #[case(b"tab\there".to_vec(), "'<binary>'")]
    #[case(Vec::new(), "''")]
    #[case("naïve café".as_bytes().to_vec(), "'naïve café'")]
    #[case("abc\u{202E}def".as_bytes().to_vec(), "'<binary>'")]
    #[case("zero\u{200B}width".as_bytes().to_vec(), "'<binary>'")]
    #[case("\u{E000}".as_bytes().to_vec(), "'<binary>'")]
    #[case("nb\u{00A0}sp".as_bytes().to_vec(), "'<binary>'")]
    fn byte_values(#[case] bytes: Vec<u8>, #[case] expected: &str) {
        assert_eq!(substitute("?", &[Value::Bytes(bytes)]), expected);
    }

    #[test]
    fn nulls_and_optionals() {
        let values = [
            Value::Null,
            Value::Optional(None),
            Value::from(Some(4_i64)),
            Value::Float(1.5),
            Value::UInt(u64::MAX),
        ];
        assert_eq!(
            substitute("?,?,?,?,?", &values),
            "NULL,NULL,4,1.5,18446744073709551615"
        );
    }

    #[test]
    fn uuid_and_json_are_quoted() {
        let id = uuid::Uuid::nil();
        let out = substitute(
            "$1 $2",
            &[Value::Uuid(id), Value::Json(serde_json::json!({"k": 1}))],
        );
        assert_eq!(out, "'00000000-0000-0000-0000-000000000000' '{\"k\":1}'");
    }

    #[test]
    fn message_events_are_not_substituted() {
        let event = TraceEvent::message("lost connection at ?", "repo.rs:10");
        let line = render(&event);
        assert_eq!(line.kind, TraceKind::Message);
        assert_eq!(line.statement, "lost connection at ?");
        assert_eq!(line.elapsed, None);
    }

    #[test]
    fn render_keeps_metadata_separate() {
        let event = TraceEvent::execution(
            "DELETE FROM t WHERE id = ?",
            vec![Value::Int(3)],
            Duration::from_millis(12),
            Some(1),
            "repo.rs:42",
        );
        let line = render(&event);
        assert_eq!(line.statement, "DELETE FROM t WHERE id = 3");
        assert_eq!(line.rows, Some(1));
        assert_eq!(line.elapsed, Some(Duration::from_millis(12)));
        assert_eq!(line.source, "repo.rs:42");
    }
}
