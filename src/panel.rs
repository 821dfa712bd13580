//! Longitudinal event panel: the engine's input contract
//!
//! One row per (user, submission) produced by the upstream feature pipeline.
//! Rows are loaded from CSV (header row required) or JSON Lines, validated
//! against the required column set, and kept ordered by (user, timestamp).
//! Every window operation downstream depends on that ordering.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading a panel
#[derive(Error, Debug)]
pub enum PanelError {
    #[error("Missing required columns in panel: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    #[error("Line {line}: invalid value {value:?} in column '{column}'")]
    InvalidValue {
        line: usize,
        column: String,
        value: String,
    },

    #[error("Line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("Row {row}: event for user '{user}' breaks (user, timestamp) ordering")]
    Unordered { row: usize, user: String },

    #[error("Cannot infer panel format from '{0}' (use .csv, .jsonl or --input-format)")]
    UnknownFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PanelError>;

/// On-disk layout of a panel file
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PanelFormat {
    /// Comma-separated values with a header row
    Csv,
    /// One JSON object per line
    Jsonl,
}

impl PanelFormat {
    /// Infer the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "jsonl" | "ndjson" => Some(Self::Jsonl),
            _ => None,
        }
    }
}

/// Column names of the input contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub user_id: String,
    pub timestamp: String,
    pub task_id: String,
    pub verdict: String,
    pub rating: String,
    pub rolling_accuracy: String,
    pub rolling_difficulty: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            user_id: "handle".to_string(),
            timestamp: "time".to_string(),
            task_id: "id_of_submission_task".to_string(),
            verdict: "verdict".to_string(),
            rating: "rating_at_submission".to_string(),
            rolling_accuracy: "roll_acc_20".to_string(),
            rolling_difficulty: "roll_ok_diff_20".to_string(),
        }
    }
}

impl ColumnNames {
    /// All required columns in contract order
    pub fn required(&self) -> [&str; 7] {
        [
            self.user_id.as_str(),
            self.timestamp.as_str(),
            self.task_id.as_str(),
            self.verdict.as_str(),
            self.rating.as_str(),
            self.rolling_accuracy.as_str(),
            self.rolling_difficulty.as_str(),
        ]
    }

    /// Check a header against the contract, naming every missing column
    pub fn check_header<'a, I>(&self, header: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let present: BTreeSet<&str> = header.into_iter().collect();
        let missing: BTreeSet<String> = self
            .required()
            .iter()
            .filter(|name| !present.contains(*name))
            .map(|name| name.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PanelError::MissingColumns {
                missing: missing.into_iter().collect(),
            })
        }
    }
}

/// One submission with its upstream confounders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub user_id: String,
    pub timestamp: i64,
    pub task_id: String,
    pub verdict: String,
    /// Rating at submission time
    pub rating: f64,
    /// Rolling acceptance rate over the upstream window (may be absent)
    pub rolling_accuracy: Option<f64>,
    /// Rolling average difficulty of solved tasks (may be absent or non-finite)
    pub rolling_difficulty: Option<f64>,
}

/// Immutable, (user, timestamp)-ordered event table
#[derive(Debug, Clone, Default)]
pub struct Panel {
    events: Vec<Event>,
}

impl Panel {
    /// Build a panel, sorting rows by (user, timestamp)
    ///
    /// The sort is stable so submissions sharing a timestamp keep their
    /// input order.
    pub fn from_events(mut events: Vec<Event>) -> Self {
        events.sort_by(|a, b| {
            a.user_id
                .cmp(&b.user_id)
                .then(a.timestamp.cmp(&b.timestamp))
        });
        Self { events }
    }

    /// Build a panel from rows that must already be ordered
    pub fn from_sorted_events(events: Vec<Event>) -> Result<Self> {
        for (idx, pair) in events.windows(2).enumerate() {
            let (prev, cur) = (&pair[0], &pair[1]);
            let ordered = match prev.user_id.cmp(&cur.user_id) {
                std::cmp::Ordering::Less => true,
                std::cmp::Ordering::Equal => prev.timestamp <= cur.timestamp,
                std::cmp::Ordering::Greater => false,
            };
            if !ordered {
                return Err(PanelError::Unordered {
                    row: idx + 2,
                    user: cur.user_id.clone(),
                });
            }
        }
        Ok(Self { events })
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Contiguous per-user histories in timestamp order
    pub fn histories(&self) -> impl Iterator<Item = &[Event]> {
        self.events.chunk_by(|a, b| a.user_id == b.user_id)
    }

    /// Number of distinct users
    pub fn user_count(&self) -> usize {
        self.histories().count()
    }
}

/// Options controlling how a panel file is read
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Format override; inferred from the extension when `None`
    pub format: Option<PanelFormat>,
    pub columns: ColumnNames,
    /// Reject out-of-order rows instead of sorting them
    pub assume_sorted: bool,
}

/// Load a panel file
pub fn load_panel(path: &Path, options: &LoadOptions) -> Result<Panel> {
    let format = match options.format.or_else(|| PanelFormat::from_path(path)) {
        Some(format) => format,
        None => return Err(PanelError::UnknownFormat(path.display().to_string())),
    };

    let reader = BufReader::new(File::open(path)?);
    let events = match format {
        PanelFormat::Csv => read_csv(reader, &options.columns)?,
        PanelFormat::Jsonl => read_jsonl(reader, &options.columns)?,
    };

    tracing::debug!(rows = events.len(), ?format, "Loaded panel rows");

    if options.assume_sorted {
        Panel::from_sorted_events(events)
    } else {
        Ok(Panel::from_events(events))
    }
}

/// Read CSV rows (RFC 4180 quoting; quoted fields may span lines)
pub fn read_csv<R: BufRead>(reader: R, columns: &ColumnNames) -> Result<Vec<Event>> {
    let mut records = CsvRecords::new(reader);

    let header = match records.next() {
        Some(record) => record?.1,
        None => {
            // An empty file has no header: every column is missing
            columns.check_header(std::iter::empty())?;
            return Ok(Vec::new());
        }
    };

    let header: Vec<String> = header.into_iter().map(|h| h.trim().to_string()).collect();
    columns.check_header(header.iter().map(String::as_str))?;

    let position = |name: &str| header.iter().position(|h| h == name).unwrap_or(0);
    let idx = ColumnIndex {
        user_id: position(&columns.user_id),
        timestamp: position(&columns.timestamp),
        task_id: position(&columns.task_id),
        verdict: position(&columns.verdict),
        rating: position(&columns.rating),
        rolling_accuracy: position(&columns.rolling_accuracy),
        rolling_difficulty: position(&columns.rolling_difficulty),
    };

    let mut events = Vec::new();
    for record in records {
        let (line_no, fields) = record?;
        if fields.len() != header.len() {
            return Err(PanelError::Malformed {
                line: line_no,
                reason: format!(
                    "expected {} fields, found {}",
                    header.len(),
                    fields.len()
                ),
            });
        }

        events.push(Event {
            user_id: fields[idx.user_id].clone(),
            timestamp: parse_timestamp(&fields[idx.timestamp], line_no, &columns.timestamp)?,
            task_id: fields[idx.task_id].clone(),
            verdict: fields[idx.verdict].clone(),
            rating: parse_rating(&fields[idx.rating], line_no, &columns.rating)?,
            rolling_accuracy: parse_confounder(
                &fields[idx.rolling_accuracy],
                line_no,
                &columns.rolling_accuracy,
            )?,
            rolling_difficulty: parse_confounder(
                &fields[idx.rolling_difficulty],
                line_no,
                &columns.rolling_difficulty,
            )?,
        });
    }

    Ok(events)
}

/// Read JSON Lines rows; the first object defines the schema check
pub fn read_jsonl<R: BufRead>(reader: R, columns: &ColumnNames) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    let mut schema_checked = false;

    for (line_idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = line_idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let row: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&line)
            .map_err(|e| PanelError::Malformed {
                line: line_no,
                reason: e.to_string(),
            })?;

        if !schema_checked {
            columns.check_header(row.keys().map(String::as_str))?;
            schema_checked = true;
        }

        events.push(Event {
            user_id: json_text(&row, &columns.user_id, line_no)?,
            timestamp: json_timestamp(&row, &columns.timestamp, line_no)?,
            task_id: json_text(&row, &columns.task_id, line_no)?,
            verdict: json_text(&row, &columns.verdict, line_no)?,
            rating: json_rating(&row, &columns.rating, line_no)?,
            rolling_accuracy: json_confounder(&row, &columns.rolling_accuracy, line_no)?,
            rolling_difficulty: json_confounder(&row, &columns.rolling_difficulty, line_no)?,
        });
    }

    if !schema_checked {
        columns.check_header(std::iter::empty())?;
    }

    Ok(events)
}

struct ColumnIndex {
    user_id: usize,
    timestamp: usize,
    task_id: usize,
    verdict: usize,
    rating: usize,
    rolling_accuracy: usize,
    rolling_difficulty: usize,
}

/// Logical CSV records with the 1-based line each one starts on
///
/// A record whose quoted field is still open at the end of a physical line
/// continues on the next one, with the line break kept in the field. Blank
/// lines between records are skipped.
struct CsvRecords<R> {
    reader: R,
    line_no: usize,
}

impl<R: BufRead> CsvRecords<R> {
    fn new(reader: R) -> Self {
        Self { reader, line_no: 0 }
    }

    /// Next physical line without its `\n`; a `\r` before it is kept so
    /// quoted fields can carry it
    fn next_line(&mut self) -> Option<std::io::Result<String>> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                self.line_no += 1;
                if line.ends_with('\n') {
                    line.pop();
                }
                Some(Ok(line))
            }
            Err(e) => Some(Err(e)),
        }
    }

    fn read_record(&mut self, first: String) -> Result<(usize, Vec<String>)> {
        let start = self.line_no;
        let mut record = first;
        loop {
            if let Some(fields) = split_csv_record(&record) {
                return Ok((start, fields));
            }
            match self.next_line() {
                Some(line) => {
                    record.push('\n');
                    record.push_str(&line?);
                }
                None => {
                    return Err(PanelError::Malformed {
                        line: start,
                        reason: "unterminated quoted field".to_string(),
                    })
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for CsvRecords<R> {
    type Item = Result<(usize, Vec<String>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.next_line()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            if !line.trim().is_empty() {
                return Some(self.read_record(line));
            }
        }
    }
}

/// Split one CSV record, honouring double-quoted fields
///
/// `None` means a quoted field is still open at the end of `record`.
fn split_csv_record(record: &str) -> Option<Vec<String>> {
    let line = record.strip_suffix('\r').unwrap_or(record);
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) => {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => fields.push(std::mem::take(&mut field)),
            (c, _) => field.push(c),
        }
    }

    if in_quotes {
        return None;
    }
    fields.push(field);
    Some(fields)
}

fn is_null_token(raw: &str) -> bool {
    matches!(raw, "" | "null" | "NULL" | "None" | "NA")
}

fn invalid(line: usize, column: &str, value: &str) -> PanelError {
    PanelError::InvalidValue {
        line,
        column: column.to_string(),
        value: value.to_string(),
    }
}

fn parse_timestamp(raw: &str, line: usize, column: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| invalid(line, column, raw))
}

fn parse_rating(raw: &str, line: usize, column: &str) -> Result<f64> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(invalid(line, column, raw)),
    }
}

/// Confounders may be null or non-finite; the bucketizer coerces those
fn parse_confounder(raw: &str, line: usize, column: &str) -> Result<Option<f64>> {
    let trimmed = raw.trim();
    if is_null_token(trimmed) {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|_| invalid(line, column, raw))
}

fn json_field<'a>(
    row: &'a serde_json::Map<String, serde_json::Value>,
    column: &str,
    line: usize,
) -> Result<&'a serde_json::Value> {
    row.get(column).ok_or_else(|| PanelError::Malformed {
        line,
        reason: format!("missing field '{}'", column),
    })
}

fn json_text(
    row: &serde_json::Map<String, serde_json::Value>,
    column: &str,
    line: usize,
) -> Result<String> {
    match json_field(row, column, line)? {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(invalid(line, column, &other.to_string())),
    }
}

fn json_timestamp(
    row: &serde_json::Map<String, serde_json::Value>,
    column: &str,
    line: usize,
) -> Result<i64> {
    let value = json_field(row, column, line)?;
    match value {
        serde_json::Value::Number(n) => n.as_i64().ok_or_else(|| invalid(line, column, &n.to_string())),
        serde_json::Value::String(s) => parse_timestamp(s, line, column),
        other => Err(invalid(line, column, &other.to_string())),
    }
}

fn json_rating(
    row: &serde_json::Map<String, serde_json::Value>,
    column: &str,
    line: usize,
) -> Result<f64> {
    match json_field(row, column, line)? {
        serde_json::Value::Number(n) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid(line, column, &n.to_string())),
        serde_json::Value::String(s) => parse_rating(s, line, column),
        other => Err(invalid(line, column, &other.to_string())),
    }
}

fn json_confounder(
    row: &serde_json::Map<String, serde_json::Value>,
    column: &str,
    line: usize,
) -> Result<Option<f64>> {
    match row.get(column) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => Ok(n.as_f64()),
        Some(serde_json::Value::String(s)) => parse_confounder(s, line, column),
        Some(other) => Err(invalid(line, column, &other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str =
        "handle,time,id_of_submission_task,verdict,rating_at_submission,roll_acc_20,roll_ok_diff_20";

    fn event(user: &str, ts: i64) -> Event {
        Event {
            user_id: user.to_string(),
            timestamp: ts,
            task_id: "1A".to_string(),
            verdict: "OK".to_string(),
            rating: 1500.0,
            rolling_accuracy: Some(0.5),
            rolling_difficulty: Some(1200.0),
        }
    }

    #[test]
    fn test_read_csv_basic() {
        let input = format!(
            "{}\ntourist,10,1462F,OK,3995.0,0.92,2800\nbob,5,\"1,B\",WRONG_ANSWER,1200,,inf\n",
            HEADER
        );
        let events = read_csv(Cursor::new(input), &ColumnNames::default()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].user_id, "tourist");
        assert_eq!(events[0].rating, 3995.0);
        assert_eq!(events[0].rolling_accuracy, Some(0.92));
        assert_eq!(events[1].task_id, "1,B");
        assert_eq!(events[1].rolling_accuracy, None);
        assert_eq!(events[1].rolling_difficulty, Some(f64::INFINITY));
    }

    #[test]
    fn test_read_csv_reordered_columns() {
        let input = "roll_ok_diff_20,verdict,rating_at_submission,handle,roll_acc_20,time,id_of_submission_task\n\
                     1000,OK,1400,alice,0.4,7,42A\n";
        let events = read_csv(Cursor::new(input), &ColumnNames::default()).unwrap();
        assert_eq!(events[0].user_id, "alice");
        assert_eq!(events[0].timestamp, 7);
        assert_eq!(events[0].task_id, "42A");
        assert_eq!(events[0].rolling_difficulty, Some(1000.0));
    }

    #[test]
    fn test_missing_columns_named() {
        let input = "handle,time,verdict,rating_at_submission\nalice,1,OK,1400\n";
        let err = read_csv(Cursor::new(input), &ColumnNames::default()).unwrap_err();
        match err {
            PanelError::MissingColumns { missing } => {
                assert_eq!(
                    missing,
                    vec!["id_of_submission_task", "roll_acc_20", "roll_ok_diff_20"]
                );
            }
            other => panic!("Expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_csv_reports_all_columns() {
        let err = read_csv(Cursor::new(""), &ColumnNames::default()).unwrap_err();
        assert!(matches!(err, PanelError::MissingColumns { ref missing } if missing.len() == 7));
    }

    #[test]
    fn test_invalid_rating_is_fatal() {
        let input = format!("{}\nalice,1,1A,OK,NaN,0.5,100\n", HEADER);
        let err = read_csv(Cursor::new(input), &ColumnNames::default()).unwrap_err();
        assert!(matches!(err, PanelError::InvalidValue { line: 2, .. }));
    }

    #[test]
    fn test_field_count_mismatch() {
        let input = format!("{}\nalice,1,1A,OK\n", HEADER);
        let err = read_csv(Cursor::new(input), &ColumnNames::default()).unwrap_err();
        assert!(matches!(err, PanelError::Malformed { line: 2, .. }));
    }

    #[test]
    fn test_read_jsonl() {
        let input = r#"{"handle":"alice","time":3,"id_of_submission_task":"1A","verdict":"OK","rating_at_submission":1500,"roll_acc_20":null,"roll_ok_diff_20":1300.5}
{"handle":"alice","time":4,"id_of_submission_task":1001,"verdict":"OK","rating_at_submission":"1510","roll_acc_20":0.6,"roll_ok_diff_20":null}
"#;
        let events = read_jsonl(Cursor::new(input), &ColumnNames::default()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].rolling_accuracy, None);
        assert_eq!(events[0].rolling_difficulty, Some(1300.5));
        assert_eq!(events[1].task_id, "1001");
        assert_eq!(events[1].rating, 1510.0);
    }

    #[test]
    fn test_jsonl_missing_columns() {
        let input = r#"{"handle":"alice","time":3}"#;
        let err = read_jsonl(Cursor::new(input), &ColumnNames::default()).unwrap_err();
        assert!(matches!(err, PanelError::MissingColumns { ref missing } if missing.len() == 5));
    }

    #[test]
    fn test_from_events_sorts_stably() {
        let mut late = event("alice", 5);
        late.task_id = "first".to_string();
        let mut tie = event("alice", 5);
        tie.task_id = "second".to_string();
        let panel = Panel::from_events(vec![late, event("bob", 1), tie, event("alice", 1)]);

        let order: Vec<(&str, i64, &str)> = panel
            .events()
            .iter()
            .map(|e| (e.user_id.as_str(), e.timestamp, e.task_id.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("alice", 1, "1A"),
                ("alice", 5, "first"),
                ("alice", 5, "second"),
                ("bob", 1, "1A")
            ]
        );
        assert_eq!(panel.user_count(), 2);
    }

    #[test]
    fn test_from_sorted_events_rejects_disorder() {
        let err =
            Panel::from_sorted_events(vec![event("alice", 2), event("alice", 1)]).unwrap_err();
        assert!(matches!(err, PanelError::Unordered { row: 2, .. }));

        let err = Panel::from_sorted_events(vec![event("bob", 1), event("alice", 1)]).unwrap_err();
        assert!(matches!(err, PanelError::Unordered { .. }));

        assert!(Panel::from_sorted_events(vec![event("alice", 1), event("bob", 0)]).is_ok());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            PanelFormat::from_path(Path::new("x/features.CSV")),
            Some(PanelFormat::Csv)
        );
        assert_eq!(
            PanelFormat::from_path(Path::new("features.ndjson")),
            Some(PanelFormat::Jsonl)
        );
        assert_eq!(PanelFormat::from_path(Path::new("features.parquet")), None);
    }

    #[test]
    fn test_split_csv_record_quotes() {
        assert_eq!(
            split_csv_record(r#"a,"b ""c""",d"#).unwrap(),
            vec!["a", "b \"c\"", "d"]
        );
        assert_eq!(split_csv_record("a,,").unwrap(), vec!["a", "", ""]);
        assert!(split_csv_record(r#"a,"open"#).is_none());
    }

    #[test]
    fn test_quoted_field_spans_lines() {
        let input = format!(
            "{}\nalice,1,\"line1\nline2\",OK,1500,0.5,100\nalice,2,1B,OK,1510,0.5,100\nbob,1,1C,OK,1400,0.5,100,extra\n",
            HEADER
        );
        let err = read_csv(Cursor::new(input.as_str()), &ColumnNames::default()).unwrap_err();
        // Line numbers stay physical after a multi-line record
        assert!(matches!(err, PanelError::Malformed { line: 5, .. }));

        let input = input.replace(",extra", "");
        let events = read_csv(Cursor::new(input), &ColumnNames::default()).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].task_id, "line1\nline2");
        assert_eq!(events[1].task_id, "1B");
        assert_eq!(events[2].user_id, "bob");
    }

    #[test]
    fn test_unterminated_quote_reports_record_start() {
        let input = format!("{}\nalice,1,1A,OK,1500,0.5,100\nbob,1,\"open,OK,1500\n\n", HEADER);
        let err = read_csv(Cursor::new(input), &ColumnNames::default()).unwrap_err();
        match err {
            PanelError::Malformed { line, reason } => {
                assert_eq!(line, 3);
                assert!(reason.contains("unterminated"));
            }
            other => panic!("Expected Malformed, got {:?}", other),
        }
    }
}
