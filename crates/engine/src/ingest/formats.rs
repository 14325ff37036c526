//! Payload extractors for the supported source layouts.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::registry::{FieldSelector, RowFilter};

/// Kyoto WDC marks missing hourly values with runs of nines; no real Dst
/// reaches this magnitude.
const KYOTO_MISSING_MIN: f64 = 9999.0;

/// Value and payload timestamp pulled out of a source payload, before unit
/// normalization.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Extracted {
    pub value: f64,
    pub observed_at: Option<DateTime<Utc>>,
}

/// SWPC product tables: `[["time_tag","speed",...], ["2025-05-01 12:00:00.000","412.3",...], ...]`.
///
/// Rows are chronological. The newest row carrying a value wins; rows whose
/// value is null are gaps, not errors.
pub(crate) fn swpc_table(body: &str, selector: &FieldSelector) -> Result<Extracted, String> {
    let rows: Vec<Vec<Value>> =
        serde_json::from_str(body).map_err(|e| format!("invalid table payload: {e}"))?;

    let (header, data) = rows
        .split_first()
        .ok_or_else(|| "table payload is empty".to_string())?;

    let column = |name: &str| header.iter().position(|cell| cell.as_str() == Some(name));
    let value_column =
        column(&selector.field).ok_or_else(|| format!("column {} not found", selector.field))?;
    let time_column = column(&selector.time_field);

    for row in data.iter().rev() {
        let Some(cell) = row.get(value_column) else {
            continue;
        };
        if let Some(value) = parse_number(cell)? {
            let observed_at = time_column
                .and_then(|index| row.get(index))
                .and_then(Value::as_str)
                .and_then(parse_time);
            return Ok(Extracted { value, observed_at });
        }
    }

    Err(format!("no row carries a value for {}", selector.field))
}

/// SWPC record lists: `[{"time_tag": "...", "flux": 1.2e-6, "energy": "0.1-0.8nm"}, ...]`.
///
/// Picks the newest record that passes the row filter and carries a value.
/// Records whose time cannot be parsed keep their array position as order.
pub(crate) fn swpc_records(body: &str, selector: &FieldSelector) -> Result<Extracted, String> {
    let records: Vec<serde_json::Map<String, Value>> =
        serde_json::from_str(body).map_err(|e| format!("invalid record payload: {e}"))?;

    let mut best: Option<Extracted> = None;
    for record in records
        .iter()
        .filter(|record| passes(record, selector.filter.as_ref()))
    {
        let Some(value) = record.get(&selector.field).map(parse_number).transpose()?.flatten()
        else {
            continue;
        };
        let observed_at = record
            .get(&selector.time_field)
            .and_then(Value::as_str)
            .and_then(parse_time);
        let candidate = Extracted { value, observed_at };

        let newer = match (&best, observed_at) {
            (None, _) => true,
            (Some(current), Some(time)) => current.observed_at.map_or(true, |t| time >= t),
            (Some(_), None) => true,
        };
        if newer {
            best = Some(candidate);
        }
    }

    best.ok_or_else(|| format!("no matching record carries a value for {}", selector.field))
}

/// Kyoto WDC realtime Dst text. Data lines read `year month day hour value`
/// in chronological order; comment lines start with `#`.
///
/// The newest line with a real value wins. Fill values (runs of nines) are
/// gaps, so a trailing unfilled hour falls back to the hour before it.
pub(crate) fn kyoto_dst(body: &str) -> Result<Extracted, String> {
    let data: Vec<&str> = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect();
    if data.is_empty() {
        return Err("Dst payload has no data lines".to_string());
    }

    for line in data.iter().rev() {
        if let Some(extracted) = kyoto_line(line)? {
            return Ok(extracted);
        }
    }
    Err("every Dst line carries the missing-data marker".to_string())
}

/// Parse one Kyoto data line; `None` for a fill value.
fn kyoto_line(line: &str) -> Result<Option<Extracted>, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 5 {
        return Err(format!("Dst line has {} fields, expected 5", parts.len()));
    }

    let value: f64 = parts[4]
        .parse()
        .map_err(|_| format!("Dst value '{}' is not numeric", parts[4]))?;
    if value.abs() >= KYOTO_MISSING_MIN {
        return Ok(None);
    }

    let field = |index: usize, name: &str| -> Result<u32, String> {
        parts[index]
            .parse()
            .map_err(|_| format!("Dst {name} '{}' is not an integer", parts[index]))
    };
    let year = i32::try_from(field(0, "year")?).map_err(|_| "Dst year out of range".to_string())?;
    let month = field(1, "month")?;
    let day = field(2, "day")?;
    let hour = field(3, "hour")?;

    let observed_at = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, 0, 0))
        .map(|naive| naive.and_utc());

    Ok(Some(Extracted { value, observed_at }))
}

fn passes(record: &serde_json::Map<String, Value>, filter: Option<&RowFilter>) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    match record.get(&filter.field) {
        Some(Value::String(text)) => text.contains(&filter.contains),
        Some(other) => other.to_string().contains(&filter.contains),
        None => false,
    }
}

/// Parse a JSON cell into a number. `Ok(None)` means "no reading".
fn parse_number(cell: &Value) -> Result<Option<f64>, String> {
    match cell {
        Value::Null => Ok(None),
        Value::Number(number) => number
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("{number} is not representable")),
        Value::String(text) if text.trim().is_empty() => Ok(None),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| format!("'{text}' is not numeric")),
        other => Err(format!("{other} is not numeric")),
    }
}

/// Parse the timestamp layouts SWPC uses, all in UTC.
pub(crate) fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Some(time.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
        .map(|naive| naive.and_utc())
}
