//! Converts raw statistics into observations and hands them to a dispatcher.

use chrono::Utc;
use tracing::debug;

use crate::collector::lookup::resolve;
use crate::dispatch::{DispatchError, Dispatcher, DsType, PLUGIN_NAME, Value, ValueList};

/// Result of a successful submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The statistic was converted and dispatched.
    Dispatched,
    /// The statistic is not in the lookup table and was dropped.
    Unresolved,
}

/// Error type for a single dropped statistic.
#[derive(Debug)]
pub enum SubmitError {
    /// Lookup table names a metric kind the dispatcher does not know.
    UnknownType(String),
    /// Metric kind has more or fewer than one data source.
    Arity { type_name: String, arity: usize },
    /// Value is not a number of the kind the schema expects.
    InvalidValue {
        name: String,
        value: String,
        expected: DsType,
    },
    /// Dispatcher rejected the observation.
    Dispatch(DispatchError),
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::UnknownType(type_name) => write!(
                f,
                "lookup table returned type '{}', but no such type is known",
                type_name
            ),
            SubmitError::Arity { type_name, arity } => write!(
                f,
                "type '{}' has {} data sources, only one is supported",
                type_name, arity
            ),
            SubmitError::InvalidValue {
                name,
                value,
                expected,
            } => {
                let kind = if *expected == DsType::Gauge {
                    "a floating point number"
                } else {
                    "an integer number"
                };
                write!(f, "cannot convert {}='{}' to {}", name, value, kind)
            }
            SubmitError::Dispatch(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SubmitError {}

impl From<DispatchError> for SubmitError {
    fn from(e: DispatchError) -> Self {
        SubmitError::Dispatch(e)
    }
}

/// Resolves `raw_name`, converts `raw_value` per the metric schema and
/// dispatches one observation labelled with `instance`.
///
/// Unresolved names return `Ok(Submission::Unresolved)` without touching the
/// dispatcher at all.
pub fn submit<D: Dispatcher + ?Sized>(
    dispatcher: &mut D,
    host: &str,
    instance: &str,
    raw_name: &str,
    raw_value: &str,
) -> Result<Submission, SubmitError> {
    let Some(entry) = resolve(raw_name) else {
        debug!("not in lookup table: {} = {}", raw_name, raw_value);
        return Ok(Submission::Unresolved);
    };

    let ds_type = {
        let ds = dispatcher
            .data_set(entry.metric_kind)
            .ok_or_else(|| SubmitError::UnknownType(entry.metric_kind.to_string()))?;
        if ds.arity() != 1 {
            return Err(SubmitError::Arity {
                type_name: entry.metric_kind.to_string(),
                arity: ds.arity(),
            });
        }
        ds.sources[0].kind
    };

    let value = convert_value(raw_value, ds_type).ok_or_else(|| SubmitError::InvalidValue {
        name: raw_name.to_string(),
        value: raw_value.to_string(),
        expected: ds_type,
    })?;

    let vl = ValueList {
        time: Utc::now().timestamp(),
        host: host.to_string(),
        plugin: PLUGIN_NAME.to_string(),
        plugin_instance: instance.to_string(),
        type_: entry.metric_kind.to_string(),
        type_instance: entry.sub_label.map(str::to_string),
        values: vec![value],
    };
    dispatcher.dispatch(&vl)?;

    Ok(Submission::Dispatched)
}

/// Converts a raw token into the representation `kind` requires.
pub fn convert_value(raw: &str, kind: DsType) -> Option<Value> {
    match kind {
        DsType::Gauge => parse_float_prefix(raw).map(Value::Gauge),
        DsType::Counter => parse_integer_prefix(raw).map(|v| Value::Counter(v as u64)),
        DsType::Derive => parse_integer_prefix(raw).map(Value::Derive),
        DsType::Absolute => parse_integer_prefix(raw).map(|v| Value::Absolute(v as u64)),
    }
}

fn skip_space(s: &str) -> &str {
    s.trim_start_matches([' ', '\t', '\n', '\r', '\x0b', '\x0c'])
}

fn split_sign(s: &str) -> (bool, &str) {
    match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    }
}

/// Parses the longest integer prefix of `s` the way `strtoll(s, _, 0)` does:
/// leading whitespace, optional sign, `0x` for hex, leading `0` for octal.
/// Out-of-range values saturate. Returns `None` if no digit was consumed.
pub fn parse_integer_prefix(s: &str) -> Option<i64> {
    let (negative, rest) = split_sign(skip_space(s));
    let bytes = rest.as_bytes();

    let (radix, digits) = match bytes {
        [b'0', b'x' | b'X', next, ..] if next.is_ascii_hexdigit() => (16, &bytes[2..]),
        [b'0', ..] => (8, bytes),
        _ => (10, bytes),
    };

    let mut acc: i128 = 0;
    let mut consumed = 0;
    for &b in digits {
        let Some(d) = (b as char).to_digit(radix) else {
            break;
        };
        acc = (acc * radix as i128 + d as i128).min(i64::MAX as i128 + 1);
        consumed += 1;
    }
    if consumed == 0 {
        return None;
    }

    let signed = if negative { -acc } else { acc };
    Some(signed.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
}

/// Parses the longest floating point prefix of `s`, like `strtod`.
/// Accepts decimal and `0x` hexadecimal (with optional `p` binary exponent)
/// forms, and `inf`, `infinity` and `nan` in any case. Returns `None` if no
/// number was found.
pub fn parse_float_prefix(s: &str) -> Option<f64> {
    let (negative, rest) = split_sign(skip_space(s));
    let sign = if negative { -1.0 } else { 1.0 };

    let lower = rest.get(..8).unwrap_or(rest).to_ascii_lowercase();
    if lower.starts_with("inf") {
        return Some(sign * f64::INFINITY);
    }
    if lower.starts_with("nan") {
        return Some(f64::NAN);
    }

    if let Some(v) = parse_hex_float(rest) {
        return Some(sign * v);
    }

    let bytes = rest.as_bytes();
    let mut end = 0;
    let mut mantissa_digits = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        mantissa_digits += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            mantissa_digits += 1;
        }
    }
    if mantissa_digits == 0 {
        return None;
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    rest[..end].parse::<f64>().ok().map(|v| sign * v)
}

/// `0x` hexadecimal float without sign. `None` when no hex digit follows
/// the prefix, leaving the leading `0` to the decimal path.
fn parse_hex_float(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    if !matches!(bytes, [b'0', b'x' | b'X', ..]) {
        return None;
    }

    let mut end = 2;
    let mut mantissa = 0f64;
    let mut exponent: i32 = 0;
    let mut digits = 0;
    while let Some(d) = bytes.get(end).and_then(|&b| (b as char).to_digit(16)) {
        mantissa = mantissa * 16.0 + d as f64;
        end += 1;
        digits += 1;
    }
    if bytes.get(end) == Some(&b'.') {
        end += 1;
        while let Some(d) = bytes.get(end).and_then(|&b| (b as char).to_digit(16)) {
            mantissa = mantissa * 16.0 + d as f64;
            exponent = exponent.saturating_sub(4);
            end += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'p' | b'P')) {
        let (negative, exp_str) = split_sign(&s[end + 1..]);
        let exp_digits: &str = {
            let len = exp_str.bytes().take_while(u8::is_ascii_digit).count();
            &exp_str[..len]
        };
        if !exp_digits.is_empty() {
            let value = exp_digits.parse::<i32>().unwrap_or(i32::MAX);
            let value = if negative { -value } else { value };
            exponent = exponent.saturating_add(value);
        }
    }

    Some(mantissa * 2f64.powi(exponent.clamp(-2200, 2200)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{DataSet, DataSource, MemoryDispatcher, TypesDb};

    fn submit_one(
        d: &mut MemoryDispatcher,
        name: &str,
        value: &str,
    ) -> Result<Submission, SubmitError> {
        submit(d, "ns1", "local", name, value)
    }

    #[test]
    fn test_submit_resolved_counter() {
        let mut d = MemoryDispatcher::new();
        let r = submit_one(&mut d, "cache-hits", "1234").unwrap();
        assert_eq!(r, Submission::Dispatched);

        let vl = &d.dispatched[0];
        assert_eq!(vl.host, "ns1");
        assert_eq!(vl.plugin, "powerdns");
        assert_eq!(vl.plugin_instance, "local");
        assert_eq!(vl.type_, "cache_result");
        assert_eq!(vl.type_instance.as_deref(), Some("hit"));
        assert_eq!(vl.values, vec![Value::Derive(1234)]);
        assert!(vl.time > 0);
    }

    #[test]
    fn test_submit_resolved_gauge() {
        let mut d = MemoryDispatcher::new();
        submit_one(&mut d, "latency", "250.5").unwrap();
        let vl = d.find("latency", None).unwrap();
        assert_eq!(vl.values, vec![Value::Gauge(250.5)]);
    }

    #[test]
    fn test_submit_unresolved_never_touches_dispatcher() {
        let mut d = MemoryDispatcher::new();
        let r = submit_one(&mut d, "unknown-stat-xyz", "1").unwrap();
        assert_eq!(r, Submission::Unresolved);
        assert_eq!(d.lookups(), 0);
        assert!(d.dispatched.is_empty());
    }

    #[test]
    fn test_submit_invalid_gauge_is_dropped() {
        let mut d = MemoryDispatcher::new();
        let err = submit_one(&mut d, "latency", "N/A").unwrap_err();
        assert!(matches!(
            err,
            SubmitError::InvalidValue {
                expected: DsType::Gauge,
                ..
            }
        ));
        assert!(d.dispatched.is_empty());
    }

    #[test]
    fn test_submit_invalid_integer_is_dropped() {
        let mut d = MemoryDispatcher::new();
        let err = submit_one(&mut d, "questions", "many").unwrap_err();
        assert!(err.to_string().contains("integer"));
        assert!(d.dispatched.is_empty());
    }

    #[test]
    fn test_submit_unknown_type() {
        let mut d = MemoryDispatcher::with_types(TypesDb::new());
        let err = submit_one(&mut d, "questions", "1").unwrap_err();
        assert!(matches!(err, SubmitError::UnknownType(ref t) if t == "dns_qtype"));
        assert_eq!(d.lookups(), 1);
        assert!(d.dispatched.is_empty());
    }

    #[test]
    fn test_submit_arity_mismatch() {
        // io_packets carries rx and tx
        let mut d = MemoryDispatcher::new();
        let err = submit_one(&mut d, "corrupt-packets", "3").unwrap_err();
        assert!(matches!(err, SubmitError::Arity { arity: 2, .. }));
        assert!(d.dispatched.is_empty());
    }

    #[test]
    fn test_submit_counter_type() {
        let mut types = TypesDb::new();
        types.insert(DataSet {
            type_name: "counter".to_string(),
            sources: vec![DataSource {
                name: "value".to_string(),
                kind: DsType::Counter,
                min: None,
                max: None,
            }],
        });
        let mut d = MemoryDispatcher::with_types(types);
        submit_one(&mut d, "deferred-cache-inserts", "0x10").unwrap();
        let vl = d.find("counter", Some("cache-deferred_insert")).unwrap();
        assert_eq!(vl.values, vec![Value::Counter(16)]);
    }

    #[test]
    fn test_parse_integer_prefix() {
        assert_eq!(parse_integer_prefix("42"), Some(42));
        assert_eq!(parse_integer_prefix("  -7"), Some(-7));
        assert_eq!(parse_integer_prefix("+5"), Some(5));
        assert_eq!(parse_integer_prefix("0x1f"), Some(31));
        assert_eq!(parse_integer_prefix("017"), Some(15));
        assert_eq!(parse_integer_prefix("0"), Some(0));
        assert_eq!(parse_integer_prefix("0xg"), Some(0));
        assert_eq!(parse_integer_prefix("089"), Some(0));
        assert_eq!(parse_integer_prefix("12abc"), Some(12));
        assert_eq!(parse_integer_prefix("99\n"), Some(99));
        assert_eq!(parse_integer_prefix("99999999999999999999"), Some(i64::MAX));
        assert_eq!(parse_integer_prefix("-99999999999999999999"), Some(i64::MIN));
        assert_eq!(parse_integer_prefix(""), None);
        assert_eq!(parse_integer_prefix("-"), None);
        assert_eq!(parse_integer_prefix("abc"), None);
    }

    #[test]
    fn test_parse_float_prefix() {
        assert_eq!(parse_float_prefix("1.5"), Some(1.5));
        assert_eq!(parse_float_prefix(" -2.25xyz"), Some(-2.25));
        assert_eq!(parse_float_prefix(".5"), Some(0.5));
        assert_eq!(parse_float_prefix("5."), Some(5.0));
        assert_eq!(parse_float_prefix("1e3"), Some(1000.0));
        assert_eq!(parse_float_prefix("1e"), Some(1.0));
        assert_eq!(parse_float_prefix("2E-1,"), Some(0.2));
        assert_eq!(parse_float_prefix("-Infinity"), Some(f64::NEG_INFINITY));
        assert!(parse_float_prefix("nan").unwrap().is_nan());
        assert_eq!(parse_float_prefix("."), None);
        assert_eq!(parse_float_prefix("N/A"), None);
        assert_eq!(parse_float_prefix(""), None);
    }

    #[test]
    fn test_parse_float_prefix_hex() {
        assert_eq!(parse_float_prefix("0x1p4"), Some(16.0));
        assert_eq!(parse_float_prefix("-0X1.8P1"), Some(-3.0));
        assert_eq!(parse_float_prefix("0x10"), Some(16.0));
        assert_eq!(parse_float_prefix("0x.8"), Some(0.5));
        assert_eq!(parse_float_prefix("0x1p-2,"), Some(0.25));
        assert_eq!(parse_float_prefix("0x1p"), Some(1.0));
        assert_eq!(parse_float_prefix("0xzz"), Some(0.0));
    }
}
