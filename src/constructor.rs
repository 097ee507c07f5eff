//! Converting a resolved, tagged [`Document`] tree into typed Rust values.
//!
//! Each function here takes the already-resolved tag and scalar text (or,
//! for collections, the node's children) and produces a concrete Rust value,
//! or a positional [`ConstructorError`] tied to the node's [`Mark`].

use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::{ConstructorError, Document, Mark, NodeData, NodePair};

/// A constructed timestamp: always normalized to UTC, as a missing zone
/// designator implies UTC per the core schema.
pub type Timestamp = DateTime<Utc>;

/// Construct `!!null`. Every implicitly-resolved null form (`~`, `null`,
/// `Null`, `NULL`, or the empty scalar) carries no information beyond its
/// tag, so there is nothing to parse.
pub fn construct_null(_value: &str) -> Result<(), ConstructorError> {
    Ok(())
}

/// Construct `!!bool` from one of the core schema's truthy/falsy spellings.
pub fn construct_bool(value: &str, mark: Mark) -> Result<bool, ConstructorError> {
    match value {
        "yes" | "Yes" | "YES" | "true" | "True" | "TRUE" | "on" | "On" | "ON" => Ok(true),
        "no" | "No" | "NO" | "false" | "False" | "FALSE" | "off" | "Off" | "OFF" => Ok(false),
        _ => Err(ConstructorError::Problem {
            problem: format!("invalid boolean value {value:?}"),
            mark,
        }),
    }
}

/// Construct `!!int`, handling underscores, sign, base prefixes
/// (`0b`, `0` + octal digits, `0x`), and sexagesimal (`d0:d1:...:dn`).
pub fn construct_int(value: &str, mark: Mark) -> Result<i64, ConstructorError> {
    let (negative, rest) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };
    let digits: String = rest.chars().filter(|&c| c != '_').collect();

    let magnitude = if let Some(bin) = digits.strip_prefix("0b") {
        i64::from_str_radix(bin, 2)
    } else if let Some(hex) = digits.strip_prefix("0x") {
        i64::from_str_radix(hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') && digits.bytes().all(|b| b.is_ascii_digit()) {
        i64::from_str_radix(&digits[1..], 8)
    } else if digits.contains(':') {
        return construct_sexagesimal_int(&digits, negative, mark);
    } else {
        digits.parse::<i64>()
    }
    .map_err(|_| ConstructorError::IntOutOfRange {
        value: value.to_string(),
        mark,
    })?;

    Ok(if negative { -magnitude } else { magnitude })
}

fn construct_sexagesimal_int(
    digits: &str,
    negative: bool,
    mark: Mark,
) -> Result<i64, ConstructorError> {
    let mut total: i64 = 0;
    for part in digits.split(':') {
        let part: i64 = part.parse().map_err(|_| ConstructorError::IntOutOfRange {
            value: digits.to_string(),
            mark,
        })?;
        total = total
            .checked_mul(60)
            .and_then(|t| t.checked_add(part))
            .ok_or_else(|| ConstructorError::IntOutOfRange {
                value: digits.to_string(),
                mark,
            })?;
    }
    Ok(if negative { -total } else { total })
}

/// Construct `!!float`, handling underscores, `.inf`/`-.inf`/`.nan`,
/// sexagesimal floats, and ordinary IEEE-754 literals.
pub fn construct_float(value: &str, mark: Mark) -> Result<f64, ConstructorError> {
    let stripped: String = value.chars().filter(|&c| c != '_').collect();
    match stripped.as_str() {
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => return Ok(f64::INFINITY),
        "-.inf" | "-.Inf" | "-.INF" => return Ok(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => return Ok(f64::NAN),
        _ => {}
    }

    let (negative, rest) = match stripped.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, stripped.strip_prefix('+').unwrap_or(&stripped)),
    };
    if rest.contains(':') {
        let mut parts = rest.splitn(2, '.');
        let int_part = parts.next().unwrap_or("");
        let frac_part = parts.next();
        let mut total: f64 = 0.0;
        for part in int_part.split(':') {
            let digit: f64 = part.parse().map_err(|_| ConstructorError::Problem {
                problem: format!("invalid sexagesimal float {value:?}"),
                mark,
            })?;
            total = total * 60.0 + digit;
        }
        if let Some(frac) = frac_part {
            let frac_value: f64 = format!("0.{frac}")
                .parse()
                .map_err(|_| ConstructorError::Problem {
                    problem: format!("invalid sexagesimal float {value:?}"),
                    mark,
                })?;
            total += frac_value;
        }
        return Ok(if negative { -total } else { total });
    }

    stripped.parse::<f64>().map_err(|_| ConstructorError::Problem {
        problem: format!("invalid float value {value:?}"),
        mark,
    })
}

/// Construct `!!timestamp`: `YYYY-MM-DD`, or a full date-time with an
/// optional fractional second and an optional zone offset. A missing zone
/// designator means UTC.
pub fn construct_timestamp(value: &str, mark: Mark) -> Result<Timestamp, ConstructorError> {
    let bad_timestamp = || ConstructorError::InvalidTimestamp {
        value: value.to_string(),
        mark,
    };

    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let naive = date.and_hms_opt(0, 0, 0).ok_or_else(bad_timestamp)?;
        return Ok(naive.and_utc());
    }

    let mut rest = value.replacen(['T', 't'], " ", 1);
    if let Some(pos) = rest.find(['Z', 'z']) {
        let (date_time, _) = rest.split_at(pos);
        let naive =
            parse_flexible_datetime(date_time.trim_end()).ok_or_else(bad_timestamp)?;
        return Ok(naive.and_utc());
    }

    for (i, ch) in rest.char_indices().rev() {
        if ch == '+' || (ch == '-' && i > 10) {
            let (date_time, zone) = rest.split_at(i);
            let naive = parse_flexible_datetime(date_time.trim_end()).ok_or_else(bad_timestamp)?;
            let offset = parse_zone_offset(zone).ok_or_else(bad_timestamp)?;
            let fixed: DateTime<FixedOffset> = offset
                .from_local_datetime(&naive)
                .single()
                .ok_or_else(bad_timestamp)?;
            return Ok(fixed.with_timezone(&Utc));
        }
    }

    rest = rest.trim_end().to_string();
    let naive = parse_flexible_datetime(&rest).ok_or_else(bad_timestamp)?;
    Ok(naive.and_utc())
}

fn parse_flexible_datetime(value: &str) -> Option<NaiveDateTime> {
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value.trim(), fmt) {
            return Some(dt);
        }
    }
    None
}

fn parse_zone_offset(zone: &str) -> Option<FixedOffset> {
    let zone = zone.trim();
    let (sign, rest) = zone.split_at(1);
    let sign = if sign == "-" { -1 } else { 1 };
    let mut parts = rest.splitn(2, ':');
    let hours: i32 = parts.next()?.parse().ok()?;
    let minutes: i32 = parts.next().unwrap_or("0").parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Construct `!!binary`: base64-decode the scalar, ignoring embedded
/// whitespace (YAML folds long `!!binary` scalars across lines).
pub fn construct_binary(value: &str, mark: Mark) -> Result<Vec<u8>, ConstructorError> {
    let stripped: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(stripped)
        .map_err(|_| ConstructorError::InvalidBase64 { mark })
}

/// Construct `!!str`: the scalar's text, unchanged.
pub fn construct_str(value: &str) -> String {
    value.to_string()
}

/// Construct `!!set`: a mapping whose pairs' values must all be null,
/// exposing just the keys.
pub fn construct_set(document: &Document, node_index: i32) -> Result<Vec<i32>, ConstructorError> {
    let Some(node) = document.get_node(node_index) else {
        return Ok(Vec::new());
    };
    let NodeData::Mapping { pairs, .. } = &node.data else {
        return Err(ConstructorError::Problem {
            problem: "expected a mapping for !!set".to_string(),
            mark: node.start_mark,
        });
    };
    let mut keys = Vec::with_capacity(pairs.len());
    for pair in pairs {
        if let Some(value_node) = document.get_node(pair.value) {
            if !matches!(value_node.tag.as_deref(), Some(tag) if tag == crate::NULL_TAG) {
                return Err(ConstructorError::Problem {
                    problem: "!!set values must be null".to_string(),
                    mark: value_node.start_mark,
                });
            }
        }
        keys.push(pair.key);
    }
    Ok(keys)
}

/// Construct `!!omap`: a sequence of single-pair mappings, in order, with
/// no duplicate keys.
pub fn construct_omap(document: &Document, node_index: i32) -> Result<Vec<NodePair>, ConstructorError> {
    let pairs = construct_ordered_pairs(document, node_index)?;
    let mut seen: Vec<i32> = Vec::with_capacity(pairs.len());
    for pair in &pairs {
        if seen.iter().any(|&k| keys_equal(document, k, pair.key)) {
            return Err(ConstructorError::DuplicateOmapKey {
                mark: document.get_node(pair.key).map(|n| n.start_mark).unwrap_or_default(),
            });
        }
        seen.push(pair.key);
    }
    Ok(pairs)
}

/// Construct `!!pairs`: a sequence of single-pair mappings, duplicate keys
/// permitted.
pub fn construct_pairs(document: &Document, node_index: i32) -> Result<Vec<NodePair>, ConstructorError> {
    construct_ordered_pairs(document, node_index)
}

fn construct_ordered_pairs(
    document: &Document,
    node_index: i32,
) -> Result<Vec<NodePair>, ConstructorError> {
    let Some(node) = document.get_node(node_index) else {
        return Ok(Vec::new());
    };
    let NodeData::Sequence { items, .. } = &node.data else {
        return Err(ConstructorError::Problem {
            problem: "expected a sequence of single-pair mappings".to_string(),
            mark: node.start_mark,
        });
    };
    let mut result = Vec::with_capacity(items.len());
    for &item in items {
        let Some(item_node) = document.get_node(item) else {
            continue;
        };
        let NodeData::Mapping { pairs, .. } = &item_node.data else {
            return Err(ConstructorError::Problem {
                problem: "expected a single-pair mapping".to_string(),
                mark: item_node.start_mark,
            });
        };
        let [pair] = pairs.as_slice() else {
            return Err(ConstructorError::Problem {
                problem: "expected exactly one pair per mapping entry".to_string(),
                mark: item_node.start_mark,
            });
        };
        result.push(*pair);
    }
    Ok(result)
}

fn keys_equal(document: &Document, a: i32, b: i32) -> bool {
    let (Some(a), Some(b)) = (document.get_node(a), document.get_node(b)) else {
        return false;
    };
    match (&a.data, &b.data) {
        (NodeData::Scalar { value: va, .. }, NodeData::Scalar { value: vb, .. }) => {
            a.tag == b.tag && va == vb
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m() -> Mark {
        Mark::default()
    }

    #[test]
    fn constructs_ints() {
        assert_eq!(construct_int("42", m()).unwrap(), 42);
        assert_eq!(construct_int("-1_000", m()).unwrap(), -1000);
        assert_eq!(construct_int("0x1F", m()).unwrap(), 31);
        assert_eq!(construct_int("0b101", m()).unwrap(), 5);
        assert_eq!(construct_int("017", m()).unwrap(), 15);
        assert_eq!(construct_int("1:10", m()).unwrap(), 70);
    }

    #[test]
    fn constructs_floats() {
        assert_eq!(construct_float("3.14", m()).unwrap(), 3.14);
        assert!(construct_float(".inf", m()).unwrap().is_infinite());
        assert!(construct_float(".nan", m()).unwrap().is_nan());
        assert_eq!(construct_float("1:10.5", m()).unwrap(), 70.5);
    }

    #[test]
    fn constructs_bools() {
        assert!(construct_bool("yes", m()).unwrap());
        assert!(!construct_bool("Off", m()).unwrap());
        assert!(construct_bool("maybe", m()).is_err());
    }

    #[test]
    fn constructs_date_only_timestamp() {
        let ts = construct_timestamp("2001-12-15", m()).unwrap();
        assert_eq!(ts.to_rfc3339(), "2001-12-15T00:00:00+00:00");
    }

    #[test]
    fn constructs_full_timestamp_with_zone() {
        let ts = construct_timestamp("2001-12-15T02:59:43.1Z", m()).unwrap();
        assert_eq!(ts.timestamp(), 1008392383);
    }

    #[test]
    fn constructs_timestamp_with_offset() {
        let ts = construct_timestamp("2001-12-14 21:59:43.10 -5", m()).unwrap();
        assert_eq!(ts.timestamp(), 1008392383);
    }

    #[test]
    fn constructs_binary() {
        let decoded = construct_binary("aGVsbG8=", m()).unwrap();
        assert_eq!(decoded, b"hello");
    }
}
