//! Canonical, comparison-stable form for result rows.
//!
//! Stored expectations were produced with this exact canonicalization, so the
//! float rounding rule below must not drift: two decimals, ties away from zero.

use crate::model::{Cell, RawRow, Row};
use chrono::SecondsFormat;
use serde_json::{Number, Value};

/// Largest integer a JSON number round-trips exactly through an IEEE double.
const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// Floats at or beyond this magnitude are not rounded.
const FIXED_LIMIT: f64 = 1e21;

pub fn normalize(rows: &[RawRow]) -> Vec<Row> {
    rows.iter().map(normalize_row).collect()
}

pub fn normalize_row(row: &RawRow) -> Row {
    // BTreeMap keeps keys sorted, which is the stable column order.
    row.iter()
        .map(|(k, v)| (k.clone(), normalize_cell(v)))
        .collect()
}

pub fn normalize_cell(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Bool(b) => Value::Bool(*b),
        Cell::Integer(i) => {
            if i.unsigned_abs() > MAX_SAFE_INTEGER as u64 {
                Value::String(i.to_string())
            } else {
                Value::Number(Number::from(*i))
            }
        }
        Cell::Real(f) => float_value(round_to_cents(*f)),
        Cell::Text(s) => Value::String(s.clone()),
        Cell::Blob(b) => Value::String(hex::encode(b)),
        Cell::Timestamp(ts) => Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
        Cell::Json(v) => v.clone(),
    }
}

/// Rounds to two decimals the way `Number(x.toFixed(2))` does: the nearest
/// two-decimal value to the exact binary value, picking the larger magnitude
/// on an exact tie.
pub fn round_to_cents(x: f64) -> f64 {
    if !x.is_finite() || x.abs() >= FIXED_LIMIT {
        return x;
    }
    let magnitude = x.abs();

    // An exact tie at the third decimal is only possible for odd multiples of 1/8.
    let eighths = magnitude.fract() * 8.0;
    let is_tie = eighths.fract() == 0.0 && (eighths as u8) % 2 == 1;

    let rounded = if is_tie {
        (magnitude * 100.0).ceil() / 100.0
    } else {
        format!("{magnitude:.2}").parse().unwrap_or(magnitude)
    };

    if x.is_sign_negative() {
        -rounded
    } else {
        rounded
    }
}

fn float_value(f: f64) -> Value {
    if !f.is_finite() {
        return Value::Null;
    }
    if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER as f64 {
        return Value::Number(Number::from(f as i64));
    }
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

/// Serialized (key-sorted, compact JSON) form of one normalized row.
pub fn canonical_form(row: &Row) -> String {
    serde_json::to_string(row).unwrap_or_default()
}

/// Orders rows by their serialized form so multiset comparison is reproducible.
pub fn sort_for_comparison(rows: &[Row]) -> Vec<Row> {
    let mut out = rows.to_vec();
    out.sort_by_cached_key(canonical_form);
    out
}

/// Order-sensitive equality on the serialized forms.
pub fn same_sequence(a: &[Row], b: &[Row]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| canonical_form(x) == canonical_form(y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn raw(pairs: &[(&str, Cell)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_float_noise_is_stabilized() {
        let v = normalize_cell(&Cell::Real(0.1 + 0.2));
        assert_eq!(v, json!(0.3));
        assert_eq!(canonical_form(&Row::from([("x".to_string(), v)])), r#"{"x":0.3}"#);
    }

    #[test]
    fn test_rounding_matches_fixed_two_decimals() {
        assert_eq!(round_to_cents(1.005), 1.0); // 1.00499999... in binary
        assert_eq!(round_to_cents(0.125), 0.13);
        assert_eq!(round_to_cents(2.675), 2.67);
        assert_eq!(round_to_cents(-0.125), -0.13);
        assert_eq!(round_to_cents(3.14159), 3.14);
        assert_eq!(round_to_cents(1e22), 1e22);
    }

    #[test]
    fn test_integral_floats_compare_as_integers() {
        assert_eq!(normalize_cell(&Cell::Real(150.0)), json!(150));
        assert_eq!(normalize_cell(&Cell::Real(149.999)), json!(150));
        assert_eq!(normalize_cell(&Cell::Real(-0.001)), json!(0));
        assert_eq!(normalize_cell(&Cell::Integer(150)), json!(150));
    }

    #[test]
    fn test_non_finite_floats_become_null() {
        assert_eq!(normalize_cell(&Cell::Real(f64::INFINITY)), Value::Null);
        assert_eq!(normalize_cell(&Cell::Real(f64::NAN)), Value::Null);
    }

    #[test]
    fn test_large_integers_render_as_strings() {
        assert_eq!(
            normalize_cell(&Cell::Integer(9_007_199_254_740_993)),
            json!("9007199254740993")
        );
        assert_eq!(
            normalize_cell(&Cell::Integer(9_007_199_254_740_991)),
            json!(9_007_199_254_740_991_i64)
        );
        assert_eq!(normalize_cell(&Cell::Integer(i64::MIN)), json!(i64::MIN.to_string()));
    }

    #[test]
    fn test_expected_integer_beyond_i64_keeps_every_digit() {
        let cell = Cell::from(json!(18_446_744_073_709_551_615_u64));
        assert_eq!(cell, Cell::Text("18446744073709551615".into()));
        assert_eq!(normalize_cell(&cell), json!("18446744073709551615"));

        // and compares equal to the engine-side rendering of the same digits
        let engine = Cell::Text("18446744073709551615".into());
        assert_eq!(normalize_cell(&engine), normalize_cell(&cell));
    }

    #[test]
    fn test_temporal_blob_and_passthrough() {
        let ts = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(
            normalize_cell(&Cell::Timestamp(ts)),
            json!("2024-03-01T12:30:00.000Z")
        );
        assert_eq!(normalize_cell(&Cell::Blob(vec![0xde, 0xad])), json!("dead"));
        assert_eq!(normalize_cell(&Cell::Null), Value::Null);
        assert_eq!(normalize_cell(&Cell::Bool(true)), json!(true));
        assert_eq!(normalize_cell(&Cell::Text("x".into())), json!("x"));
    }

    #[test]
    fn test_keys_are_sorted() {
        let row = raw(&[("b", Cell::Integer(2)), ("a", Cell::Integer(1))]);
        assert_eq!(canonical_form(&normalize_row(&row)), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn test_sort_for_comparison_is_permutation_invariant() {
        let rows = vec![
            raw(&[("id", Cell::Integer(2)), ("name", Cell::Text("b".into()))]),
            raw(&[("id", Cell::Integer(1)), ("name", Cell::Text("a".into()))]),
            raw(&[("id", Cell::Integer(3)), ("name", Cell::Null)]),
            raw(&[("id", Cell::Integer(1)), ("name", Cell::Text("a".into()))]),
        ];
        let baseline = sort_for_comparison(&normalize(&rows));

        let mut perm = rows.clone();
        perm.reverse();
        assert_eq!(sort_for_comparison(&normalize(&perm)), baseline);

        perm.rotate_left(1);
        assert_eq!(sort_for_comparison(&normalize(&perm)), baseline);
    }

    #[test]
    fn test_same_sequence_is_order_sensitive() {
        let a = normalize(&[
            raw(&[("id", Cell::Integer(1))]),
            raw(&[("id", Cell::Integer(2))]),
        ]);
        let mut b = a.clone();
        assert!(same_sequence(&a, &b));
        b.reverse();
        assert!(!same_sequence(&a, &b));
        assert!(!same_sequence(&a, &a[..1]));
    }
}
