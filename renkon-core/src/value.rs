//! [`BoxedValue`], the tagged-union value used to carry action and scenario
//! configuration in a codec-agnostic way, plus the `ToBoxed`/`FromBoxed`
//! round-trip contract every configurable type implements.

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// The universal configuration/data carrier.
///
/// `Dict` uses a `BTreeMap` rather than a `HashMap` so that key order is
/// always sorted: this is what makes [`ActionConfiguration`]
/// (crate::action::ActionConfiguration) structural equality and the
/// canonical-JSON encoding of un-boxed Codable types (see
/// [`to_boxed_canonical`]) both deterministic.
#[derive(Debug, Clone, PartialEq)]
pub enum BoxedValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<BoxedValue>),
    Dict(BTreeMap<String, BoxedValue>),
}

impl From<&str> for BoxedValue {
    fn from(value: &str) -> Self {
        BoxedValue::String(value.to_string())
    }
}

impl From<i64> for BoxedValue {
    fn from(value: i64) -> Self {
        BoxedValue::Int(value)
    }
}

impl From<bool> for BoxedValue {
    fn from(value: bool) -> Self {
        BoxedValue::Bool(value)
    }
}

impl fmt::Display for BoxedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoxedValue::Null => write!(f, "null"),
            BoxedValue::Bool(b) => write!(f, "{b}"),
            BoxedValue::Int(i) => write!(f, "{i}"),
            BoxedValue::Float(v) => write!(f, "{v}"),
            BoxedValue::Double(v) => write!(f, "{v}"),
            BoxedValue::String(s) => write!(f, "{s:?}"),
            BoxedValue::Bytes(b) => write!(f, "bytes[{}]", b.len()),
            BoxedValue::Array(a) => write!(f, "array[{}]", a.len()),
            BoxedValue::Dict(d) => write!(f, "dict[{}]", d.len()),
        }
    }
}

/// Converts a Rust value into its [`BoxedValue`] representation.
pub trait ToBoxed {
    fn to_boxed(&self) -> BoxedValue;
}

/// Recovers a Rust value from an (optionally absent) [`BoxedValue`].
///
/// `value` is `None` when the key was absent from the surrounding dict;
/// `Some(&BoxedValue::Null)` when the key was present but explicitly null.
/// Implementations must return `None` (a miss, never a panic or truncation)
/// when the value is present but cannot be converted: this is what lets
/// narrower integer widths reject out-of-range values safely.
pub trait FromBoxed: Sized {
    fn from_boxed(value: Option<&BoxedValue>) -> Option<Self>;
}

impl ToBoxed for BoxedValue {
    fn to_boxed(&self) -> BoxedValue {
        self.clone()
    }
}

impl FromBoxed for BoxedValue {
    fn from_boxed(value: Option<&BoxedValue>) -> Option<Self> {
        value.cloned()
    }
}

impl ToBoxed for bool {
    fn to_boxed(&self) -> BoxedValue {
        BoxedValue::Bool(*self)
    }
}

impl FromBoxed for bool {
    fn from_boxed(value: Option<&BoxedValue>) -> Option<Self> {
        match value {
            Some(BoxedValue::Bool(b)) => Some(*b),
            Some(BoxedValue::Int(i)) => Some(*i != 0),
            Some(BoxedValue::String(s)) => match s.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl ToBoxed for String {
    fn to_boxed(&self) -> BoxedValue {
        BoxedValue::String(self.clone())
    }
}

impl FromBoxed for String {
    fn from_boxed(value: Option<&BoxedValue>) -> Option<Self> {
        match value {
            Some(BoxedValue::String(s)) => Some(s.clone()),
            _ => None,
        }
    }
}

impl ToBoxed for Vec<u8> {
    fn to_boxed(&self) -> BoxedValue {
        BoxedValue::Bytes(self.clone())
    }
}

impl FromBoxed for Vec<u8> {
    fn from_boxed(value: Option<&BoxedValue>) -> Option<Self> {
        match value {
            Some(BoxedValue::Bytes(b)) => Some(b.clone()),
            _ => None,
        }
    }
}

impl ToBoxed for f64 {
    fn to_boxed(&self) -> BoxedValue {
        BoxedValue::Double(*self)
    }
}

impl FromBoxed for f64 {
    fn from_boxed(value: Option<&BoxedValue>) -> Option<Self> {
        match value {
            Some(BoxedValue::Double(v)) => Some(*v),
            Some(BoxedValue::Float(v)) => Some(f64::from(*v)),
            Some(BoxedValue::Int(i)) => Some(*i as f64),
            _ => None,
        }
    }
}

impl ToBoxed for f32 {
    fn to_boxed(&self) -> BoxedValue {
        BoxedValue::Float(*self)
    }
}

impl FromBoxed for f32 {
    fn from_boxed(value: Option<&BoxedValue>) -> Option<Self> {
        match value {
            Some(BoxedValue::Float(v)) => Some(*v),
            Some(BoxedValue::Double(v)) => Some(*v as f32),
            Some(BoxedValue::Int(i)) => Some(*i as f32),
            _ => None,
        }
    }
}

/// Implements `ToBoxed`/`FromBoxed` for a signed or unsigned integer width
/// narrower than 64 bits. Out-of-range values on unbox are a miss, never a
/// silent truncation, per `spec.md` §4.2.
macro_rules! narrow_int {
    ($ty:ty) => {
        impl ToBoxed for $ty {
            fn to_boxed(&self) -> BoxedValue {
                BoxedValue::Int(i64::from(*self))
            }
        }

        impl FromBoxed for $ty {
            fn from_boxed(value: Option<&BoxedValue>) -> Option<Self> {
                match value {
                    Some(BoxedValue::Int(i)) => <$ty>::try_from(*i).ok(),
                    _ => None,
                }
            }
        }
    };
}

narrow_int!(i8);
narrow_int!(i16);
narrow_int!(i32);
narrow_int!(u8);
narrow_int!(u16);
narrow_int!(u32);

impl ToBoxed for i64 {
    fn to_boxed(&self) -> BoxedValue {
        BoxedValue::Int(*self)
    }
}

impl FromBoxed for i64 {
    fn from_boxed(value: Option<&BoxedValue>) -> Option<Self> {
        match value {
            Some(BoxedValue::Int(i)) => Some(*i),
            _ => None,
        }
    }
}

impl ToBoxed for u64 {
    fn to_boxed(&self) -> BoxedValue {
        // u64 values beyond i64::MAX cannot round-trip through the signed
        // Int arm; those are out of scope for this mock-server value carrier.
        BoxedValue::Int(i64::try_from(*self).unwrap_or(i64::MAX))
    }
}

impl FromBoxed for u64 {
    fn from_boxed(value: Option<&BoxedValue>) -> Option<Self> {
        match value {
            Some(BoxedValue::Int(i)) => u64::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl<T: ToBoxed> ToBoxed for Option<T> {
    fn to_boxed(&self) -> BoxedValue {
        match self {
            Some(v) => v.to_boxed(),
            None => BoxedValue::Null,
        }
    }
}

impl<T: FromBoxed> FromBoxed for Option<T> {
    fn from_boxed(value: Option<&BoxedValue>) -> Option<Self> {
        match value {
            None | Some(BoxedValue::Null) => Some(None),
            Some(v) => T::from_boxed(Some(v)).map(Some),
        }
    }
}

impl<T: ToBoxed> ToBoxed for Vec<T> {
    fn to_boxed(&self) -> BoxedValue {
        BoxedValue::Array(self.iter().map(ToBoxed::to_boxed).collect())
    }
}

impl<T: FromBoxed> FromBoxed for Vec<T> {
    fn from_boxed(value: Option<&BoxedValue>) -> Option<Self> {
        match value {
            Some(BoxedValue::Array(items)) => {
                items.iter().map(|v| T::from_boxed(Some(v))).collect()
            }
            _ => None,
        }
    }
}

impl<T: ToBoxed> ToBoxed for BTreeMap<String, T> {
    fn to_boxed(&self) -> BoxedValue {
        BoxedValue::Dict(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_boxed()))
                .collect(),
        )
    }
}

impl<T: FromBoxed> FromBoxed for BTreeMap<String, T> {
    fn from_boxed(value: Option<&BoxedValue>) -> Option<Self> {
        match value {
            Some(BoxedValue::Dict(map)) => map
                .iter()
                .map(|(k, v)| T::from_boxed(Some(v)).map(|v| (k.clone(), v)))
                .collect(),
            _ => None,
        }
    }
}

/// A UTC timestamp, round-tripping through RFC 3339 / ISO-8601 strings.
///
/// Stored as `(seconds since epoch, nanoseconds)` rather than pulling in a
/// calendar crate, consistent with `spec.md`'s exclusion of arbitrary-
/// precision duration/date arithmetic from this crate's scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    pub fn from_unix(seconds: i64, nanos: u32) -> Self {
        Self { seconds, nanos }
    }

    /// Render as an ISO-8601 / RFC 3339 UTC string, e.g. `1970-01-01T00:00:01.5Z`.
    pub fn to_iso8601(&self) -> String {
        let days = self.seconds.div_euclid(86_400);
        let secs_of_day = self.seconds.rem_euclid(86_400);
        let (y, m, d) = civil_from_days(days);
        let hh = secs_of_day / 3600;
        let mm = (secs_of_day % 3600) / 60;
        let ss = secs_of_day % 60;
        if self.nanos == 0 {
            format!("{y:04}-{m:02}-{d:02}T{hh:02}:{mm:02}:{ss:02}Z")
        } else {
            format!(
                "{y:04}-{m:02}-{d:02}T{hh:02}:{mm:02}:{ss:02}.{:09}Z",
                self.nanos
            )
        }
    }

    /// Parse an ISO-8601 / RFC 3339 UTC string produced by [`to_iso8601`](Self::to_iso8601).
    pub fn parse_iso8601(s: &str) -> Option<Self> {
        let s = s.strip_suffix('Z')?;
        let (date, time) = s.split_once('T')?;
        let mut date_parts = date.splitn(3, '-');
        let y: i64 = date_parts.next()?.parse().ok()?;
        let m: i64 = date_parts.next()?.parse().ok()?;
        let d: i64 = date_parts.next()?.parse().ok()?;

        let (time, nanos) = match time.split_once('.') {
            Some((t, frac)) => {
                let padded = format!("{frac:0<9}");
                (t, padded[..9].parse().ok()?)
            }
            None => (time, 0u32),
        };
        let mut time_parts = time.splitn(3, ':');
        let hh: i64 = time_parts.next()?.parse().ok()?;
        let mm: i64 = time_parts.next()?.parse().ok()?;
        let ss: i64 = time_parts.next()?.parse().ok()?;

        let days = days_from_civil(y, m, d);
        let seconds = days * 86_400 + hh * 3600 + mm * 60 + ss;
        Some(Self { seconds, nanos })
    }
}

/// Howard Hinnant's civil-from-days algorithm (proleptic Gregorian calendar).
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u64;
    let mp = if m > 2 { m - 3 } else { m + 9 } as u64;
    let doy = (153 * mp + 2) / 5 + d as u64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe as i64 - 719_468
}

impl ToBoxed for Timestamp {
    fn to_boxed(&self) -> BoxedValue {
        BoxedValue::String(self.to_iso8601())
    }
}

impl FromBoxed for Timestamp {
    fn from_boxed(value: Option<&BoxedValue>) -> Option<Self> {
        match value {
            Some(BoxedValue::String(s)) => Timestamp::parse_iso8601(s),
            _ => None,
        }
    }
}

/// An absolute URL, round-tripping through its string form.
///
/// Stored as the validated string itself rather than a parsed scheme/host/
/// path breakdown: Renkon never inspects URL structure, only carries it
/// opaquely between configuration and action execution, so there is nothing
/// for a richer representation to buy here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url(String);

impl Url {
    /// Parse an absolute URL string. Rejects anything without a `scheme://`
    /// or `scheme:` prefix, since a relative path is not a URL.
    pub fn parse(s: impl Into<String>) -> Option<Self> {
        let s = s.into();
        let scheme_end = s.find(':')?;
        let scheme = &s[..scheme_end];
        if scheme.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
        {
            return None;
        }
        Some(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToBoxed for Url {
    fn to_boxed(&self) -> BoxedValue {
        BoxedValue::String(self.0.clone())
    }
}

impl FromBoxed for Url {
    fn from_boxed(value: Option<&BoxedValue>) -> Option<Self> {
        match value {
            Some(BoxedValue::String(s)) => Url::parse(s.clone()),
            _ => None,
        }
    }
}

/// Encode any `Serialize` type as a `BoxedValue::Bytes` holding canonical
/// (sorted-key) JSON: the fallback path for Codable structures without a
/// native boxed representation. Stable serialization is required here
/// because [`ActionConfiguration`](crate::action::ActionConfiguration)
/// equality depends on byte-for-byte reproducibility.
pub fn to_boxed_canonical<T: Serialize>(value: &T) -> Result<BoxedValue, serde_json::Error> {
    // `serde_json::Map`'s default (non-`preserve_order`) backing store is a
    // `BTreeMap`, so keys come out sorted, but only once the value has
    // actually landed in a `Value::Object`: serializing `T` straight to
    // bytes would emit its fields in declaration order instead, since that
    // path never goes through `Map` at all. Routing through `to_value`
    // first is what makes the sort apply.
    let value = serde_json::to_value(value)?;
    let bytes = serde_json::to_vec(&value)?;
    Ok(BoxedValue::Bytes(bytes))
}

/// Decode a value previously produced by [`to_boxed_canonical`].
pub fn from_boxed_canonical<T: DeserializeOwned>(value: &BoxedValue) -> Option<T> {
    match value {
        BoxedValue::Bytes(bytes) => serde_json::from_slice(bytes).ok(),
        _ => None,
    }
}

/// Render a `BoxedValue` as the smallest equivalent `serde_json::Value` for
/// its tag (`bytes` as base64, `dict` keys already sorted via `BTreeMap`).
pub fn to_json(value: &BoxedValue) -> serde_json::Value {
    match value {
        BoxedValue::Null => serde_json::Value::Null,
        BoxedValue::Bool(b) => serde_json::Value::Bool(*b),
        BoxedValue::Int(i) => serde_json::Value::from(*i),
        BoxedValue::Float(v) => serde_json::Number::from_f64(f64::from(*v))
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        BoxedValue::Double(v) => serde_json::Number::from_f64(*v)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        BoxedValue::String(s) => serde_json::Value::String(s.clone()),
        BoxedValue::Bytes(b) => {
            serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(b))
        }
        BoxedValue::Array(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        BoxedValue::Dict(map) => {
            let obj: serde_json::Map<String, serde_json::Value> =
                map.iter().map(|(k, v)| (k.clone(), to_json(v))).collect();
            serde_json::Value::Object(obj)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: ToBoxed + FromBoxed + PartialEq + std::fmt::Debug>(value: T) {
        let boxed = value.to_boxed();
        let back = T::from_boxed(Some(&boxed)).expect("round trip must succeed");
        assert_eq!(value, back);
    }

    #[test]
    fn bool_round_trips() {
        round_trip(true);
        round_trip(false);
    }

    #[test]
    fn string_round_trips() {
        round_trip("hello".to_string());
    }

    #[test]
    fn bytes_round_trip() {
        round_trip(vec![1u8, 2, 3]);
    }

    #[test]
    fn numeric_widths_round_trip() {
        round_trip(42i8);
        round_trip(1000i16);
        round_trip(70_000i32);
        round_trip(9_000_000_000i64);
        round_trip(200u8);
        round_trip(3.5f32);
        round_trip(3.14159f64);
    }

    #[test]
    fn narrow_int_overflow_is_a_miss_not_truncation() {
        let too_big = BoxedValue::Int(1000);
        assert_eq!(u8::from_boxed(Some(&too_big)), None);
    }

    #[test]
    fn option_round_trips_both_arms() {
        round_trip(Some(5i32));
        round_trip(None::<i32>);
    }

    #[test]
    fn vec_round_trips() {
        round_trip(vec![1i32, 2, 3]);
    }

    #[test]
    fn dict_round_trips() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), 1i32);
        map.insert("b".to_string(), 2i32);
        round_trip(map);
    }

    #[test]
    fn bool_coercion_rules() {
        assert_eq!(bool::from_boxed(Some(&BoxedValue::Int(0))), Some(false));
        assert_eq!(bool::from_boxed(Some(&BoxedValue::Int(7))), Some(true));
        assert_eq!(
            bool::from_boxed(Some(&BoxedValue::String("TRUE".into()))),
            Some(true)
        );
        assert_eq!(
            bool::from_boxed(Some(&BoxedValue::String("1".into()))),
            Some(true)
        );
        assert_eq!(
            bool::from_boxed(Some(&BoxedValue::String("nah".into()))),
            None
        );
    }

    #[test]
    fn timestamp_round_trips_iso8601() {
        let ts = Timestamp::from_unix(1_700_000_000, 0);
        let s = ts.to_iso8601();
        let back = Timestamp::parse_iso8601(&s).unwrap();
        assert_eq!(ts, back);
        round_trip(ts);
    }

    #[test]
    fn url_round_trips_its_absolute_string_form() {
        round_trip(Url::parse("https://example.com/accounts?id=1").unwrap());
    }

    #[test]
    fn url_rejects_relative_paths() {
        assert!(Url::parse("/accounts").is_none());
    }

    #[test]
    fn canonical_json_round_trips_and_sorts_keys() {
        #[derive(Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Demo {
            b: i32,
            a: i32,
        }
        let demo = Demo { b: 2, a: 1 };
        let boxed = to_boxed_canonical(&demo).unwrap();
        if let BoxedValue::Bytes(bytes) = &boxed {
            let text = String::from_utf8(bytes.clone()).unwrap();
            assert!(text.find("\"a\"").unwrap() < text.find("\"b\"").unwrap());
        } else {
            panic!("expected bytes");
        }
        let back: Demo = from_boxed_canonical(&boxed).unwrap();
        assert_eq!(demo, back);
    }
}
