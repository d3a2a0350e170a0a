//! Ordered string parameter container with typed accessors.
//!
//! One shape for query-string, form and path parameters: an ordered
//! multi-map of `String → String`. Keys are case-sensitive; values stay
//! strings until a handler asks for a type.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

/// Why a typed accessor failed.
///
/// A missing key ([`ParamError::NotFound`]) is distinct from a present
/// but unparsable value — the parse variants carry the underlying parser
/// error untouched.
#[derive(Debug, Error)]
pub enum ParamError {
    #[error("parameter `{0}` not found")]
    NotFound(String),
    #[error(transparent)]
    Int(#[from] std::num::ParseIntError),
    #[error(transparent)]
    Float(#[from] std::num::ParseFloatError),
    #[error(transparent)]
    Bool(#[from] std::str::ParseBoolError),
    #[error(transparent)]
    Time(#[from] chrono::ParseError),
}

/// An ordered multi-map of request parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every value stored under `key` with `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.pairs.retain(|(k, _)| *k != key);
        self.pairs.push((key, value.into()));
    }

    /// Adds `value` under `key`, keeping any existing values.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// First value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value stored under `key`, in insertion order.
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// All pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    // ── Typed accessors ───────────────────────────────────────────────────────

    pub fn get_i64(&self, key: &str) -> Result<i64, ParamError> {
        Ok(self.required(key)?.parse::<i64>()?)
    }

    pub fn get_f64(&self, key: &str) -> Result<f64, ParamError> {
        Ok(self.required(key)?.parse::<f64>()?)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ParamError> {
        Ok(self.required(key)?.parse::<bool>()?)
    }

    /// Parses the value with a chrono `strftime` format.
    ///
    /// A date-only format yields midnight of that date.
    pub fn get_time(&self, key: &str, fmt: &str) -> Result<NaiveDateTime, ParamError> {
        let val = self.required(key)?;
        match NaiveDateTime::parse_from_str(val, fmt) {
            Ok(t) => Ok(t),
            Err(_) => Ok(NaiveDate::parse_from_str(val, fmt)?.and_time(NaiveTime::MIN)),
        }
    }

    fn required(&self, key: &str) -> Result<&str, ParamError> {
        self.get(key)
            .ok_or_else(|| ParamError::NotFound(key.to_owned()))
    }

    /// Decodes an `application/x-www-form-urlencoded` byte stream
    /// (request bodies and query strings alike).
    pub(crate) fn from_urlencoded(input: &[u8]) -> Self {
        let mut params = Self::new();
        for (key, value) in url::form_urlencoded::parse(input) {
            params.append(key.into_owned(), value.into_owned());
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Params {
        let mut params = Params::new();
        params.set("stringkey", "a string");
        params.set("intkey", "120");
        params.set("timekey", "2010-01-03");
        params.set("floatkey", "1.33");
        params
    }

    #[test]
    fn typed_accessors_parse_present_values() {
        let params = sample();
        assert_eq!(params.get_i64("intkey").unwrap(), 120);
        assert_eq!(params.get_f64("floatkey").unwrap(), 1.33);
        assert_eq!(params.get("stringkey"), Some("a string"));
    }

    #[test]
    fn time_parsing_honours_the_format() {
        let params = sample();

        // Format without separators does not match the stored value.
        assert!(matches!(
            params.get_time("timekey", "%Y%m%d"),
            Err(ParamError::Time(_))
        ));

        let expected = NaiveDate::from_ymd_opt(2010, 1, 3)
            .unwrap()
            .and_time(NaiveTime::MIN);
        assert_eq!(params.get_time("timekey", "%Y-%m-%d").unwrap(), expected);

        let mut params = Params::new();
        params.set("at", "2010-01-03 04:05:06");
        assert_eq!(
            params.get_time("at", "%Y-%m-%d %H:%M:%S").unwrap(),
            NaiveDate::from_ymd_opt(2010, 1, 3)
                .unwrap()
                .and_hms_opt(4, 5, 6)
                .unwrap()
        );
    }

    #[test]
    fn missing_is_distinguishable_from_unparsable() {
        let mut params = Params::new();
        params.set("n", "not a number");

        assert!(matches!(
            params.get_i64("absent"),
            Err(ParamError::NotFound(_))
        ));
        assert!(matches!(params.get_i64("n"), Err(ParamError::Int(_))));
    }

    #[test]
    fn bool_values() {
        let mut params = Params::new();
        params.set("yes", "true");
        params.set("no", "false");
        params.set("odd", "yes");

        assert!(params.get_bool("yes").unwrap());
        assert!(!params.get_bool("no").unwrap());
        assert!(matches!(params.get_bool("odd"), Err(ParamError::Bool(_))));
    }

    #[test]
    fn set_replaces_append_accumulates() {
        let mut params = Params::new();
        params.append("k", "1");
        params.append("k", "2");
        assert_eq!(params.get("k"), Some("1"));
        assert_eq!(params.get_all("k"), vec!["1", "2"]);

        params.set("k", "3");
        assert_eq!(params.get_all("k"), vec!["3"]);
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn urlencoded_decoding() {
        let params = Params::from_urlencoded(b"a=1&b=two%20words&a=3");
        assert_eq!(params.get("a"), Some("1"));
        assert_eq!(params.get_all("a"), vec!["1", "3"]);
        assert_eq!(params.get("b"), Some("two words"));
        assert_eq!(params.get("absent"), None);
    }
}
