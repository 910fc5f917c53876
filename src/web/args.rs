//! Typed access to query string arguments
//!
//! A numeric argument that does not look like a number falls back to its
//! default rather than failing the request.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

use crate::error::Result;
use crate::web::content::ContentType;

/// Query parameter naming the response encoding
pub const OUTPUT_PARAM: &str = "output";

const TRUTHY: &[&str] = &["true", "1", "t", "y", "yes", "True", "T", "Y", "Yes"];

/// Query arguments of one request
#[derive(Debug, Clone, Default)]
pub struct RequestArgs {
    args: HashMap<String, String>,
}

impl RequestArgs {
    pub fn new(args: HashMap<String, String>) -> Self {
        Self { args }
    }

    /// Raw argument value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.args.get(name).map(String::as_str)
    }

    /// Argument value, or `default` when absent
    pub fn get_argument(&self, name: &str, default: Option<&str>) -> Option<String> {
        self.get(name).or(default).map(str::to_string)
    }

    pub fn get_float_arg(&self, name: &str, default: f64) -> f64 {
        match self.get(name) {
            Some(v) if is_number(v) => v.trim().parse().unwrap_or(default),
            Some(v) => {
                tracing::debug!("Ignoring non-numeric {}={:?}", name, v);
                default
            }
            None => default,
        }
    }

    /// Integer argument. Fractional values are truncated toward zero.
    pub fn get_int_arg(&self, name: &str, default: i64) -> i64 {
        self.get_opt_int_arg(name).unwrap_or(default)
    }

    /// Integer argument with no default
    pub fn get_opt_int_arg(&self, name: &str) -> Option<i64> {
        let v = self.get(name)?;
        if !is_number(v) {
            tracing::debug!("Ignoring non-numeric {}={:?}", name, v);
            return None;
        }
        let v = v.trim();
        v.parse::<i64>().ok().or_else(|| {
            let f: f64 = v.parse().ok()?;
            (f.is_finite() && f.abs() < i64::MAX as f64).then(|| f.trunc() as i64)
        })
    }

    pub fn get_boolean_arg(&self, name: &str, default: bool) -> bool {
        match self.get(name) {
            Some(v) => TRUTHY.contains(&v),
            None => default,
        }
    }

    /// Requested response encoding, JSON unless stated otherwise
    pub fn get_content_type(&self) -> Result<ContentType> {
        ContentType::parse(self.get(OUTPUT_PARAM).unwrap_or("JSON"))
    }
}

/// Whether the whole (trimmed) value is a decimal number, optionally with
/// an exponent
pub fn is_number(value: &str) -> bool {
    lazy_static! {
        static ref NUMBER: Regex =
            Regex::new(r"^[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?$").unwrap();
    }
    NUMBER.is_match(value.trim())
}
