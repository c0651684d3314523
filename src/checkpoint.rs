//! Textual checkpoint format.
//!
//! A checkpoint is a set of `Key=Value` records, one per line and one per
//! controller. A controller's value is itself a list of `field=value` pairs
//! joined by [`FIELD_SEP`]; repeated values inside a field are joined by
//! [`LIST_SEP`] and vector components by [`COMPONENT_SEP`]. Booleans are
//! `1`/`0`, enums their integer discriminant. Text is percent-escaped so it
//! can never collide with a separator.
//!
//! Reading never fails: a missing or malformed field yields its zero value.

use std::collections::HashMap;
use std::fmt::Display;

use nalgebra::Vector3;

pub const FIELD_SEP: &str = ";";
pub const LIST_SEP: &str = "|";
pub const COMPONENT_SEP: &str = ",";
pub const KEY_SEP: &str = "=";

const RESERVED: [char; 7] = ['%', ';', '|', '=', ',', '\n', '\r'];

/// State that survives process suspension as a single value string.
pub trait Checkpoint: Sized {
    fn save(&self) -> String;

    /// Rebuild from a saved value. Missing fields take their defaults.
    fn load(value: &str) -> Self;
}

// ---------------------------------------------------------------------------
// Escaping
// ---------------------------------------------------------------------------

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if RESERVED.contains(&c) {
            out.push_str(&format!("%{:02X}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let hex: String = chars.by_ref().take(2).collect();
        match u8::from_str_radix(&hex, 16) {
            Ok(b) => out.push(b as char),
            Err(_) => {
                out.push('%');
                out.push_str(&hex);
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Builds one controller's value string.
#[derive(Debug, Default)]
pub struct FieldWriter {
    parts: Vec<String>,
}

impl FieldWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, key: &str, value: String) -> &mut Self {
        self.parts.push(format!("{}{}{}", key, KEY_SEP, value));
        self
    }

    /// Any number: floats use their shortest round-trip form.
    pub fn num<T: Display>(&mut self, key: &str, value: T) -> &mut Self {
        self.push(key, value.to_string())
    }

    /// Written only when present.
    pub fn opt_num<T: Display>(&mut self, key: &str, value: Option<T>) -> &mut Self {
        match value {
            Some(v) => self.num(key, v),
            None => self,
        }
    }

    pub fn flag(&mut self, key: &str, value: bool) -> &mut Self {
        self.push(key, if value { "1" } else { "0" }.to_string())
    }

    pub fn vector(&mut self, key: &str, v: &Vector3<f64>) -> &mut Self {
        self.push(key, encode_vector(v))
    }

    pub fn vectors(&mut self, key: &str, vs: &[Vector3<f64>]) -> &mut Self {
        let joined = vs
            .iter()
            .map(encode_vector)
            .collect::<Vec<_>>()
            .join(LIST_SEP);
        self.push(key, joined)
    }

    /// Written only when present.
    pub fn text(&mut self, key: &str, value: Option<&str>) -> &mut Self {
        match value {
            Some(t) => self.push(key, escape(t)),
            None => self,
        }
    }

    pub fn finish(&self) -> String {
        self.parts.join(FIELD_SEP)
    }
}

fn encode_vector(v: &Vector3<f64>) -> String {
    format!("{}{sep}{}{sep}{}", v.x, v.y, v.z, sep = COMPONENT_SEP)
}

fn decode_vector(s: &str) -> Option<Vector3<f64>> {
    let mut it = s.split(COMPONENT_SEP).map(|c| c.trim().parse::<f64>());
    match (it.next(), it.next(), it.next(), it.next()) {
        (Some(Ok(x)), Some(Ok(y)), Some(Ok(z)), None) => Some(Vector3::new(x, y, z)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Parsed view of one controller's value string.
#[derive(Debug, Default)]
pub struct Fields<'a> {
    map: HashMap<&'a str, &'a str>,
}

impl<'a> Fields<'a> {
    pub fn parse(value: &'a str) -> Self {
        let map = value
            .split(FIELD_SEP)
            .filter_map(|pair| pair.split_once(KEY_SEP))
            .map(|(k, v)| (k.trim(), v))
            .collect();
        Self { map }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn has(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn opt_f64(&self, key: &str) -> Option<f64> {
        self.map.get(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn f64(&self, key: &str) -> f64 {
        self.opt_f64(key).unwrap_or(0.0)
    }

    pub fn usize(&self, key: &str) -> usize {
        self.map.get(key).and_then(|v| v.trim().parse().ok()).unwrap_or(0)
    }

    pub fn u32(&self, key: &str) -> u32 {
        self.map.get(key).and_then(|v| v.trim().parse().ok()).unwrap_or(0)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.map.get(key).map(|v| v.trim() == "1").unwrap_or(false)
    }

    pub fn vector(&self, key: &str) -> Vector3<f64> {
        self.map.get(key).and_then(|v| decode_vector(v)).unwrap_or_else(Vector3::zeros)
    }

    /// Malformed entries are skipped.
    pub fn vectors(&self, key: &str) -> Vec<Vector3<f64>> {
        match self.map.get(key) {
            Some(v) if !v.is_empty() => v.split(LIST_SEP).filter_map(decode_vector).collect(),
            _ => Vec::new(),
        }
    }

    /// Missing or empty text reads as `None`.
    pub fn text(&self, key: &str) -> Option<String> {
        self.map
            .get(key)
            .map(|v| unescape(v))
            .filter(|t| !t.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Join `Key=Value` records, one per line.
pub fn write_records(records: &[(&str, String)]) -> String {
    records
        .iter()
        .map(|(k, v)| format!("{}{}{}", k, KEY_SEP, v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split `Key=Value` lines. Lines without a key separator are ignored.
pub fn read_records(text: &str) -> HashMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once(KEY_SEP))
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_covers_every_separator() {
        let raw = "GO;TO|A=B,C%\nD";
        let escaped = escape(raw);
        assert!(!escaped.contains([';', '|', '=', ',', '\n']));
        assert_eq!(unescape(&escaped), raw);
    }

    #[test]
    fn fields_round_trip() {
        let mut w = FieldWriter::new();
        w.num("phase", 3)
            .num("speed", 0.1 + 0.2)
            .flag("landing", true)
            .vector("origin", &Vector3::new(1.5, -2.25, 1e-9))
            .vectors("route", &[Vector3::new(1.0, 2.0, 3.0), Vector3::new(-4.0, 5.0, 6.5)])
            .text("token", Some("DOCK;NOW"));
        let saved = w.finish();

        let f = Fields::parse(&saved);
        assert_eq!(f.u32("phase"), 3);
        assert_eq!(f.f64("speed"), 0.1 + 0.2);
        assert!(f.flag("landing"));
        assert_eq!(f.vector("origin"), Vector3::new(1.5, -2.25, 1e-9));
        assert_eq!(f.vectors("route").len(), 2);
        assert_eq!(f.text("token").as_deref(), Some("DOCK;NOW"));
    }

    #[test]
    fn missing_and_malformed_default() {
        let f = Fields::parse("phase=x;origin=1,2;route=1,2,3|bad|4,5,6;garbage");
        assert_eq!(f.u32("phase"), 0);
        assert_eq!(f.vector("origin"), Vector3::zeros());
        assert_eq!(f.vectors("route"), vec![Vector3::new(1.0, 2.0, 3.0), Vector3::new(4.0, 5.0, 6.0)]);
        assert!(!f.flag("landing"));
        assert_eq!(f.opt_f64("timer"), None);
        assert_eq!(f.text("token"), None);
    }

    #[test]
    fn records_split_on_first_separator() {
        let text = write_records(&[("Cruise", "phase=1;index=0".into()), ("Align", String::new())]);
        let records = read_records(&text);
        assert_eq!(records["Cruise"], "phase=1;index=0");
        assert_eq!(records["Align"], "");
    }
}
