//! Absent values are `None` inside the crate and `.` in every file, table and
//! JSON document it writes. Use as `#[serde(with = "crate::sentinel")]`.

use serde::{de, Deserialize, Deserializer, Serializer};
use std::{fmt::Display, str::FromStr};

pub const SENTINEL: &str = ".";

pub fn text<T: Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map_or_else(|| SENTINEL.to_string(), ToString::to_string)
}

pub fn parse<T: FromStr>(raw: &str) -> Result<Option<T>, T::Err> {
    if raw == SENTINEL {
        Ok(None)
    } else {
        raw.parse().map(Some)
    }
}

pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Display,
    S: Serializer,
{
    serializer.serialize_str(&text(value))
}

pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: FromStr,
    T::Err: Display,
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(de::Error::custom)
}
