//! Shaping parameter types and query validation.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// The closed set of parameters a client may adjust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKey {
    /// Symmetric rate limit in kbit/s.
    Rate,
    /// Added latency in ms.
    Delay,
    /// Latency variation in ms, only applied together with a delay.
    Jitter,
    /// Packet error rate in percent.
    PacketError,
}

impl ParamKey {
    /// Canonical order, also the order values are validated in.
    pub const ALL: [ParamKey; 4] = [
        ParamKey::Rate,
        ParamKey::Delay,
        ParamKey::Jitter,
        ParamKey::PacketError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKey::Rate => "rate",
            ParamKey::Delay => "delay",
            ParamKey::Jitter => "jitter",
            ParamKey::PacketError => "packet_error",
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParamKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("Unknown shaping parameter: {s}"))
    }
}

/// Full shaping configuration of the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ShapingParameters {
    pub rate: u32,
    pub delay: u32,
    pub jitter: u32,
    pub packet_error: u32,
}

impl ShapingParameters {
    /// Rate applied when nothing else is configured; high enough to be
    /// effectively unshaped.
    pub const DEFAULT_RATE_KBITS: u32 = 80_000;

    pub fn get(&self, key: ParamKey) -> u32 {
        match key {
            ParamKey::Rate => self.rate,
            ParamKey::Delay => self.delay,
            ParamKey::Jitter => self.jitter,
            ParamKey::PacketError => self.packet_error,
        }
    }

    pub fn set(&mut self, key: ParamKey, value: u32) {
        match key {
            ParamKey::Rate => self.rate = value,
            ParamKey::Delay => self.delay = value,
            ParamKey::Jitter => self.jitter = value,
            ParamKey::PacketError => self.packet_error = value,
        }
    }
}

impl Default for ShapingParameters {
    fn default() -> Self {
        Self {
            rate: Self::DEFAULT_RATE_KBITS,
            delay: 0,
            jitter: 0,
            packet_error: 0,
        }
    }
}

/// A recognized parameter whose value is not a non-negative integer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{key} Value Error")]
pub struct ValidationError {
    pub key: ParamKey,
    pub value: String,
}

/// Pick the recognized keys out of a query, in canonical order.
///
/// Unknown keys are dropped. A repeated key keeps its first value.
pub fn recognized<'q>(query: &'q [(String, String)]) -> Vec<(ParamKey, &'q str)> {
    ParamKey::ALL
        .into_iter()
        .filter_map(|key| {
            query
                .iter()
                .find(|(name, _)| name == key.as_str())
                .map(|(_, value)| (key, value.as_str()))
        })
        .collect()
}

/// Parse every recognized value, stopping at the first bad one.
pub fn parse_values(requested: &[(ParamKey, &str)]) -> Result<Vec<(ParamKey, u32)>, ValidationError> {
    requested
        .iter()
        .map(|&(key, raw)| {
            raw.trim()
                .parse::<u32>()
                .map(|value| (key, value))
                .map_err(|_| ValidationError {
                    key,
                    value: raw.to_string(),
                })
        })
        .collect()
}
