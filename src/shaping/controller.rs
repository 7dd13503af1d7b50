//! Shaping Controller - owns the live shaping configuration.
//!
//! Every read-modify-write of the parameters, and the command sequence that
//! follows it, happens under a single lock.

use std::fmt;

use parking_lot::Mutex;

use crate::shaping::params::{parse_values, recognized};
use crate::shaping::{ParamKey, ShapingParameters, ValidationError, Wondershaper};

/// Values echoed back for an accepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapingAck {
    /// Requested keys with their now-current values.
    pub values: Vec<(ParamKey, u32)>,
    /// Whether the shaper was re-applied.
    pub applied: bool,
}

impl fmt::Display for ShapingAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.values {
            writeln!(f, "{key}={value}")?;
        }
        writeln!(f)
    }
}

/// Holds the authoritative shaping parameters and applies them.
#[derive(Debug)]
pub struct ShapingController {
    params: Mutex<ShapingParameters>,
    shaper: Wondershaper,
}

impl ShapingController {
    /// Create a controller and apply `initial` right away.
    ///
    /// Whatever shaping the interface carried before is cleared.
    pub fn new(shaper: Wondershaper, initial: ShapingParameters) -> Self {
        tracing::info!(
            interface = %shaper.interface(),
            program = %shaper.program().display(),
            rate = initial.rate,
            delay = initial.delay,
            jitter = initial.jitter,
            packet_error = initial.packet_error,
            "Initializing traffic shaping"
        );
        shaper.apply(&initial);

        Self {
            params: Mutex::new(initial),
            shaper,
        }
    }

    /// Snapshot of the current parameters.
    pub fn current(&self) -> ShapingParameters {
        *self.params.lock()
    }

    /// Validate and apply the recognized parameters of a query.
    ///
    /// Nothing changes unless every recognized value parses. The shaper runs
    /// at most once, and only when a value actually differs.
    pub fn handle_request(&self, query: &[(String, String)]) -> Result<ShapingAck, ValidationError> {
        let requested = recognized(query);
        let parsed = parse_values(&requested).inspect_err(|e| {
            tracing::error!(key = %e.key, value = %e.value, "Invalid shaping parameter");
        })?;

        let mut params = self.params.lock();
        let mut changed = false;
        for &(key, value) in &parsed {
            if params.get(key) != value {
                tracing::info!(key = %key, from = params.get(key), to = value, "Adjusting shaping parameter");
                params.set(key, value);
                changed = true;
            }
        }

        if changed {
            self.shaper.apply(&params);
        }

        Ok(ShapingAck {
            values: parsed.iter().map(|&(key, _)| (key, params.get(key))).collect(),
            applied: changed,
        })
    }
}
