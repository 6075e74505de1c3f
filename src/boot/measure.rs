// CLASSIFICATION: COMMUNITY
// Filename: measure.rs v0.3
// Date Modified: 2026-10-18
// Author: Lukas Bower
//
// ─────────────────────────────────────────────────────────────
// Boot measurement helpers
//
// Holds the extend rule shared by the live path and the offline
// verifier, plus the `Measurer` that gates extends on the
// configured policy and keeps an ordered event log.
//
// Extends are not commutative. Callers issue them in load order
// and nothing here reorders or retries them.
//
// # Public API
// * [`extend_pcr`]     – in-place `PCR := SHA1(PCR || m)`
// * [`PcrValue`]       – parsed initial register value
// * [`ExtendPolicy`]   – when extends reach the trust anchor
// * [`Measurer`]       – policy-gated extends + event log
// ─────────────────────────────────────────────────────────────

use std::fmt;
use std::str::FromStr;

use log::{debug, info};
use serde::Deserialize;

use crate::boot::sha1::{sha1, Sha1Digest};
use crate::boot::tpm::{update_pcr, TcgBuffer, TcgTransport};
use crate::error::BootError;

/// Extend a 20-byte Platform Configuration Register **in place**.
///
/// Pseudocode: `PCR := SHA1(PCR || measurement)`
pub fn extend_pcr(pcr: &mut [u8; 20], measurement: &[u8; 20]) {
    let mut joined = [0u8; 40];
    joined[..20].copy_from_slice(pcr);
    joined[20..].copy_from_slice(measurement);
    *pcr = sha1(&joined).to_bytes();
}

/// A 20-byte register value.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct PcrValue(pub [u8; 20]);

impl PcrValue {
    /// All-zero register, the state after platform reset.
    pub const ZERO: PcrValue = PcrValue([0u8; 20]);

    /// Apply the extend rule with `measurement`.
    pub fn extend(&mut self, measurement: &Sha1Digest) {
        extend_pcr(&mut self.0, &measurement.to_bytes());
    }

    /// Bytes as two-digit lowercase hex pairs separated by spaces.
    pub fn to_spaced_hex(&self) -> String {
        self.0
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl FromStr for PcrValue {
    type Err = BootError;

    /// `NULL` or exactly 40 lowercase hex digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "NULL" {
            return Ok(Self::ZERO);
        }
        let valid = s.len() == 40 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !valid {
            return Err(BootError::InvalidPcrValue(s.to_string()));
        }
        let mut out = [0u8; 20];
        hex::decode_to_slice(s, &mut out).map_err(|_| BootError::InvalidPcrValue(s.to_string()))?;
        Ok(PcrValue(out))
    }
}

impl fmt::Debug for PcrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PcrValue({})", hex::encode(self.0))
    }
}

/// When a requested extend is actually sent to the trust anchor.
///
/// `WhenAnchorAbsent` reproduces the classic checkfile gate, which only
/// sends the command when the firmware reports no anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtendPolicy {
    /// Send only when the anchor is reported absent.
    #[default]
    WhenAnchorAbsent,
    /// Send only when the anchor is reported present.
    WhenAnchorPresent,
    /// Always send.
    Always,
    /// Never send; events are still logged.
    Never,
}

impl ExtendPolicy {
    /// Whether an extend goes out given the anchor's reported presence.
    pub fn allows(self, anchor_present: bool) -> bool {
        match self {
            ExtendPolicy::WhenAnchorAbsent => !anchor_present,
            ExtendPolicy::WhenAnchorPresent => anchor_present,
            ExtendPolicy::Always => true,
            ExtendPolicy::Never => false,
        }
    }
}

impl FromStr for ExtendPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "when_anchor_absent" => Ok(Self::WhenAnchorAbsent),
            "when_anchor_present" => Ok(Self::WhenAnchorPresent),
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            other => Err(format!("unknown extend policy {other:?}")),
        }
    }
}

/// One requested extend, in issue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementEvent {
    /// Target register.
    pub pcr: u8,
    /// Measurement value.
    pub digest: Sha1Digest,
    /// What was measured (usually a path).
    pub description: String,
    /// Whether the command went to the trust anchor.
    pub sent: bool,
}

/// Sends policy-gated extends through a transport and logs each request.
pub struct Measurer {
    transport: Box<dyn TcgTransport>,
    buffer: TcgBuffer,
    policy: ExtendPolicy,
    events: Vec<MeasurementEvent>,
}

impl Measurer {
    /// Measurer over `transport` honouring `policy`.
    pub fn new(transport: Box<dyn TcgTransport>, policy: ExtendPolicy) -> Self {
        Self {
            transport,
            buffer: TcgBuffer::new(),
            policy,
            events: Vec::new(),
        }
    }

    /// Active policy.
    pub fn policy(&self) -> ExtendPolicy {
        self.policy
    }

    /// Whether the transport reports an anchor.
    pub fn anchor_present(&self) -> bool {
        self.transport.is_present()
    }

    /// Extend `pcr` by `digest` if the policy allows it.
    ///
    /// Returns whether the command was sent. The event is logged either
    /// way; a transport failure is returned after logging.
    pub fn measure(&mut self, pcr: u8, digest: Sha1Digest, description: &str) -> Result<bool, BootError> {
        let sent = self.policy.allows(self.transport.is_present());
        self.events.push(MeasurementEvent {
            pcr,
            digest,
            description: description.to_string(),
            sent,
        });
        if !sent {
            debug!("PCR[{pcr}] extend skipped by {:?}: {description}", self.policy);
            return Ok(false);
        }
        update_pcr(self.transport.as_mut(), &mut self.buffer, pcr, &digest)?;
        info!("PCR[{pcr}] extended with {digest} ({description})");
        Ok(true)
    }

    /// Events in issue order.
    pub fn events(&self) -> &[MeasurementEvent] {
        &self.events
    }

    /// Shared command buffer, holding the last response.
    pub fn buffer(&self) -> &TcgBuffer {
        &self.buffer
    }
}
