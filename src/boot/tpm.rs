// CLASSIFICATION: COMMUNITY
// Filename: tpm.rs v1.1
// Author: Lukas Bower
// Date Modified: 2026-10-18

//! PCR extend protocol.
//!
//! The loader serialises a TPM 1.2 `TPM_Extend` request, wrapped in the
//! TCG BIOS pass-through parameter block, into a shared command buffer and
//! hands it to a [`TcgTransport`]. Responses land in the same buffer; this
//! module does not interpret them.
//!
//! Envelope (input block, 42 bytes):
//!
//! | field                | width | encoding      | value  |
//! |----------------------|-------|---------------|--------|
//! | input block length   | 2+2   | LE + reserved | 0x002a |
//! | output block length  | 2+2   | LE + reserved | 0x0022 |
//! | command tag          | 2     | BE            | 0x00c1 |
//! | command length       | 4     | BE            | 0x0022 |
//! | command ordinal      | 4     | BE            | 0x0014 |
//! | PCR index            | 4     | BE            | 8..=15 |
//! | measurement          | 20    | bytes         |        |

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use crate::boot::measure::extend_pcr;
use crate::boot::sha1::Sha1Digest;
use crate::error::BootError;

/// Lowest PCR the loader may extend.
pub const PCR_FIRST_USABLE: u8 = 8;
/// Highest PCR the loader may extend.
pub const PCR_LAST_USABLE: u8 = 15;

/// Total envelope length, which is also the input block length field.
pub const EXTEND_ENVELOPE_LEN: usize = 0x2a;
const OUTPUT_BLOCK_LEN: u16 = 0x22;
const TPM_TAG_RQU_COMMAND: u16 = 0x00c1;
const TPM_TAG_RSP_COMMAND: u16 = 0x00c4;
const TPM_EXTEND_COMMAND_LEN: u32 = 0x22;
const TPM_EXTEND_RESPONSE_LEN: u32 = 0x1e;
const TPM_ORD_EXTEND: u32 = 0x14;
const TPM_SUCCESS: u32 = 0;
const TPM_BADINDEX: u32 = 2;

/// Placement of the parameter blocks inside the shared buffer.
const PARAM_BLOCK_OFFSET: usize = 0xF012;
const SHARED_BUFFER_LEN: usize = 0x10000;

/// A validated extend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendCommand {
    pcr: u8,
    measurement: [u8; 20],
}

impl ExtendCommand {
    /// Build a request for `pcr`; indices outside 8..=15 are rejected.
    pub fn new(pcr: u8, measurement: [u8; 20]) -> Result<Self, BootError> {
        if !(PCR_FIRST_USABLE..=PCR_LAST_USABLE).contains(&pcr) {
            return Err(BootError::InvalidPcrIndex(pcr));
        }
        Ok(Self { pcr, measurement })
    }

    /// Target register.
    pub fn pcr(&self) -> u8 {
        self.pcr
    }

    /// Measurement bytes.
    pub fn measurement(&self) -> &[u8; 20] {
        &self.measurement
    }

    /// Serialise the envelope.
    pub fn encode(&self) -> [u8; EXTEND_ENVELOPE_LEN] {
        let mut out = [0u8; EXTEND_ENVELOPE_LEN];
        out[0..2].copy_from_slice(&(EXTEND_ENVELOPE_LEN as u16).to_le_bytes());
        out[4..6].copy_from_slice(&OUTPUT_BLOCK_LEN.to_le_bytes());
        out[8..10].copy_from_slice(&TPM_TAG_RQU_COMMAND.to_be_bytes());
        out[10..14].copy_from_slice(&TPM_EXTEND_COMMAND_LEN.to_be_bytes());
        out[14..18].copy_from_slice(&TPM_ORD_EXTEND.to_be_bytes());
        out[18..22].copy_from_slice(&u32::from(self.pcr).to_be_bytes());
        out[22..42].copy_from_slice(&self.measurement);
        out
    }

    /// Parse an envelope produced by [`ExtendCommand::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, BootError> {
        let bytes = bytes
            .get(..EXTEND_ENVELOPE_LEN)
            .ok_or_else(|| BootError::Transport("short extend envelope".into()))?;
        let be32 = |at: usize| u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        if u16::from_le_bytes([bytes[0], bytes[1]]) as usize != EXTEND_ENVELOPE_LEN
            || u16::from_be_bytes([bytes[8], bytes[9]]) != TPM_TAG_RQU_COMMAND
            || be32(10) != TPM_EXTEND_COMMAND_LEN
            || be32(14) != TPM_ORD_EXTEND
        {
            return Err(BootError::Transport("not a TPM_Extend request".into()));
        }
        let index = be32(18);
        let pcr = u8::try_from(index).map_err(|_| BootError::Transport(format!("PCR index {index}")))?;
        let mut measurement = [0u8; 20];
        measurement.copy_from_slice(&bytes[22..42]);
        Self::new(pcr, measurement)
    }
}

/// Command buffer shared between the loader and the transport.
#[derive(Clone)]
pub struct TcgBuffer {
    bytes: Vec<u8>,
}

impl Default for TcgBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TcgBuffer {
    /// Zeroed buffer.
    pub fn new() -> Self {
        Self {
            bytes: vec![0u8; SHARED_BUFFER_LEN],
        }
    }

    /// Parameter block area (request on the way in, response on the way out).
    pub fn params(&self) -> &[u8] {
        &self.bytes[PARAM_BLOCK_OFFSET..]
    }

    /// Mutable parameter block area.
    pub fn params_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[PARAM_BLOCK_OFFSET..]
    }

    fn stage(&mut self, envelope: &[u8]) {
        self.params_mut()[..envelope.len()].copy_from_slice(envelope);
    }
}

/// Hardware pass-through to the trust anchor.
pub trait TcgTransport {
    /// Whether the firmware reports a trust anchor.
    fn is_present(&self) -> bool;

    /// Execute the request staged in `buffer`; the response overwrites it.
    fn hash_extend(&mut self, buffer: &mut TcgBuffer) -> Result<(), BootError>;
}

/// Stage and submit an extend of `pcr` by `digest`.
pub fn update_pcr(
    transport: &mut dyn TcgTransport,
    buffer: &mut TcgBuffer,
    pcr: u8,
    digest: &Sha1Digest,
) -> Result<(), BootError> {
    let command = ExtendCommand::new(pcr, digest.to_bytes())?;
    let envelope = command.encode();
    buffer.stage(&envelope);
    debug!("PCR[{pcr}] extend envelope: {}", hex::encode(envelope));
    transport.hash_extend(buffer)?;
    debug!(
        "PCR[{pcr}] response block: {}",
        hex::encode(&buffer.params()[..OUTPUT_BLOCK_LEN as usize])
    );
    Ok(())
}

#[derive(Debug)]
struct PcrBank {
    present: bool,
    pcrs: [[u8; 20]; 24],
    extends: usize,
}

/// Software trust anchor speaking the same envelope.
///
/// Clones share one register bank, so a caller can keep a handle while a
/// [`Measurer`](crate::boot::measure::Measurer) owns another.
#[derive(Debug, Clone)]
pub struct SoftTpm {
    bank: Rc<RefCell<PcrBank>>,
}

impl Default for SoftTpm {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftTpm {
    /// Present anchor with all registers zero.
    pub fn new() -> Self {
        Self::with_presence(true)
    }

    /// Anchor the firmware reports as absent; every request fails.
    pub fn absent() -> Self {
        Self::with_presence(false)
    }

    fn with_presence(present: bool) -> Self {
        Self {
            bank: Rc::new(RefCell::new(PcrBank {
                present,
                pcrs: [[0u8; 20]; 24],
                extends: 0,
            })),
        }
    }

    /// Current value of register `index` (zero for out-of-range indices).
    pub fn pcr(&self, index: usize) -> [u8; 20] {
        self.bank.borrow().pcrs.get(index).copied().unwrap_or([0u8; 20])
    }

    /// Number of successful extends.
    pub fn extend_count(&self) -> usize {
        self.bank.borrow().extends
    }

    /// Flip the reported presence, e.g. to model the BIOS probe failing.
    pub fn set_present(&self, present: bool) {
        self.bank.borrow_mut().present = present;
    }
}

impl TcgTransport for SoftTpm {
    fn is_present(&self) -> bool {
        self.bank.borrow().present
    }

    fn hash_extend(&mut self, buffer: &mut TcgBuffer) -> Result<(), BootError> {
        let mut bank = self.bank.borrow_mut();
        if !bank.present {
            return Err(BootError::Transport("trust anchor not present".into()));
        }
        let (rc, value) = match ExtendCommand::decode(buffer.params()) {
            Ok(cmd) => {
                let slot = &mut bank.pcrs[usize::from(cmd.pcr())];
                extend_pcr(slot, cmd.measurement());
                let value = *slot;
                bank.extends += 1;
                (TPM_SUCCESS, value)
            }
            Err(_) => (TPM_BADINDEX, [0u8; 20]),
        };

        let out = buffer.params_mut();
        out[..OUTPUT_BLOCK_LEN as usize].fill(0);
        out[0..2].copy_from_slice(&OUTPUT_BLOCK_LEN.to_le_bytes());
        out[4..6].copy_from_slice(&TPM_TAG_RSP_COMMAND.to_be_bytes());
        out[6..10].copy_from_slice(&TPM_EXTEND_RESPONSE_LEN.to_be_bytes());
        out[10..14].copy_from_slice(&rc.to_be_bytes());
        out[14..34].copy_from_slice(&value);
        if rc != TPM_SUCCESS {
            return Err(BootError::Transport(format!("TPM return code {rc}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boot::sha1::sha1;

    #[test]
    fn envelope_layout() {
        let cmd = ExtendCommand::new(13, [0xAB; 20]).unwrap();
        let e = cmd.encode();
        assert_eq!(&e[..8], &[0x2a, 0, 0, 0, 0x22, 0, 0, 0]);
        assert_eq!(&e[8..22], &[0x00, 0xc1, 0, 0, 0, 0x22, 0, 0, 0, 0x14, 0, 0, 0, 13]);
        assert_eq!(&e[22..], &[0xAB; 20]);
        assert_eq!(ExtendCommand::decode(&e).unwrap(), cmd);
    }

    #[test]
    fn rejects_pcr_outside_loader_range() {
        assert!(matches!(ExtendCommand::new(7, [0; 20]), Err(BootError::InvalidPcrIndex(7))));
        assert!(matches!(ExtendCommand::new(16, [0; 20]), Err(BootError::InvalidPcrIndex(16))));
        let mut tpm = SoftTpm::new();
        let mut buf = TcgBuffer::new();
        assert!(update_pcr(&mut tpm, &mut buf, 3, &sha1(b"x")).is_err());
        assert_eq!(tpm.extend_count(), 0);
    }

    #[test]
    fn soft_tpm_applies_extend_rule_and_answers() {
        let tpm = SoftTpm::new();
        let mut transport = tpm.clone();
        let mut buf = TcgBuffer::new();
        let m = sha1(b"hello");
        update_pcr(&mut transport, &mut buf, 13, &m).unwrap();

        let mut expected = [0u8; 20];
        extend_pcr(&mut expected, &m.to_bytes());
        assert_eq!(tpm.pcr(13), expected);
        assert_eq!(&buf.params()[4..6], &[0x00, 0xc4]);
        assert_eq!(&buf.params()[10..14], &[0, 0, 0, 0]);
        assert_eq!(&buf.params()[14..34], &expected);
    }

    #[test]
    fn absent_anchor_fails_request() {
        let mut tpm = SoftTpm::absent();
        let mut buf = TcgBuffer::new();
        assert!(!tpm.is_present());
        assert!(matches!(
            update_pcr(&mut tpm, &mut buf, 8, &sha1(b"x")),
            Err(BootError::Transport(_))
        ));
    }
}
