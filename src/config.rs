// CLASSIFICATION: COMMUNITY
// Filename: config.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-10-18

//! Boot session configuration.
//!
//! Values come from [`BootConfig::default`], a TOML document, or `TGRUB_*`
//! environment variables layered over the defaults.

use serde::Deserialize;
use std::str::FromStr;

use crate::boot::measure::ExtendPolicy;
use crate::error::BootError;

/// Size of the Multiboot header search window.
pub const MULTIBOOT_SEARCH: usize = 8192;
/// Size of the TCG data buffer; also the file hasher's chunk size.
pub const TCG_BUFFER_SIZE: usize = 0xEFFF;
/// PCR receiving checkfile measurements.
pub const PCR_CHECKFILE: u8 = 13;
/// PCR receiving kernel, module and initrd measurements.
pub const PCR_LOADED_FILES: u8 = 14;

/// Memory map, measurement and loader knobs for one boot session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BootConfig {
    /// Conventional memory below 1 MiB, in KiB.
    pub mem_lower_kb: u32,
    /// Extended memory above 1 MiB, in KiB.
    pub mem_upper_kb: u32,
    /// Bytes read from the start of a kernel before format detection.
    pub probe_size: usize,
    /// PCR extended with verified checkfile entries.
    pub checkfile_pcr: u8,
    /// PCR extended with loaded kernels, modules and ramdisks.
    pub load_pcr: u8,
    /// Measure every loaded file into `load_pcr`.
    pub measure_loads: bool,
    /// When PCR extends are actually sent to the trust anchor.
    pub extend_policy: ExtendPolicy,
    /// Capacity of the module descriptor table.
    pub max_modules: usize,
    /// Chunk size used when streaming files through SHA1.
    pub hash_chunk_size: usize,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            mem_lower_kb: 640,
            mem_upper_kb: 31 * 1024,
            probe_size: MULTIBOOT_SEARCH,
            checkfile_pcr: PCR_CHECKFILE,
            load_pcr: PCR_LOADED_FILES,
            measure_loads: false,
            extend_policy: ExtendPolicy::default(),
            max_modules: 99,
            hash_chunk_size: TCG_BUFFER_SIZE,
        }
    }
}

impl BootConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, BootError> {
        let cfg: BootConfig = toml::from_str(text).map_err(|e| BootError::Config(e.to_string()))?;
        cfg.validate()
    }

    /// Defaults overlaid with any `TGRUB_*` environment variables.
    pub fn from_env() -> Result<Self, BootError> {
        let mut cfg = Self::default();
        env_override("TGRUB_MEM_LOWER", &mut cfg.mem_lower_kb)?;
        env_override("TGRUB_MEM_UPPER", &mut cfg.mem_upper_kb)?;
        env_override("TGRUB_PROBE_SIZE", &mut cfg.probe_size)?;
        env_override("TGRUB_CHECKFILE_PCR", &mut cfg.checkfile_pcr)?;
        env_override("TGRUB_LOAD_PCR", &mut cfg.load_pcr)?;
        env_override("TGRUB_MEASURE_LOADS", &mut cfg.measure_loads)?;
        env_override("TGRUB_EXTEND_POLICY", &mut cfg.extend_policy)?;
        env_override("TGRUB_MAX_MODULES", &mut cfg.max_modules)?;
        env_override("TGRUB_HASH_CHUNK", &mut cfg.hash_chunk_size)?;
        cfg.validate()
    }

    /// First byte past usable memory (`(1024 + mem_upper) KiB`).
    pub fn memory_limit(&self) -> u64 {
        (1024 + u64::from(self.mem_upper_kb)) * 1024
    }

    fn validate(self) -> Result<Self, BootError> {
        // Header parsers index up to the Linux setup header.
        if self.probe_size < 0x400 {
            return Err(BootError::Config(format!(
                "probe_size {} too small",
                self.probe_size
            )));
        }
        if self.hash_chunk_size == 0 {
            return Err(BootError::Config("hash_chunk_size must be > 0".into()));
        }
        if self.mem_lower_kb > 640 {
            return Err(BootError::Config(format!(
                "mem_lower_kb {} exceeds conventional memory",
                self.mem_lower_kb
            )));
        }
        Ok(self)
    }
}

fn env_override<T>(key: &str, slot: &mut T) -> Result<(), BootError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = std::env::var(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e| BootError::Config(format!("{key}={raw}: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_overrides_only_given_keys() {
        let cfg = BootConfig::from_toml_str(
            "mem_upper_kb = 15360\nmeasure_loads = true\nextend_policy = \"always\"\n",
        )
        .unwrap();
        assert_eq!(cfg.mem_upper_kb, 15360);
        assert!(cfg.measure_loads);
        assert_eq!(cfg.extend_policy, ExtendPolicy::Always);
        assert_eq!(cfg.probe_size, MULTIBOOT_SEARCH);
        assert_eq!(cfg.memory_limit(), 16 * 1024 * 1024);
    }

    #[test]
    fn rejects_unknown_keys_and_tiny_probe() {
        assert!(BootConfig::from_toml_str("bogus = 1").is_err());
        assert!(BootConfig::from_toml_str("probe_size = 16").is_err());
    }
}
