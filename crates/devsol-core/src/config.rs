//! # Loader Configuration
//!
//! Tunables for validating and transferring device code objects.
//!
//! Defaults match the AMD HSA code object conventions. Every value can be
//! overridden from the environment, which is how the CLI and test harnesses
//! adjust them without recompiling:
//!
//! - `DEVSOL_DEVICE_OSABI`: expected `EI_OSABI` of device images (default `64`)
//! - `DEVSOL_MIN_ABI_VERSION`: lowest accepted `EI_ABIVERSION` (default `1`, code object V3)
//! - `DEVSOL_MAX_TRANSFER`: largest single remote read in bytes (default 1 MiB)
//! - `DEVSOL_MAX_SNAPSHOT`: largest memory code object copied in bytes (default 1 GiB)

use std::env;
use std::str::FromStr;

use tracing::warn;

use crate::types::module::SO_NAME_CAPACITY;

/// `ELFOSABI_AMDGPU_HSA`
pub const ELFOSABI_AMDGPU_HSA: u8 = 64;
/// `ELFABIVERSION_AMDGPU_HSA_V3`, the oldest code object version we can debug.
pub const ELFABIVERSION_AMDGPU_HSA_V3: u8 = 1;
/// `EM_AMDGPU`
pub const EM_AMDGPU: u16 = 224;

const DEFAULT_MAX_TRANSFER: usize = 1 << 20;
const DEFAULT_MAX_SNAPSHOT: u64 = 1 << 30;

/// Settings shared by the image adapter, the streams, and the module registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig
{
    /// OS/ABI tag a device image must carry.
    pub device_osabi: u8,
    /// Minimum ABI version a device image must carry.
    pub min_abi_version: u8,
    /// Upper bound on the length of one remote `pread`.
    pub max_transfer_size: usize,
    /// Upper bound on the size of a `memory://` code object snapshot.
    pub max_snapshot_size: u64,
    /// Byte capacity of a module display name, terminator included.
    pub display_name_capacity: usize,
}

impl Default for LoaderConfig
{
    fn default() -> Self
    {
        Self {
            device_osabi: ELFOSABI_AMDGPU_HSA,
            min_abi_version: ELFABIVERSION_AMDGPU_HSA_V3,
            max_transfer_size: DEFAULT_MAX_TRANSFER,
            max_snapshot_size: DEFAULT_MAX_SNAPSHOT,
            display_name_capacity: SO_NAME_CAPACITY,
        }
    }
}

impl LoaderConfig
{
    /// Defaults overridden by any valid `DEVSOL_*` environment variables.
    ///
    /// Unparseable values are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self
    {
        let defaults = Self::default();
        Self {
            device_osabi: env_or("DEVSOL_DEVICE_OSABI", defaults.device_osabi),
            min_abi_version: env_or("DEVSOL_MIN_ABI_VERSION", defaults.min_abi_version),
            max_transfer_size: env_or("DEVSOL_MAX_TRANSFER", defaults.max_transfer_size).max(1),
            max_snapshot_size: env_or("DEVSOL_MAX_SNAPSHOT", defaults.max_snapshot_size),
            display_name_capacity: defaults.display_name_capacity,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "ignoring invalid loader setting");
            default
        }),
        Err(_) => default,
    }
}
