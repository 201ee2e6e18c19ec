use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::Lazy;
use railctl_raw::current_soc;
use railctl_raw::RailSetSpec;

use crate::common::{
    acquire_port, CalibrationStore, DevMemProvider, MemoryPort, NvmemFileStore, PortProvider,
    RegisterPort, StaticProvider, StaticStore,
};
use crate::error::{RailError, Result};
use crate::regulator::RailSet;

/// Byte offset of `bg_trim` inside the D1 SID eFuse (bits 23:16 of word 0x28)
pub const DEFAULT_BG_TRIM_OFFSET: u64 = 0x2A;

pub const DEFAULT_NVMEM_DEVICE: &str = "/sys/bus/nvmem/devices/sunxi-sid0/nvmem";

pub const DEFAULT_DEVMEM: &str = "/dev/mem";

/// Where the register port comes from
#[derive(Debug, Clone)]
pub enum PortSource {
    /// In-process register file seeded with `(offset, word)` pairs
    Simulated { words: Vec<(u32, u32)> },
    /// Physical window mapped through the first memory device that opens
    DevMem {
        paths: Vec<PathBuf>,
        base: u64,
        window: usize,
    },
}

/// Where calibration trims come from
#[derive(Debug, Clone)]
pub enum TrimSource {
    /// Fixed `bg_trim` value, `None` for a blank eFuse
    Simulated(Option<u8>),
    Nvmem { path: PathBuf, offset: u64 },
}

#[derive(Debug, Clone)]
pub struct RailctlConfig {
    /// Match key of the rail set variant to bring up
    pub variant: String,
    pub port: PortSource,
    pub trim: TrimSource,
    pub listen: SocketAddr,
}

impl RailctlConfig {
    pub fn new(variant: impl Into<String>, port: PortSource, trim: TrimSource) -> Self {
        Self {
            variant: variant.into(),
            port,
            trim,
            listen: SocketAddr::from(([0, 0, 0, 0], 9108)),
        }
    }

    /// Simulated hardware for the given variant
    pub fn simulated(variant: impl Into<String>) -> Self {
        Self::new(
            variant,
            PortSource::Simulated { words: Vec::new() },
            TrimSource::Simulated(None),
        )
    }

    /// Real hardware at the SoC's default system control block
    pub fn hardware(variant: impl Into<String>) -> Self {
        Self::new(
            variant,
            PortSource::DevMem {
                paths: vec![PathBuf::from(DEFAULT_DEVMEM)],
                base: current_soc::SYSCON_BASE,
                window: current_soc::SYSCON_WINDOW,
            },
            TrimSource::Nvmem {
                path: sysfs_path(DEFAULT_NVMEM_DEVICE),
                offset: DEFAULT_BG_TRIM_OFFSET,
            },
        )
    }

    pub fn spec(&self) -> Result<&'static RailSetSpec> {
        current_soc::lookup(&self.variant)
            .ok_or_else(|| RailError::UnknownVariant(self.variant.clone()))
    }

    pub fn providers(&self) -> Vec<Box<dyn PortProvider>> {
        match &self.port {
            PortSource::Simulated { words } => {
                let port: Arc<dyn RegisterPort> =
                    Arc::new(MemoryPort::with_words("simulated", words));
                let provider: Box<dyn PortProvider> =
                    Box::new(StaticProvider::new("simulated", Some(port)));
                vec![provider]
            }
            PortSource::DevMem {
                paths,
                base,
                window,
            } => paths
                .iter()
                .map(|path| {
                    let provider: Box<dyn PortProvider> = Box::new(DevMemProvider {
                        path: path.clone(),
                        base: *base,
                        len: *window,
                    });
                    provider
                })
                .collect(),
        }
    }

    pub fn store(&self) -> Box<dyn CalibrationStore> {
        match &self.trim {
            TrimSource::Simulated(Some(value)) => {
                Box::new(StaticStore::new().with_cell("bg_trim", *value))
            }
            TrimSource::Simulated(None) => Box::new(StaticStore::new()),
            TrimSource::Nvmem { path, offset } => {
                Box::new(NvmemFileStore::new(path).with_cell("bg_trim", *offset))
            }
        }
    }

    /// Acquire the port and bring up the configured rail set
    pub fn bring_up(&self) -> Result<RailSet> {
        let spec = self.spec()?;
        let providers = self.providers();
        let refs: Vec<&dyn PortProvider> = providers.iter().map(|p| p.as_ref()).collect();
        let port = acquire_port(&refs)?;
        let set = RailSet::new(spec, port)?;
        set.bring_up(self.store().as_ref())?;
        Ok(set)
    }
}

/// Host sysfs mount point when running in a container (`RAILCTL_SYSFS_ROOT`)
pub static SYSFS_ROOT: Lazy<Option<PathBuf>> = Lazy::new(|| {
    std::env::var_os("RAILCTL_SYSFS_ROOT")
        .filter(|root| !root.is_empty())
        .map(PathBuf::from)
});

pub fn sysfs_path(path: &str) -> PathBuf {
    match &*SYSFS_ROOT {
        Some(root) => root.join(path.trim_start_matches('/')),
        None => PathBuf::from(path),
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal number
pub fn parse_number(s: &str) -> Result<u64> {
    let s = s.trim().replace('_', "");
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    };
    parsed.map_err(|e| RailError::ConfigError(format!("Invalid number '{s}': {e}")))
}

/// Parse a voltage like `1800000`, `1800mV`, `1.8V` into microvolts
pub fn parse_microvolts(s: &str) -> Result<u32> {
    let s = s.trim();
    let lower = s.to_ascii_lowercase();
    let invalid = || RailError::ConfigError(format!("Invalid voltage '{s}'"));

    let (number, scale) = if let Some(n) = lower.strip_suffix("uv") {
        (n, 1u64)
    } else if let Some(n) = lower.strip_suffix("mv") {
        (n, 1_000)
    } else if let Some(n) = lower.strip_suffix('v') {
        (n, 1_000_000)
    } else {
        (lower.as_str(), 1)
    };

    let (whole, frac) = number.trim().split_once('.').unwrap_or((number.trim(), ""));
    let whole: u64 = whole.parse().map_err(|_| invalid())?;
    let mut uv = whole.checked_mul(scale).ok_or_else(invalid)?;

    if !frac.is_empty() {
        let digits = frac.len() as u32;
        let frac_value: u64 = frac.parse().map_err(|_| invalid())?;
        let divisor = 10u64.checked_pow(digits).ok_or_else(invalid)?;
        let scaled = frac_value.checked_mul(scale).ok_or_else(invalid)?;
        if scaled % divisor != 0 {
            return Err(invalid());
        }
        uv += scaled / divisor;
    }

    u32::try_from(uv).map_err(|_| invalid())
}
