//! Domain primitive types used across the Backhaul workspace.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BackhaulError, Result};

/// An IPv4 CIDR block, e.g. `10.192.0.0/16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CidrBlock {
    base: Ipv4Addr,
    prefix: u8,
}

impl CidrBlock {
    /// Creates a CIDR block, validating that the base address is aligned
    /// to the prefix boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix exceeds 32 or the base address has
    /// host bits set.
    pub fn new(base: Ipv4Addr, prefix: u8) -> Result<Self> {
        if prefix > 32 {
            return Err(BackhaulError::Config {
                message: format!("CIDR prefix out of range: /{prefix}"),
            });
        }
        let mask = prefix_mask(prefix);
        if u32::from(base) & !mask != 0 {
            return Err(BackhaulError::Config {
                message: format!("CIDR base {base} has host bits set for /{prefix}"),
            });
        }
        Ok(Self { base, prefix })
    }

    /// Returns the prefix length.
    #[must_use]
    pub const fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Returns the `index`-th child block of size `new_prefix` carved out
    /// of this block.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_prefix` is not longer than this block's
    /// prefix or `index` does not fit within this block.
    pub fn subnet(&self, index: u32, new_prefix: u8) -> Result<Self> {
        if new_prefix <= self.prefix || new_prefix > 32 {
            return Err(BackhaulError::Config {
                message: format!(
                    "cannot carve /{new_prefix} subnets out of {self}"
                ),
            });
        }
        let child_count = 1u32 << (new_prefix - self.prefix);
        if index >= child_count {
            return Err(BackhaulError::Config {
                message: format!(
                    "subnet index {index} out of range for /{new_prefix} within {self}"
                ),
            });
        }
        let child_size = 1u32 << (32 - new_prefix);
        let base = u32::from(self.base) + index * child_size;
        Self::new(Ipv4Addr::from(base), new_prefix)
    }
}

impl FromStr for CidrBlock {
    type Err = BackhaulError;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = s.split_once('/').ok_or_else(|| BackhaulError::Config {
            message: format!("malformed CIDR block: {s}"),
        })?;
        let base: Ipv4Addr = addr.parse().map_err(|_| BackhaulError::Config {
            message: format!("malformed CIDR address: {s}"),
        })?;
        let prefix: u8 = prefix.parse().map_err(|_| BackhaulError::Config {
            message: format!("malformed CIDR prefix: {s}"),
        })?;
        Self::new(base, prefix)
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.prefix)
    }
}

const fn prefix_mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    }
}

/// CPU units allowed for the backup task definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskCpu {
    /// 256 CPU units (.25 vCPU).
    Cpu256,
    /// 512 CPU units (.5 vCPU).
    Cpu512,
    /// 1024 CPU units (1 vCPU).
    Cpu1024,
    /// 2048 CPU units (2 vCPU).
    Cpu2048,
    /// 4096 CPU units (4 vCPU).
    Cpu4096,
    /// 8196 CPU units (8 vCPU).
    Cpu8196,
}

impl TaskCpu {
    /// All allowed CPU values, in ascending order.
    pub const ALL: [Self; 6] = [
        Self::Cpu256,
        Self::Cpu512,
        Self::Cpu1024,
        Self::Cpu2048,
        Self::Cpu4096,
        Self::Cpu8196,
    ];

    /// Returns the CloudFormation string value for this setting.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu256 => "256",
            Self::Cpu512 => "512",
            Self::Cpu1024 => "1024",
            Self::Cpu2048 => "2048",
            Self::Cpu4096 => "4096",
            Self::Cpu8196 => "8196",
        }
    }
}

impl Default for TaskCpu {
    fn default() -> Self {
        Self::Cpu2048
    }
}

impl FromStr for TaskCpu {
    type Err = BackhaulError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| BackhaulError::Config {
                message: format!("invalid task CPU value: {s}"),
            })
    }
}

impl fmt::Display for TaskCpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Memory sizes (MiB) allowed for the backup task definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskMemory {
    /// 512 MiB.
    Mib512,
    /// 1 GiB.
    Mib1024,
    /// 2 GiB.
    Mib2048,
    /// 4 GiB.
    Mib4096,
    /// 8 GiB.
    Mib8192,
    /// 12 GiB.
    Mib12288,
    /// 16 GiB.
    Mib16384,
    /// 32 GiB.
    Mib32768,
}

impl TaskMemory {
    /// All allowed memory values, in ascending order.
    pub const ALL: [Self; 8] = [
        Self::Mib512,
        Self::Mib1024,
        Self::Mib2048,
        Self::Mib4096,
        Self::Mib8192,
        Self::Mib12288,
        Self::Mib16384,
        Self::Mib32768,
    ];

    /// Returns the CloudFormation string value for this setting.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mib512 => "512",
            Self::Mib1024 => "1024",
            Self::Mib2048 => "2048",
            Self::Mib4096 => "4096",
            Self::Mib8192 => "8192",
            Self::Mib12288 => "12288",
            Self::Mib16384 => "16384",
            Self::Mib32768 => "32768",
        }
    }
}

impl Default for TaskMemory {
    fn default() -> Self {
        Self::Mib8192
    }
}

impl FromStr for TaskMemory {
    type Err = BackhaulError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| BackhaulError::Config {
                message: format!("invalid task memory value: {s}"),
            })
    }
}

impl fmt::Display for TaskMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A syntactically valid notification email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Parses and validates an email address, trimming surrounding
    /// whitespace. Validation is intentionally shallow: one `@`, a
    /// non-empty local part, and a dotted domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the input does not look like an address.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let valid = matches!(
            trimmed.split_once('@'),
            Some((local, domain))
                if !local.is_empty()
                    && !domain.is_empty()
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !domain.contains('@')
        );
        if valid {
            Ok(Self(trimmed.to_owned()))
        } else {
            Err(BackhaulError::Config {
                message: format!("invalid email address: {raw}"),
            })
        }
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cidr_parse_and_display_roundtrip() {
        let cidr: CidrBlock = "10.192.0.0/16".parse().expect("should parse");
        assert_eq!(cidr.to_string(), "10.192.0.0/16");
        assert_eq!(cidr.prefix(), 16);
    }

    #[test]
    fn cidr_rejects_unaligned_base() {
        let result = "10.192.0.1/16".parse::<CidrBlock>();
        assert!(result.is_err());
    }

    #[test]
    fn cidr_rejects_garbage() {
        assert!("not-a-cidr".parse::<CidrBlock>().is_err());
        assert!("10.0.0.0/33".parse::<CidrBlock>().is_err());
        assert!("10.0.0.0".parse::<CidrBlock>().is_err());
    }

    #[test]
    fn cidr_carves_consecutive_slash24_blocks() {
        let vpc: CidrBlock = "10.192.0.0/16".parse().expect("should parse");
        let blocks: Vec<String> = (0..4)
            .map(|i| vpc.subnet(i, 24).expect("in range").to_string())
            .collect();
        assert_eq!(
            blocks,
            vec!["10.192.0.0/24", "10.192.1.0/24", "10.192.2.0/24", "10.192.3.0/24"]
        );
    }

    #[test]
    fn cidr_subnet_index_out_of_range() {
        let vpc: CidrBlock = "10.0.0.0/24".parse().expect("should parse");
        assert!(vpc.subnet(0, 26).is_ok());
        assert!(vpc.subnet(4, 26).is_err());
        assert!(vpc.subnet(0, 24).is_err());
    }

    #[test]
    fn cpu_enum_closure_roundtrips() {
        for cpu in TaskCpu::ALL {
            let parsed: TaskCpu = cpu.as_str().parse().expect("allowed value");
            assert_eq!(parsed, cpu);
        }
        assert!("300".parse::<TaskCpu>().is_err());
    }

    #[test]
    fn memory_enum_closure_roundtrips() {
        for mem in TaskMemory::ALL {
            let parsed: TaskMemory = mem.as_str().parse().expect("allowed value");
            assert_eq!(parsed, mem);
        }
        assert!("1000".parse::<TaskMemory>().is_err());
    }

    #[test]
    fn email_accepts_plain_address_and_trims() {
        let email = EmailAddress::parse("  ops@example.com ").expect("valid");
        assert_eq!(email.as_str(), "ops@example.com");
    }

    #[test]
    fn email_rejects_malformed_input() {
        assert!(EmailAddress::parse("not-an-email").is_err());
        assert!(EmailAddress::parse("@example.com").is_err());
        assert!(EmailAddress::parse("user@nodot").is_err());
        assert!(EmailAddress::parse("user@.com").is_err());
        assert!(EmailAddress::parse("a@b@c.com").is_err());
    }
}
