//! IPv4 CIDR block parsing and containment checks

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid CIDR block '{0}' (expected e.g. 10.0.0.0/16)")]
pub struct ParseCidrError(pub String);

/// An IPv4 address block in CIDR notation, e.g. `10.1.0.0/16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cidr {
    addr: Ipv4Addr,
    prefix_len: u8,
}

impl Cidr {
    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Result<Self, ParseCidrError> {
        if prefix_len > 32 {
            return Err(ParseCidrError(format!("{}/{}", addr, prefix_len)));
        }
        Ok(Self { addr, prefix_len })
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    fn mask(&self) -> u32 {
        if self.prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - self.prefix_len)
        }
    }

    fn network(&self) -> u32 {
        u32::from(self.addr) & self.mask()
    }

    /// Whether `other` lies entirely within this block.
    ///
    /// A block contains itself.
    pub fn contains(&self, other: &Cidr) -> bool {
        other.prefix_len >= self.prefix_len && (u32::from(other.addr) & self.mask()) == self.network()
    }
}

impl FromStr for Cidr {
    type Err = ParseCidrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseCidrError(s.to_string());
        let (addr, prefix) = s.split_once('/').ok_or_else(err)?;
        let addr: Ipv4Addr = addr.trim().parse().map_err(|_| err())?;
        let prefix_len: u8 = prefix.trim().parse().map_err(|_| err())?;
        Cidr::new(addr, prefix_len).map_err(|_| err())
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

impl TryFrom<String> for Cidr {
    type Error = ParseCidrError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Cidr> for String {
    fn from(c: Cidr) -> String {
        c.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays() {
        let c: Cidr = "10.1.0.0/16".parse().unwrap();
        assert_eq!(c.to_string(), "10.1.0.0/16");
        assert_eq!(c.prefix_len(), 16);
    }

    #[test]
    fn rejects_garbage() {
        assert!("10.1.0.0".parse::<Cidr>().is_err());
        assert!("10.1.0.0/33".parse::<Cidr>().is_err());
        assert!("not-an-ip/16".parse::<Cidr>().is_err());
        assert!("10.1.0.0/abc".parse::<Cidr>().is_err());
    }

    #[test]
    fn containment() {
        let vnet: Cidr = "10.1.0.0/16".parse().unwrap();
        let inside: Cidr = "10.1.1.0/24".parse().unwrap();
        let outside: Cidr = "10.2.1.0/24".parse().unwrap();
        let wider: Cidr = "10.0.0.0/8".parse().unwrap();

        assert!(vnet.contains(&inside));
        assert!(vnet.contains(&vnet));
        assert!(!vnet.contains(&outside));
        assert!(!vnet.contains(&wider));
    }
}
