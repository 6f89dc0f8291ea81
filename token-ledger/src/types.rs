//! Core types for the token ledger
//!
//! All types are designed for:
//! - Deterministic ordering (`Ord` addresses, `BTreeMap` state)
//! - Exact arithmetic (checked `u128` amounts, never wrapping)
//! - Stable text encodings at API boundaries (hex addresses, decimal amounts)

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Largest supported `decimals` value (10^38 still fits in `u128`)
pub const MAX_DECIMALS: u8 = 38;

/// Account address (20 bytes, rendered as `0x`-prefixed hex)
///
/// The all-zero address is the null address. It can never receive tokens or
/// be granted an allowance.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// Address length in bytes
    pub const LEN: usize = 20;

    /// The null address
    pub const ZERO: Address = Address([0u8; 20]);

    /// Construct from raw bytes
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Derive an address from arbitrary seed bytes (e.g. a public key).
    ///
    /// Takes the right-most 20 bytes of `SHA-256(seed)`.
    pub fn derive(seed: &[u8]) -> Self {
        let digest: [u8; 32] = Sha256::digest(seed).into();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[12..]);
        Self(bytes)
    }

    /// Borrow the raw bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Whether this is the null address
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        if digits.len() != Self::LEN * 2 {
            return Err(Error::InvalidAddress(format!(
                "expected {} hex digits, got {}",
                Self::LEN * 2,
                digits.len()
            )));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", s, e)))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Token amount in base units
///
/// Serialized as a decimal string so values above 2^53 survive JSON clients.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u128);

impl Amount {
    /// Zero units
    pub const ZERO: Amount = Amount(0);

    /// Largest representable amount
    pub const MAX: Amount = Amount(u128::MAX);

    /// Construct from base units
    pub const fn new(units: u128) -> Self {
        Self(units)
    }

    /// Raw base units
    pub const fn as_u128(&self) -> u128 {
        self.0
    }

    /// Whether the amount is zero
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// Checked subtraction
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    /// Checked multiplication by a scalar
    pub fn checked_mul(self, rhs: u128) -> Option<Amount> {
        self.0.checked_mul(rhs).map(Amount)
    }
}

impl From<u64> for Amount {
    fn from(units: u64) -> Self {
        Self(units as u128)
    }
}

impl From<u128> for Amount {
    fn from(units: u128) -> Self {
        Self(units)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u128>()
            .map(Amount)
            .map_err(|e| Error::InvalidAmount(format!("{}: {}", s, e)))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Immutable token metadata fixed at genesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    /// Human-readable name
    pub name: String,

    /// Ticker symbol
    pub symbol: String,

    /// Number of decimal places in one whole token
    pub decimals: u8,

    /// Total supply in base units
    pub total_supply: Amount,
}

impl TokenMetadata {
    /// Reject metadata no genesis could have produced
    pub fn validate(&self) -> Result<()> {
        if self.decimals > MAX_DECIMALS {
            return Err(Error::Config(format!(
                "decimals must be at most {}, got {}",
                MAX_DECIMALS, self.decimals
            )));
        }

        if self.symbol.trim().is_empty() {
            return Err(Error::Config("symbol must not be empty".to_string()));
        }

        Ok(())
    }

    /// Base units in one whole token (10^decimals)
    pub fn unit(&self) -> Result<u128> {
        10u128.checked_pow(u32::from(self.decimals)).ok_or_else(|| {
            Error::InvalidAmount(format!("decimals {} exceed {}", self.decimals, MAX_DECIMALS))
        })
    }

    /// Scale a whole-token quantity into base units
    pub fn to_base_units(&self, whole: u128) -> Result<Amount> {
        Amount::new(whole)
            .checked_mul(self.unit()?)
            .ok_or_else(|| Error::InvalidAmount(format!("{} tokens overflow base units", whole)))
    }

    /// Render base units as a decimal token quantity (e.g. `999900.5`)
    pub fn format_units(&self, amount: Amount) -> Result<String> {
        let unit = self.unit()?;
        let whole = amount.as_u128() / unit;
        let frac = amount.as_u128() % unit;

        if frac == 0 {
            return Ok(whole.to_string());
        }

        let frac = format!("{:0width$}", frac, width = usize::from(self.decimals));
        Ok(format!("{}.{}", whole, frac.trim_end_matches('0')))
    }
}

/// One-time initialization parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    /// Token metadata (total supply already in base units)
    pub metadata: TokenMetadata,

    /// Account credited with the entire supply
    pub initial_holder: Address,
}

impl Genesis {
    /// Validate genesis parameters
    pub fn validate(&self) -> Result<()> {
        if self.initial_holder.is_zero() {
            return Err(Error::InvalidRecipient);
        }

        self.metadata.validate()
    }
}
