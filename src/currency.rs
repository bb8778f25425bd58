//! Unofficial currency codes (mostly crypto-assets) reported in place of an
//! ISO 4217 code.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnofficialCurrencyCode {
    Ada,
    Bat,
    Bch,
    Bnb,
    Btc,
    Btg,
    Cnh,
    Dash,
    Doge,
    Etc,
    Eth,
    Gbx,
    Lsk,
    Neo,
    Omg,
    Qtum,
    Usdt,
    Xlm,
    Xmr,
    Xrp,
    Zec,
    Zrx,
}

impl UnofficialCurrencyCode {
    /// Every accepted code.
    pub const ALL: [UnofficialCurrencyCode; 22] = [
        Self::Ada,
        Self::Bat,
        Self::Bch,
        Self::Bnb,
        Self::Btc,
        Self::Btg,
        Self::Cnh,
        Self::Dash,
        Self::Doge,
        Self::Etc,
        Self::Eth,
        Self::Gbx,
        Self::Lsk,
        Self::Neo,
        Self::Omg,
        Self::Qtum,
        Self::Usdt,
        Self::Xlm,
        Self::Xmr,
        Self::Xrp,
        Self::Zec,
        Self::Zrx,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ada => "ADA",
            Self::Bat => "BAT",
            Self::Bch => "BCH",
            Self::Bnb => "BNB",
            Self::Btc => "BTC",
            Self::Btg => "BTG",
            Self::Cnh => "CNH",
            Self::Dash => "DASH",
            Self::Doge => "DOGE",
            Self::Etc => "ETC",
            Self::Eth => "ETH",
            Self::Gbx => "GBX",
            Self::Lsk => "LSK",
            Self::Neo => "NEO",
            Self::Omg => "OMG",
            Self::Qtum => "QTUM",
            Self::Usdt => "USDT",
            Self::Xlm => "XLM",
            Self::Xmr => "XMR",
            Self::Xrp => "XRP",
            Self::Zec => "ZEC",
            Self::Zrx => "ZRX",
        }
    }
}

/// Whether `code` is one of the accepted unofficial codes. Case-sensitive.
pub fn is_valid_code(code: &str) -> bool {
    code.parse::<UnofficialCurrencyCode>().is_ok()
}

impl fmt::Display for UnofficialCurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidCurrencyCode(pub String);

impl fmt::Display for InvalidCurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid unofficial currency code", self.0)
    }
}

impl std::error::Error for InvalidCurrencyCode {}

impl FromStr for UnofficialCurrencyCode {
    type Err = InvalidCurrencyCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| InvalidCurrencyCode(s.to_string()))
    }
}

impl Serialize for UnofficialCurrencyCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UnofficialCurrencyCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
