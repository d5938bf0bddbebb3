//! XRPL amounts: native drops and issued-currency (IOU) values.
//!
//! Issued-currency values are decimal floats. The wallet exchanges them as
//! integer base units at a fixed scale of [`IOU_SCALE`] decimal places,
//! the same precision as drops.

use crate::address::{decode_address, encode_address, AccountId};
use crate::error::XrpError;

/// Decimal places of one issued-currency base unit.
pub const IOU_SCALE: i32 = 6;

/// Protocol cap on native amounts (100 billion XRP in drops).
pub const MAX_DROPS: u64 = 100_000_000_000_000_000;

const NOT_NATIVE: u64 = 1 << 63;
const POSITIVE: u64 = 1 << 62;
const MIN_MANTISSA: u128 = 1_000_000_000_000_000;
const MAX_MANTISSA: u128 = 9_999_999_999_999_999;
const MIN_EXPONENT: i32 = -96;
const MAX_EXPONENT: i32 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Currency([u8; 20]);

impl Currency {
    /// Three-letter ISO-style code or 40 hex characters.
    pub fn parse(code: &str) -> Result<Self, XrpError> {
        let mut bytes = [0u8; 20];
        if code.len() == 3 && code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            if code.eq_ignore_ascii_case("XRP") {
                return Err(XrpError::InvalidCurrency("XRP is the native asset".into()));
            }
            bytes[12..15].copy_from_slice(code.as_bytes());
            return Ok(Self(bytes));
        }
        if code.len() == 40 {
            let raw = hex::decode(code).map_err(|e| XrpError::InvalidCurrency(format!("{code}: {e}")))?;
            bytes.copy_from_slice(&raw);
            if bytes[0] == 0 {
                return Err(XrpError::InvalidCurrency(format!("{code}: reserved prefix")));
            }
            return Ok(Self(bytes));
        }
        Err(XrpError::InvalidCurrency(code.to_string()))
    }

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Code as rippled reports it in `account_lines`.
    pub fn code(&self) -> String {
        let standard = self.0[..12].iter().chain(&self.0[15..]).all(|b| *b == 0);
        if standard {
            String::from_utf8_lossy(&self.0[12..15]).into_owned()
        } else {
            hex::encode_upper(self.0)
        }
    }
}

/// A token reference of the form `CODE.rIssuer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub currency: Currency,
    pub issuer: AccountId,
}

impl IssuedToken {
    pub fn parse(token: &str) -> Result<Self, XrpError> {
        let (code, issuer) = token
            .split_once('.')
            .ok_or_else(|| XrpError::InvalidCurrency(format!("{token}: expected CODE.issuer")))?;
        Ok(Self {
            currency: Currency::parse(code)?,
            issuer: decode_address(issuer)?,
        })
    }

    pub fn issuer_address(&self) -> String {
        encode_address(&self.issuer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IouValue {
    mantissa: u64,
    exponent: i32,
}

impl IouValue {
    pub const ZERO: IouValue = IouValue { mantissa: 0, exponent: 0 };

    /// Converts integer base units (`value / 10^IOU_SCALE`) to a normalized value.
    pub fn from_base_units(units: u128) -> Result<Self, XrpError> {
        if units == 0 {
            return Ok(Self::ZERO);
        }
        let mut mantissa = units;
        let mut exponent = -IOU_SCALE;
        while mantissa < MIN_MANTISSA {
            mantissa *= 10;
            exponent -= 1;
        }
        while mantissa > MAX_MANTISSA {
            if mantissa % 10 != 0 {
                return Err(XrpError::InvalidAmount(format!(
                    "{units} exceeds 16 significant digits"
                )));
            }
            mantissa /= 10;
            exponent += 1;
        }
        if exponent > MAX_EXPONENT {
            return Err(XrpError::InvalidAmount(format!("{units} is too large")));
        }
        Ok(Self {
            mantissa: mantissa as u64,
            exponent,
        })
    }

    /// Base units, truncating precision finer than [`IOU_SCALE`].
    pub fn to_base_units(&self) -> u128 {
        let shift = self.exponent + IOU_SCALE;
        let mantissa = u128::from(self.mantissa);
        if shift >= 0 {
            10u128
                .checked_pow(shift as u32)
                .and_then(|p| mantissa.checked_mul(p))
                .unwrap_or(u128::MAX)
        } else {
            10u128.checked_pow((-shift) as u32).map_or(0, |p| mantissa / p)
        }
    }

    fn to_bits(self) -> u64 {
        if self.mantissa == 0 {
            return NOT_NATIVE;
        }
        let biased = (self.exponent + 97) as u64;
        NOT_NATIVE | POSITIVE | (biased << 54) | self.mantissa
    }

    fn from_bits(bits: u64) -> Result<Self, XrpError> {
        if bits & !NOT_NATIVE == 0 {
            return Ok(Self::ZERO);
        }
        if bits & POSITIVE == 0 {
            return Err(XrpError::SerializationError("negative issued amount".into()));
        }
        let exponent = ((bits >> 54) & 0xFF) as i32 - 97;
        let mantissa = bits & ((1 << 54) - 1);
        if !(MIN_EXPONENT..=MAX_EXPONENT).contains(&exponent)
            || !(MIN_MANTISSA..=MAX_MANTISSA).contains(&u128::from(mantissa))
        {
            return Err(XrpError::SerializationError("non-canonical issued amount".into()));
        }
        Ok(Self { mantissa, exponent })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Amount {
    Drops(u64),
    Issued {
        value: IouValue,
        token: IssuedToken,
    },
}

impl Amount {
    pub fn drops(value: u128) -> Result<Self, XrpError> {
        match u64::try_from(value) {
            Ok(v) if v <= MAX_DROPS => Ok(Amount::Drops(v)),
            _ => Err(XrpError::InvalidAmount(format!("{value} drops exceeds the supply cap"))),
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Amount::Drops(drops) => out.extend_from_slice(&(POSITIVE | drops).to_be_bytes()),
            Amount::Issued { value, token } => {
                out.extend_from_slice(&value.to_bits().to_be_bytes());
                out.extend_from_slice(token.currency.as_bytes());
                out.extend_from_slice(&token.issuer);
            }
        }
    }

    /// Decodes one amount from the front of `data`, returning the bytes used.
    pub fn decode(data: &[u8]) -> Result<(Self, usize), XrpError> {
        let head: [u8; 8] = data
            .get(..8)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| XrpError::SerializationError("truncated amount".into()))?;
        let bits = u64::from_be_bytes(head);
        if bits & NOT_NATIVE == 0 {
            if bits & POSITIVE == 0 {
                return Err(XrpError::SerializationError("negative drops".into()));
            }
            return Ok((Amount::Drops(bits & !POSITIVE), 8));
        }
        let rest = data
            .get(8..48)
            .ok_or_else(|| XrpError::SerializationError("truncated issued amount".into()))?;
        let mut currency = [0u8; 20];
        currency.copy_from_slice(&rest[..20]);
        let mut issuer = [0u8; 20];
        issuer.copy_from_slice(&rest[20..]);
        let amount = Amount::Issued {
            value: IouValue::from_bits(bits)?,
            token: IssuedToken {
                currency: Currency::from_bytes(currency),
                issuer,
            },
        };
        Ok((amount, 48))
    }
}

/// Parses a rippled decimal string (`"10.5"`, `"-3"`, `"1.2e-7"`) into
/// base units, truncating below [`IOU_SCALE`]. Negative balances are
/// obligations of the holder and count as zero.
pub fn decimal_to_base_units(value: &str) -> Result<u128, XrpError> {
    let bad = || XrpError::InvalidAmount(format!("not a decimal: {value:?}"));
    let trimmed = value.trim();
    if trimmed.starts_with('-') {
        return Ok(0);
    }
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let (number, exp) = match unsigned.split_once(['e', 'E']) {
        Some((n, e)) => (n, e.parse::<i32>().map_err(|_| bad())?),
        None => (unsigned, 0),
    };
    let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(bad());
    }
    let digits: String = int_part.chars().chain(frac_part.chars()).collect();
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    let mantissa: u128 = digits.parse().map_err(|_| bad())?;
    let shift = exp - frac_part.len() as i32 + IOU_SCALE;
    if shift >= 0 {
        10u128
            .checked_pow(shift as u32)
            .and_then(|p| mantissa.checked_mul(p))
            .ok_or_else(|| XrpError::InvalidAmount(format!("{value} overflows")))
    } else {
        Ok(10u128.checked_pow((-shift) as u32).map_or(0, |p| mantissa / p))
    }
}
