// src/amount.rs
//! Minor-unit token amounts and their display form.
//!
//! Amounts arrive as decimal `Uint128` strings. Scaling by `10^decimals` is
//! done on the digit string, so the result is exact for the whole `u128`
//! range and any decimal count.

use std::fmt;

use rust_decimal::Decimal;

use crate::error::FormatError;

pub const GROUP_SEPARATOR: char = ',';
pub const DECIMAL_SEPARATOR: char = '.';

/// Raw integer amount together with the precision it is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenAmount {
    raw: u128,
    decimals: u8,
}

impl TokenAmount {
    pub fn new(raw: u128, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    /// Parse a minor-unit amount string. Surrounding whitespace is ignored;
    /// signs, separators or anything else non-numeric is rejected.
    pub fn parse(raw: &str, decimals: u8) -> Result<Self, FormatError> {
        let digits = raw.trim();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FormatError::InvalidAmount(raw.to_string()));
        }

        let value = digits
            .parse::<u128>()
            .map_err(|_| FormatError::AmountOverflow(raw.to_string()))?;

        Ok(Self::new(value, decimals))
    }

    pub fn raw(&self) -> u128 {
        self.raw
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Integer digits and fractional digits (trailing zeros trimmed).
    fn split(&self) -> (String, String) {
        let digits = self.raw.to_string();
        let scale = self.decimals as usize;

        let (int_part, frac_part) = if digits.len() > scale {
            let (i, f) = digits.split_at(digits.len() - scale);
            (i.to_string(), f.to_string())
        } else {
            let mut frac = "0".repeat(scale - digits.len());
            frac.push_str(&digits);
            ("0".to_string(), frac)
        };

        (int_part, frac_part.trim_end_matches('0').to_string())
    }

    /// Value as a `Decimal`, when it fits its 96-bit mantissa and 28-digit scale.
    pub fn to_decimal(&self) -> Option<Decimal> {
        let mantissa = i128::try_from(self.raw).ok()?;
        Decimal::try_from_i128_with_scale(mantissa, u32::from(self.decimals))
            .ok()
            .map(|d| d.normalize())
    }

    /// Display string followed by a space and the unit label.
    pub fn with_denom(&self, denom: &str) -> String {
        format!("{self} {denom}")
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (int_part, frac_part) = self.split();
        f.write_str(&group_thousands(&int_part))?;
        if !frac_part.is_empty() {
            write!(f, "{DECIMAL_SEPARATOR}{frac_part}")?;
        }
        Ok(())
    }
}

/// Insert a group separator every three digits, counting from the right.
pub fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(GROUP_SEPARATOR);
        }
        out.push(c);
    }
    out
}

/// `raw / 10^decimals`, grouped, with at most `decimals` fractional digits,
/// followed by the unit label.
pub fn normalize(raw: &str, decimals: u8, denom: &str) -> Result<String, FormatError> {
    Ok(TokenAmount::parse(raw, decimals)?.with_denom(denom))
}
