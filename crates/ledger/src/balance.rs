//! Native-token balance conversion.
//!
//! Ledger balances arrive as integers in the smallest unit. [`convert`]
//! scales them by 10^18 without going through floating point, so threshold
//! checks are exact and the rendered value is stable.

use serde::{Deserialize, Serialize};
use std::fmt;
use streamgate_types::U256;

/// Decimal places of the native token.
pub const DECIMALS: usize = 18;

/// Significant digits used when rendering a balance.
pub const DISPLAY_PRECISION: usize = 10;

const UNIT: u64 = 1_000_000_000_000_000_000;

/// Convert an amount in the smallest unit into a whole-token [`Balance`].
pub fn convert(amount: U256) -> Balance {
    Balance { raw: amount }
}

/// A balance scaled by 10^18.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Balance {
    raw: U256,
}

impl Balance {
    /// Amount in the smallest unit.
    pub fn raw(&self) -> U256 {
        self.raw
    }

    /// Whole tokens, fractional part discarded.
    pub fn whole_units(&self) -> U256 {
        self.raw / U256::from(UNIT)
    }

    /// `true` when the balance is strictly below `minimum` whole tokens.
    pub fn is_below(&self, minimum: u64) -> bool {
        self.raw < U256::from(minimum) * U256::from(UNIT)
    }

    /// Full-precision decimal rendering (`86.544738311`).
    pub fn to_exact_string(&self) -> String {
        let digits = self.raw.to_string();
        if digits.len() <= DECIMALS {
            let fraction = format!("{:0>width$}", digits, width = DECIMALS);
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                "0".to_string()
            } else {
                format!("0.{}", fraction)
            }
        } else {
            let (whole, fraction) = digits.split_at(digits.len() - DECIMALS);
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                whole.to_string()
            } else {
                format!("{}.{}", whole, fraction)
            }
        }
    }

    /// Lossy conversion for display arithmetic.
    pub fn to_f64(&self) -> f64 {
        self.to_exact_string().parse().unwrap_or(f64::MAX)
    }
}

/// Renders with [`DISPLAY_PRECISION`] significant digits, switching to
/// exponent notation below 1e-4 and from 1e10 upwards.
impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_significant(self.raw, DECIMALS, DISPLAY_PRECISION))
    }
}

/// Format `raw * 10^-decimals` with at most `precision` significant digits.
fn format_significant(raw: U256, decimals: usize, precision: usize) -> String {
    if raw.is_zero() {
        return "0".to_string();
    }

    let mut digits = raw.to_string().into_bytes();
    // value = 0.<digits> * 10^exp
    let mut exp = digits.len() as i64 - decimals as i64;

    if digits.len() > precision {
        let round_up = match digits[precision] {
            b'5' => {
                let exact_half = digits[precision + 1..].iter().all(|&d| d == b'0');
                !exact_half || (digits[precision - 1] - b'0') % 2 == 1
            }
            d => d > b'5',
        };
        digits.truncate(precision);

        if round_up {
            let mut i = precision;
            loop {
                if i == 0 {
                    digits.insert(0, b'1');
                    digits.truncate(precision);
                    exp += 1;
                    break;
                }
                i -= 1;
                if digits[i] == b'9' {
                    digits[i] = b'0';
                } else {
                    digits[i] += 1;
                    break;
                }
            }
        }
    }

    while digits.last() == Some(&b'0') {
        digits.pop();
    }

    let digits = String::from_utf8(digits).unwrap_or_default();
    let sci_exp = exp - 1;

    if sci_exp < -4 || sci_exp >= precision as i64 {
        let (first, rest) = digits.split_at(1);
        let sign = if sci_exp < 0 { '-' } else { '+' };
        let mantissa = if rest.is_empty() {
            first.to_string()
        } else {
            format!("{}.{}", first, rest)
        };
        return format!("{}e{}{:02}", mantissa, sign, sci_exp.abs());
    }

    let len = digits.len() as i64;
    if exp <= 0 {
        format!("0.{}{}", "0".repeat((-exp) as usize), digits)
    } else if exp >= len {
        format!("{}{}", digits, "0".repeat((exp - len) as usize))
    } else {
        let (whole, fraction) = digits.split_at(exp as usize);
        format!("{}.{}", whole, fraction)
    }
}
