//! # Fixed-Point Units
//!
//! Decimal strings from form fields to integer base units.

use primitive_types::U256;

/// Parse a non-negative decimal string into base units with `decimals`
/// fractional digits. Rejects more fractional digits than `decimals`.
///
/// `parse_units("12.5", 3) == 12_500`
pub fn parse_units(raw: &str, decimals: u32) -> Result<U256, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("empty amount".to_string());
    }
    if raw.starts_with('-') {
        return Err(format!("negative amount: {raw}"));
    }

    let (whole, frac) = match raw.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (raw, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(format!("not a number: {raw}"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("not a number: {raw}"));
    }
    if frac.len() > decimals as usize {
        return Err(format!("more than {decimals} decimal places: {raw}"));
    }

    let scale = U256::from(10u64).pow(U256::from(decimals));
    let whole_units = if whole.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(whole).map_err(|_| format!("amount too large: {raw}"))?
    };

    let mut padded = frac.to_string();
    padded.extend(std::iter::repeat('0').take(decimals as usize - frac.len()));
    let frac_units = if padded.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(&padded).map_err(|_| format!("not a number: {raw}"))?
    };

    whole_units
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(|| format!("amount too large: {raw}"))
}

/// Parse a positive whole number.
pub fn parse_positive_integer(raw: &str) -> Result<U256, String> {
    let value = parse_units(raw, 0)?;
    if value.is_zero() {
        return Err("must be greater than zero".to_string());
    }
    Ok(value)
}

/// Percentage to basis points, truncating below one basis point.
///
/// `percent_to_bps("7.259") == 725`
pub fn percent_to_bps(raw: &str) -> Result<U256, String> {
    let raw = raw.trim();
    let truncated = match raw.split_once('.') {
        Some((whole, frac)) if frac.chars().count() > 2 => {
            if !frac.chars().all(|c| c.is_ascii_digit()) {
                return Err(format!("not a number: {raw}"));
            }
            format!("{whole}.{}", &frac[..2])
        }
        _ => raw.to_string(),
    };
    let bps = parse_units(&truncated, 2)?;
    if bps > U256::from(10_000u64) {
        return Err(format!("yield above 100%: {raw}"));
    }
    Ok(bps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units_scales() {
        assert_eq!(parse_units("12.5", 3).unwrap(), U256::from(12_500u64));
        assert_eq!(parse_units("7", 3).unwrap(), U256::from(7_000u64));
        assert_eq!(parse_units(".25", 2).unwrap(), U256::from(25u64));
        assert_eq!(
            parse_units("1.5", 18).unwrap(),
            U256::from(1_500_000_000_000_000_000u64)
        );
    }

    #[test]
    fn test_parse_units_rejects_garbage() {
        assert!(parse_units("", 3).is_err());
        assert!(parse_units("-1", 3).is_err());
        assert!(parse_units("1.2345", 3).is_err());
        assert!(parse_units("1e5", 3).is_err());
        assert!(parse_units(".", 3).is_err());
    }

    #[test]
    fn test_parse_positive_integer() {
        assert_eq!(parse_positive_integer("1000").unwrap(), U256::from(1000u64));
        assert!(parse_positive_integer("0").is_err());
        assert!(parse_positive_integer("1.5").is_err());
    }

    #[test]
    fn test_percent_to_bps_truncates() {
        assert_eq!(percent_to_bps("7.259").unwrap(), U256::from(725u64));
        assert_eq!(percent_to_bps("5").unwrap(), U256::from(500u64));
        assert!(percent_to_bps("150").is_err());
    }

    #[test]
    fn test_percent_to_bps_rejects_non_ascii_fraction() {
        assert!(percent_to_bps("6.5é").is_err());
        assert!(percent_to_bps("6.é5").is_err());
        assert!(percent_to_bps("6.٣٤٥").is_err());
        assert!(percent_to_bps("é").is_err());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn decimal_strings_scale_exactly(whole in any::<u64>(), frac in "[0-9]{1,18}") {
                let expected = U256::from(whole) * U256::exp10(18)
                    + U256::from_dec_str(&frac).unwrap() * U256::exp10(18 - frac.len());
                prop_assert_eq!(parse_units(&format!("{whole}.{frac}"), 18), Ok(expected));
            }
        }
    }
}
