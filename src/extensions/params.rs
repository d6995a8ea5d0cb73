//! Parameter validation helpers shared by the algorithm parsers.

use std::ops::RangeInclusive;

use crate::error::{Error, Result};
use crate::extensions::header::ParamValue;

/// LZ77 window sizes permitted by RFC 7692.
pub(crate) const WINDOW_BITS: RangeInclusive<u8> = 8..=15;

/// zlib memory levels.
pub(crate) const MEM_LEVELS: RangeInclusive<u8> = 1..=9;

/// bzip2 block-size levels.
pub(crate) const COMPRESS_LEVELS: RangeInclusive<u8> = 1..=9;

/// The single value of a parameter, rejecting repeats.
pub(crate) fn single<'a>(
    extension: &str,
    name: &str,
    values: &'a [ParamValue],
) -> Result<&'a ParamValue> {
    match values {
        [value] => Ok(value),
        [] => Err(Error::Parse(format!(
            "parameter '{name}' of '{extension}' has no value slot"
        ))),
        _ => Err(Error::Parse(format!(
            "multiple occurrences of parameter '{name}' in '{extension}'"
        ))),
    }
}

/// Require a parameter to appear without a value.
pub(crate) fn flag(extension: &str, name: &str, values: &[ParamValue]) -> Result<()> {
    match single(extension, name, values)? {
        ParamValue::Present => Ok(()),
        ParamValue::Token(v) => Err(Error::Parse(format!(
            "parameter '{name}' of '{extension}' takes no value, got '{v}'"
        ))),
    }
}

/// Parse a decimal value within `range`.
pub(crate) fn int_value(
    extension: &str,
    name: &str,
    value: &ParamValue,
    range: RangeInclusive<u8>,
) -> Result<u8> {
    let text = value.as_str().ok_or_else(|| {
        Error::Parse(format!(
            "parameter '{name}' of '{extension}' requires a value"
        ))
    })?;
    // No sign, no leading zeros (RFC 7692 §7.1.2).
    let canonical = !text.is_empty()
        && text.bytes().all(|b| b.is_ascii_digit())
        && !(text.len() > 1 && text.starts_with('0'));
    let parsed = canonical.then(|| text.parse::<u8>().ok()).flatten();
    match parsed {
        Some(v) if range.contains(&v) => Ok(v),
        _ => Err(Error::Parse(format!(
            "invalid value '{text}' for parameter '{name}' of '{extension}' (expected {}-{})",
            range.start(),
            range.end()
        ))),
    }
}

/// `int_value` on the single value of a parameter.
pub(crate) fn single_int(
    extension: &str,
    name: &str,
    values: &[ParamValue],
    range: RangeInclusive<u8>,
) -> Result<u8> {
    int_value(extension, name, single(extension, name, values)?, range)
}

pub(crate) fn unknown(extension: &str, name: &str) -> Error {
    Error::Parse(format!("illegal parameter '{name}' for '{extension}'"))
}

/// Range check for constructor arguments; `0` is allowed as "unset" when
/// `allow_unset` is true.
pub(crate) fn check_range(
    what: &str,
    value: u8,
    range: RangeInclusive<u8>,
    allow_unset: bool,
) -> Result<()> {
    if (allow_unset && value == 0) || range.contains(&value) {
        Ok(())
    } else {
        Err(Error::Configuration(format!(
            "invalid value {value} for {what} - permissible values {}{}-{}",
            if allow_unset { "0, " } else { "" },
            range.start(),
            range.end()
        )))
    }
}

/// Map `0` ("unset") to `None`.
pub(crate) const fn nonzero(value: u8) -> Option<u8> {
    if value == 0 { None } else { Some(value) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(s: &str) -> ParamValue {
        ParamValue::Token(s.to_string())
    }

    #[test]
    fn test_int_value_bounds() {
        assert_eq!(int_value("x", "p", &token("8"), WINDOW_BITS).unwrap(), 8);
        assert_eq!(int_value("x", "p", &token("15"), WINDOW_BITS).unwrap(), 15);
        assert!(int_value("x", "p", &token("7"), WINDOW_BITS).is_err());
        assert!(int_value("x", "p", &token("16"), WINDOW_BITS).is_err());
    }

    #[test]
    fn test_int_value_rejects_noise() {
        for bad in ["", "09", "+9", "-9", "9a", "999"] {
            assert!(int_value("x", "p", &token(bad), WINDOW_BITS).is_err(), "{bad}");
        }
        assert!(int_value("x", "p", &ParamValue::Present, WINDOW_BITS).is_err());
    }

    #[test]
    fn test_single_rejects_repeats() {
        let values = [ParamValue::Present, ParamValue::Present];
        assert!(single("x", "p", &values).is_err());
        assert!(flag("x", "p", &values[..1]).is_ok());
        assert!(flag("x", "p", &[token("1")]).is_err());
    }

    #[test]
    fn test_check_range() {
        assert!(check_range("bits", 0, WINDOW_BITS, true).is_ok());
        assert!(check_range("bits", 0, WINDOW_BITS, false).is_err());
        assert!(matches!(
            check_range("bits", 16, WINDOW_BITS, true),
            Err(Error::Configuration(_))
        ));
    }
}
