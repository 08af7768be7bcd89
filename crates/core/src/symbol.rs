use crate::error::{Result, ScreenError};

/// Longest ticker accepted; covers share classes such as `BRK.B`.
pub const MAX_SYMBOL_LEN: usize = 12;

/// Trims and uppercases an underlying ticker, rejecting anything that could
/// not be a listed symbol.
///
/// # Errors
/// Returns [`ScreenError::InvalidRequest`] for empty, overlong or malformed input.
pub fn normalize_symbol(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ScreenError::invalid_request("symbol is required"));
    }
    if trimmed.len() > MAX_SYMBOL_LEN {
        return Err(ScreenError::invalid_request(format!(
            "symbol '{trimmed}' is longer than {MAX_SYMBOL_LEN} characters"
        )));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ScreenError::invalid_request(format!(
            "symbol '{trimmed}' contains unsupported characters"
        )));
    }
    if !trimmed.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(ScreenError::invalid_request(format!(
            "symbol '{trimmed}' has no letters"
        )));
    }
    Ok(trimmed.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_case_and_whitespace() {
        assert_eq!(normalize_symbol("  aapl ").unwrap(), "AAPL");
        assert_eq!(normalize_symbol("brk.b").unwrap(), "BRK.B");
    }

    #[test]
    fn test_rejects_malformed_symbols() {
        for raw in ["", "   ", "AAPL;DROP", "A B", "123", "ABCDEFGHIJKLM"] {
            let err = normalize_symbol(raw).unwrap_err();
            assert_eq!(err.kind(), "invalid_request", "input {raw:?}");
        }
    }
}
