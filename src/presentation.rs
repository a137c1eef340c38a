//! Pure formatting helpers consumed by the presentation layer.

/// Converts an integer amount in the smallest denomination into a decimal
/// string with `decimals` places of precision.
///
/// Works on decimal digit strings rather than floats, so amounts of any
/// magnitude representable in a `u128` format exactly. Trailing zeros in the
/// fraction are trimmed, keeping at least one digit; the canonical zero is
/// `"0.0"` (or `"0"` when `decimals` is zero).
pub fn format_balance(raw: u128, decimals: u32) -> String {
    let mut digits = raw.to_string();
    if decimals == 0 {
        return digits;
    }

    let decimals = decimals as usize;
    if digits.len() <= decimals {
        let padding = decimals - digits.len() + 1;
        digits = format!("{}{}", "0".repeat(padding), digits);
    }

    let split = digits.len() - decimals;
    let integer = &digits[..split];
    let fraction = digits[split..].trim_end_matches('0');
    let fraction = if fraction.is_empty() { "0" } else { fraction };

    format!("{integer}.{fraction}")
}

/// Renders the authorization policy as `"{threshold}/{owner_count}"`. Both
/// values are opaque display integers; nothing ever parses the result.
pub fn format_ratio(threshold: u32, owner_count: usize) -> String {
    format!("{threshold}/{owner_count}")
}

/// Formats a balance together with its token symbol, e.g. `"1.5 ETH"`. An
/// empty symbol yields the bare amount.
pub fn format_balance_with_symbol(raw: u128, decimals: u32, symbol: &str) -> String {
    let amount = format_balance(raw, decimals);
    if symbol.is_empty() {
        amount
    } else {
        format!("{amount} {symbol}")
    }
}
