//! Number rendering shared by the wire, storage and signing forms.
//!
//! Two renderings are used: a fixed six-fraction-digit form for gauges in
//! paths, display strings and the signing input, and a shortest form with an
//! exponent switch for plaintext reads.

/// Renders a gauge value with exactly six fraction digits (`21.5` -> `21.500000`).
pub fn fixed(value: f64) -> String {
    format!("{value:.6}")
}

/// Renders a gauge value in shortest form.
///
/// Scientific notation is used when the decimal exponent is below `-4` or at
/// least `6`; the exponent always carries a sign and at least two digits.
///
/// ```
/// use metrik_common::format::shortest;
///
/// assert_eq!(shortest(21.5), "21.5");
/// assert_eq!(shortest(22.0), "22");
/// assert_eq!(shortest(1234567.0), "1.234567e+06");
/// assert_eq!(shortest(0.00001), "1e-05");
/// ```
pub fn shortest(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let sci = format!("{value:e}");
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return value.to_string();
    };
    let exp: i32 = exp.parse().unwrap_or(0);

    if (-4..6).contains(&exp) {
        return value.to_string();
    }

    let sign = if exp < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exp.abs())
}
