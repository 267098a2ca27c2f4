//! Calculation report rendering

use super::messages::ReportLabels;
use crate::stats::ErrorBudget;

/// Format `value` with `digits` significant figures, `%g` style
///
/// Fixed notation is used when the decimal exponent is in `-4..digits`,
/// scientific notation otherwise. Trailing zeros are removed.
///
/// ```
/// use labbot_engine::dialogue::format_general;
///
/// assert_eq!(format_general(10.15, 6), "10.15");
/// assert_eq!(format_general(0.0000123456789, 6), "1.23457e-05");
/// assert_eq!(format_general(1234567.0, 6), "1.23457e+06");
/// ```
pub fn format_general(value: f64, digits: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let precision = digits.max(1);
    let scientific = format!("{:.*e}", precision - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (precision as i32 - 1 - exponent) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// Format `value` with the fewest digits that read back exactly
///
/// Fixed notation keeps a `.0` on whole numbers while the decimal exponent is
/// in `-4..16`; outside that range the exponent is signed and at least two
/// digits, as in `1e+16` or `2.5e-05`.
pub fn format_shortest(value: f64) -> String {
    if !value.is_finite() {
        return format_general(value, 1);
    }

    let sign = if value.is_sign_negative() { "-" } else { "" };
    let scientific = format!("{:e}", value.abs());
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if !(-4..16).contains(&exponent) {
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        return format!(
            "{}{}e{}{:02}",
            sign,
            mantissa,
            exp_sign,
            exponent.unsigned_abs()
        );
    }

    let digits = mantissa.replace('.', "");
    let body = if exponent < 0 {
        format!("0.{}{}", "0".repeat((-exponent - 1) as usize), digits)
    } else {
        let int_len = exponent as usize + 1;
        if digits.len() <= int_len {
            format!("{}{}.0", digits, "0".repeat(int_len - digits.len()))
        } else {
            format!("{}.{}", &digits[..int_len], &digits[int_len..])
        }
    };

    format!("{}{}", sign, body)
}

/// Render the report lines for a computed error budget
///
/// The line set is fixed: n, mean, sample standard deviation, standard
/// error, Δ_stat, Δ_instr (only when used), Δ, relative error, and the final
/// `x = x̄ ± Δ` answer.
pub fn render(budget: &ErrorBudget, labels: &ReportLabels, digits: usize) -> Vec<String> {
    let fmt = |x: f64| format_general(x, digits);
    let summary = &budget.summary;

    let mut lines = vec![
        labels.title.to_string(),
        format!("- n = {}", summary.n),
        format!("- {} = {}", labels.mean, fmt(summary.mean)),
        format!("- {} = {}", labels.stddev, fmt(summary.stddev)),
        format!("- {} = {}", labels.std_error, fmt(summary.std_error)),
        format!("- {} = {}", labels.delta_stat, fmt(budget.delta_stat)),
    ];

    match budget.instrument_error {
        Some(instr) => {
            lines.push(format!("- {} = {}", labels.delta_instr, fmt(instr)));
            lines.push(format!(
                "- {} = {}",
                labels.delta_combined,
                fmt(budget.delta_total)
            ));
        }
        None => lines.push(format!(
            "- {} = {} {}",
            labels.delta_total,
            fmt(budget.delta_total),
            labels.without_instrument
        )),
    }

    lines.push(format!("- {} = {} %", labels.relative, fmt(budget.rel_percent)));
    lines.push(String::new());
    lines.push(format!(
        "{} x = {} ± {}",
        labels.answer,
        fmt(summary.mean),
        fmt(budget.delta_total)
    ));

    lines
}
