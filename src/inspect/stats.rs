//! inspect/stats — two-line transaction stats summary.
//!
//! Layout (three fields per line, each left-padded to 20 columns):
//!   [db] pg(<page_count>/<page_alloc>) cur(<cursor_count>) node(<node_count>/<node_deref>)
//!        rebal(<n>/<t>) spill(<n>/<t>) w(<n>/<t>)
//!
//! Durations are shown in unit-suffixed form with the fractional part
//! stripped for display only; the underlying values stay untouched.

use std::io::Write;
use std::time::Duration;

use anyhow::Result;

use crate::engine::{Engine, TxStats};

/// Render the stats summary for an open engine.
pub fn render_stats<E: Engine, W: Write>(engine: &E, out: &mut W) -> Result<()> {
    let stats = engine.stats();
    write_stats(&stats, out)
}

/// Render one stats snapshot. Split out so the exact format is testable
/// against hand-built counter values.
pub fn write_stats<W: Write>(stats: &TxStats, out: &mut W) -> Result<()> {
    writeln!(
        out,
        "[db] {:<20} {:<20} {:<20}",
        format!("pg({}/{})", stats.page_count, stats.page_alloc),
        format!("cur({})", stats.cursor_count),
        format!("node({}/{})", stats.node_count, stats.node_deref),
    )?;
    writeln!(
        out,
        "     {:<20} {:<20} {:<20}",
        format!(
            "rebal({}/{})",
            stats.rebalance_count,
            trunc_duration(&format_duration(stats.rebalance_time))
        ),
        format!(
            "spill({}/{})",
            stats.spill_count,
            trunc_duration(&format_duration(stats.spill_time))
        ),
        format!(
            "w({}/{})",
            stats.write_count,
            trunc_duration(&format_duration(stats.write_time))
        ),
    )?;
    Ok(())
}

/// Unit-suffixed duration rendering.
///
/// Zero renders as "0s". Sub-second values render in milliseconds,
/// everything else in seconds, with trailing zeros of the fraction
/// trimmed: 3.7ms, 0.9ms, 2s, 1.25s.
pub fn format_duration(d: Duration) -> String {
    let ns = d.as_nanos();
    if ns == 0 {
        return "0s".to_string();
    }
    if ns >= 1_000_000_000 {
        with_fraction(ns, 1_000_000_000, 9, "s")
    } else {
        with_fraction(ns, 1_000_000, 6, "ms")
    }
}

fn with_fraction(ns: u128, scale: u128, digits: usize, unit: &str) -> String {
    let whole = ns / scale;
    let rem = ns % scale;
    if rem == 0 {
        return format!("{}{}", whole, unit);
    }
    let mut frac = format!("{:0width$}", rem, width = digits);
    while frac.ends_with('0') {
        frac.pop();
    }
    format!("{}.{}{}", whole, frac, unit)
}

/// Strip the fractional component of a rendered duration.
///
/// Scoped to the exact grammar `<digits>[.<digits>]<suffix>`:
/// "12.345ms" -> "12ms", "0s" -> "0s". Anything whose head is not a
/// plain digit run (e.g. "1m3.5s") passes through unchanged.
pub fn trunc_duration(s: &str) -> String {
    let Some(dot) = s.find('.') else {
        return s.to_string();
    };
    let (head, tail) = s.split_at(dot);
    if head.is_empty() || !head.bytes().all(|b| b.is_ascii_digit()) {
        return s.to_string();
    }
    // tail = "." + fraction digits + suffix
    let frac_len = tail[1..]
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(tail.len() - 1);
    if frac_len == 0 {
        return s.to_string();
    }
    format!("{}{}", head, &tail[1 + frac_len..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_format_units() {
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_micros(3700)), "3.7ms");
        assert_eq!(format_duration(Duration::from_micros(900)), "0.9ms");
        assert_eq!(format_duration(Duration::from_millis(12)), "12ms");
        assert_eq!(format_duration(Duration::from_micros(12_345)), "12.345ms");
        assert_eq!(format_duration(Duration::from_secs(2)), "2s");
        assert_eq!(format_duration(Duration::from_millis(1250)), "1.25s");
    }

    #[test]
    fn duration_trunc_strips_fraction_only() {
        assert_eq!(trunc_duration("12.345ms"), "12ms");
        assert_eq!(trunc_duration("3.7ms"), "3ms");
        assert_eq!(trunc_duration("0.9ms"), "0ms");
        assert_eq!(trunc_duration("0s"), "0s");
        assert_eq!(trunc_duration("42ms"), "42ms");
        // head is not a plain digit run -> untouched
        assert_eq!(trunc_duration("1m3.5s"), "1m3.5s");
    }

    #[test]
    fn stats_lines_exact() {
        let stats = TxStats {
            page_count: 12,
            page_alloc: 20,
            cursor_count: 1,
            node_count: 5,
            node_deref: 0,
            rebalance_count: 2,
            rebalance_time: Duration::from_micros(3700),
            spill_count: 1,
            spill_time: Duration::from_micros(900),
            write_count: 4,
            write_time: Duration::from_micros(11_200),
        };
        let mut out = Vec::new();
        write_stats(&stats, &mut out).expect("write stats");
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            format!("[db] {:<20} {:<20} {:<20}", "pg(12/20)", "cur(1)", "node(5/0)")
        );
        assert_eq!(
            lines[1],
            format!(
                "     {:<20} {:<20} {:<20}",
                "rebal(2/3ms)",
                "spill(1/0ms)",
                "w(4/11ms)"
            )
        );
    }
}
