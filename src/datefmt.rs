//! Formatting of .NET-style custom date/time patterns (`yyyy-MM-dd`,
//! `H:m:s.ff tt`, ...), as used inside path template tokens and for the
//! console timestamp.

use chrono::{DateTime, Datelike, Offset, TimeZone, Timelike};
use std::fmt::Write;

const MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

const WEEKDAYS: [&str; 7] = [
    "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
];

/// Format `dt` with a .NET custom date/time format string.
///
/// Recognized specifiers: `y`, `M`, `d`, `H`, `h`, `m`, `s`, `f`, `F`, `t`
/// and `z` in their repeated forms, quoted literals (`'..'` or `".."`),
/// `\` escapes and the single-specifier `%` prefix. Any other character is
/// copied as-is.
pub fn format<Tz: TimeZone>(dt: &DateTime<Tz>, pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' => {
                i += 1;
                while i < chars.len() && chars[i] != c {
                    out.push(chars[i]);
                    i += 1;
                }
                i += 1;
            }
            '\\' => {
                if let Some(next) = chars.get(i + 1) {
                    out.push(*next);
                }
                i += 2;
            }
            '%' => i += 1,
            'y' | 'M' | 'd' | 'H' | 'h' | 'm' | 's' | 'f' | 'F' | 't' | 'z' => {
                let mut run = 1;
                while i + run < chars.len() && chars[i + run] == c {
                    run += 1;
                }
                write_specifier(&mut out, dt, c, run);
                i += run;
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }

    out
}

fn write_specifier<Tz: TimeZone>(out: &mut String, dt: &DateTime<Tz>, c: char, run: usize) {
    // Writing into a String cannot fail.
    let _ = match (c, run) {
        ('y', 1) => write!(out, "{}", dt.year() % 100),
        ('y', 2) => write!(out, "{:02}", dt.year() % 100),
        ('y', n) => write!(out, "{:0width$}", dt.year(), width = n),

        ('M', 1) => write!(out, "{}", dt.month()),
        ('M', 2) => write!(out, "{:02}", dt.month()),
        ('M', 3) => out.write_str(&MONTHS[dt.month0() as usize][..3]),
        ('M', _) => out.write_str(MONTHS[dt.month0() as usize]),

        ('d', 1) => write!(out, "{}", dt.day()),
        ('d', 2) => write!(out, "{:02}", dt.day()),
        ('d', 3) => out.write_str(&WEEKDAYS[dt.weekday().num_days_from_monday() as usize][..3]),
        ('d', _) => out.write_str(WEEKDAYS[dt.weekday().num_days_from_monday() as usize]),

        ('H', 1) => write!(out, "{}", dt.hour()),
        ('H', _) => write!(out, "{:02}", dt.hour()),
        ('h', 1) => write!(out, "{}", dt.hour12().1),
        ('h', _) => write!(out, "{:02}", dt.hour12().1),
        ('m', 1) => write!(out, "{}", dt.minute()),
        ('m', _) => write!(out, "{:02}", dt.minute()),
        ('s', 1) => write!(out, "{}", dt.second()),
        ('s', _) => write!(out, "{:02}", dt.second()),

        ('f', n) => out.write_str(&fraction(dt, n)),
        ('F', n) => out.write_str(fraction(dt, n).trim_end_matches('0')),

        ('t', 1) => out.write_str(if dt.hour12().0 { "P" } else { "A" }),
        ('t', _) => out.write_str(if dt.hour12().0 { "PM" } else { "AM" }),

        ('z', n) => {
            let seconds = dt.offset().fix().local_minus_utc();
            let sign = if seconds < 0 { '-' } else { '+' };
            let hours = seconds.abs() / 3600;
            let minutes = (seconds.abs() % 3600) / 60;
            match n {
                1 => write!(out, "{}{}", sign, hours),
                2 => write!(out, "{}{:02}", sign, hours),
                _ => write!(out, "{}{:02}:{:02}", sign, hours, minutes),
            }
        }

        _ => Ok(()),
    };
}

/// First `digits` digits (capped at 7) of the sub-second part.
fn fraction<Tz: TimeZone>(dt: &DateTime<Tz>, digits: usize) -> String {
    let digits = digits.min(7);
    let nanos = dt.nanosecond() % 1_000_000_000;
    let scaled = nanos / 10u32.pow(9 - digits as u32);
    format!("{:0width$}", scaled, width = digits)
}
