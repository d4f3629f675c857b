use crate::datefmt;
use crate::record::{LogRecord, LogType};
use colored::{Color, Colorize};
use std::io::Write;

/// Timestamp layout of a console line, e.g. `14:7:9.12 PM`.
pub const TIME_FORMAT: &str = "H:m:s.ff tt";

/// Bracketed prefix for a type name: `[D]`, `[I]`, `[W]`, `[E]`, `[F]`.
/// Unknown names fall back to their first four characters.
pub fn prefix(type_name: &str) -> String {
    let short = match type_name {
        "Debug" => "D",
        "Info" => "I",
        "Warning" => "W",
        "Error" => "E",
        "Fatal" => "F",
        other => return format!("[{}]", other.chars().take(4).collect::<String>()),
    };
    format!("[{}]", short)
}

fn color(log_type: LogType) -> Color {
    match log_type {
        LogType::Debug => Color::BrightBlack,
        LogType::Info => Color::Green,
        LogType::Warning => Color::Yellow,
        LogType::Error => Color::Red,
        LogType::Fatal => Color::BrightWhite,
    }
}

/// Colorized console line for `record`.
pub fn render(record: &LogRecord) -> String {
    layout(record, true)
}

/// Same line as [`render`] without ANSI escapes.
pub fn render_plain(record: &LogRecord) -> String {
    layout(record, false)
}

fn layout(record: &LogRecord, paint: bool) -> String {
    let time = datefmt::format(&record.created_time(), TIME_FORMAT);
    let prefix = prefix(record.log_type.as_str());
    let place = record
        .exception
        .as_ref()
        .and_then(|exception| exception.place.as_ref())
        .map(|place| format!(" <{}>", place))
        .unwrap_or_default();

    if !paint {
        return format!("{} {}{} {}", time, prefix, place, record.message);
    }

    let color = color(record.log_type);
    let prefix = match record.log_type {
        LogType::Fatal => prefix.as_str().color(color).on_red().bold(),
        _ => prefix.as_str().color(color).bold(),
    };
    format!(
        "{} {}{} {}",
        time.as_str().dimmed(),
        prefix,
        place.as_str().dimmed(),
        record.message.as_str().color(color)
    )
}

/// Write the rendered line to stdout. Write errors are ignored.
pub fn print(record: &LogRecord) {
    let line = render(record);
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout, "{}", line);
}
