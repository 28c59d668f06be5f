use chrono::Local;
use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

// Column widths for the aligned log layout.
const LEVEL_FIELD_WIDTH: usize = 8; // "[LEVEL]" column including padding
const TARGET_FIELD_WIDTH: usize = 26; // "module target" column including padding

/// Visible width of a string with simple ANSI escapes (\x1b[...m) stripped.
///
/// Needed so column alignment survives colored level labels.
fn visible_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut visible = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == 0x1b {
            // ESC detected, skip until 'm' or end
            i += 1;
            if i < bytes.len() && bytes[i] == b'[' {
                i += 1;
            }
            while i < bytes.len() {
                let b = bytes[i];
                i += 1;
                if b == b'm' {
                    break;
                }
            }
        } else {
            let first = bytes[i];
            let width = if first < 0x80 {
                1
            } else if first >> 5 == 0b110 {
                2
            } else if first >> 4 == 0b1110 {
                3
            } else if first >> 3 == 0b11110 {
                4
            } else {
                1
            };
            visible += 1;
            i += width;
        }
    }
    visible
}

/// Configures the process-wide logger.
///
/// Output format:
///
/// ```text
/// Aug 01 26 09:15:02 AM | [INFO]  | onasis_rs::services   | adapter paystack ready (4 tools)
/// ```
///
/// Level filtering follows `RUST_LOG` (default `info`); `NO_COLOR`
/// disables coloring and bolding. Call once at startup.
pub fn configure_logger() {
    let no_color = env::var("NO_COLOR").is_ok();

    let mut builder = Builder::new();
    builder.format(move |buf, record| {
        let level = record.level();
        let level_plain = level.to_string();

        // When colors are enabled the whole line is bold and the level is
        // colored; only the foreground is reset mid-line so bold holds.
        let (prefix, colored_level, suffix) = if no_color {
            (String::new(), level_plain.clone(), String::new())
        } else {
            let colored = match level {
                log::Level::Error => format!("\x1b[31m{}\x1b[39m", level_plain),
                log::Level::Warn => format!("\x1b[33m{}\x1b[39m", level_plain),
                log::Level::Info => format!("\x1b[32m{}\x1b[39m", level_plain),
                log::Level::Debug => format!("\x1b[34m{}\x1b[39m", level_plain),
                log::Level::Trace => format!("\x1b[35m{}\x1b[39m", level_plain),
            };
            ("\x1b[1m".to_string(), colored, "\x1b[0m".to_string())
        };

        let level_display = format!("[{}]", colored_level);
        let level_pad = LEVEL_FIELD_WIDTH.saturating_sub(visible_len(&level_display)).max(1);

        let target = record.target();
        let target_pad = TARGET_FIELD_WIDTH.saturating_sub(visible_len(target)).max(1);

        writeln!(
            buf,
            "{}{} | {}{}| {}{}| {}{}",
            prefix,
            Local::now().format("%b %d %y %I:%M:%S %p"),
            level_display,
            " ".repeat(level_pad),
            target,
            " ".repeat(target_pad),
            record.args(),
            suffix,
        )
    });

    if let Ok(spec) = env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    } else {
        builder.filter_level(LevelFilter::Info);
    }
    builder.init();
}
