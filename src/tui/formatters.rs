// SPDX-FileCopyrightText: 2025 The downdeck Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::theme;
use ratatui::prelude::Constraint;
use ratatui::prelude::Direction;
use ratatui::prelude::Layout;
use ratatui::prelude::Rect;
use ratatui::style::{Color, Style};
use std::time::Duration;

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;
    const TB: u64 = 1024 * GB;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes < TB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    }
}

pub fn format_speed(bytes_per_second: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_second))
}

/// `None` means the rate is zero and the remaining time is unknowable.
pub fn format_eta(eta: Option<Duration>) -> String {
    let duration = match eta {
        None => return "∞".to_string(),
        Some(d) => d,
    };
    if duration.as_secs() == 0 {
        return "Done".to_string();
    }

    let mut secs = duration.as_secs();

    let days = secs / (24 * 3600);
    secs %= 24 * 3600;
    let hours = secs / 3600;
    secs %= 3600;
    let minutes = secs / 60;
    let seconds = secs % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 && days == 0 {
        parts.push(format!("{}m", minutes));
    }
    if seconds > 0 && days == 0 && hours == 0 {
        parts.push(format!("{}s", seconds));
    }

    parts.join(" ")
}

pub fn truncate_with_ellipsis(s: &str, max_len: usize) -> String {
    if s.chars().count() > max_len {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    } else {
        s.to_string()
    }
}

pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

pub fn address_color(address: &str) -> Color {
    let colors = [
        theme::ROSEWATER,
        theme::FLAMINGO,
        theme::PINK,
        theme::MAUVE,
        theme::RED,
        theme::MAROON,
        theme::PEACH,
        theme::YELLOW,
        theme::GREEN,
        theme::TEAL,
        theme::SKY,
        theme::SAPPHIRE,
        theme::BLUE,
        theme::LAVENDER,
    ];

    let hash = address
        .as_bytes()
        .iter()
        .fold(0u32, |acc, &b| acc.wrapping_add(b as u32));

    colors[hash as usize % colors.len()]
}

pub fn speed_to_style(speed_bps: u64) -> Style {
    if speed_bps == 0 {
        Style::default()
    } else if speed_bps < 50 * 1024 {
        Style::default().fg(theme::SKY)
    } else if speed_bps < 500 * 1024 {
        Style::default().fg(theme::GREEN)
    } else if speed_bps < 2 * 1024 * 1024 {
        Style::default().fg(theme::YELLOW)
    } else if speed_bps < 10 * 1024 * 1024 {
        Style::default().fg(theme::PEACH)
    } else if speed_bps < 30 * 1024 * 1024 {
        Style::default().fg(theme::MAROON)
    } else if speed_bps < 80 * 1024 * 1024 {
        Style::default().fg(theme::RED)
    } else {
        Style::default().fg(theme::FLAMINGO)
    }
}

/// Rounds a chart ceiling up to the next "nice" value so the y-axis does not
/// jitter with every sample.
pub fn nice_upper_bound(value: f64) -> f64 {
    if value <= 0.0 {
        return 1.0;
    }

    let exponent = value.log10().floor();
    let power_of_10 = 10.0_f64.powf(exponent);
    let normalized = value / power_of_10;

    let nice_multiplier = if normalized < 1.0 {
        1.0
    } else if normalized < 1.5 {
        1.5
    } else if normalized < 2.0 {
        2.0
    } else if normalized < 2.5 {
        2.5
    } else if normalized < 3.0 {
        3.0
    } else if normalized < 4.0 {
        4.0
    } else if normalized < 5.0 {
        5.0
    } else if normalized < 6.0 {
        6.0
    } else if normalized < 8.0 {
        8.0
    } else {
        10.0
    };

    nice_multiplier * power_of_10
}
