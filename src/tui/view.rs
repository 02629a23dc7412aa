// SPDX-FileCopyrightText: 2025 The downdeck Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use ratatui::symbols::Marker;
use ratatui::{prelude::*, widgets::*};

use crate::app::{AppState, FocusPanel};
use crate::state::TransferPhase;
use crate::theme;
use crate::tui::formatters::*;

/// The peer table shows at most this many rows, picked by received bytes.
pub const PEER_TABLE_LIMIT: usize = 10;

const MIN_WIDTH: u16 = 40;
const MIN_HEIGHT: u16 = 12;

/// One full, atomic paint of the dashboard. Pure projection of `AppState`;
/// safe to call as often as the draw loop likes.
pub fn draw(f: &mut Frame, app_state: &AppState) {
    let area = f.area();

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        draw_too_small(f, area);
        return;
    }

    let rows = Layout::vertical([
        Constraint::Length(9),
        Constraint::Length(3),
        Constraint::Min(8),
        Constraint::Percentage(35),
    ])
    .split(area);

    let mid = Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[2]);
    let bottom = Layout::horizontal([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(rows[3]);

    draw_summary(f, app_state, rows[0]);
    draw_gauge(f, app_state, rows[1]);
    draw_speed_chart(f, app_state, mid[0]);
    draw_peer_table(f, app_state, mid[1]);
    draw_file_table(f, app_state, bottom[0]);
    draw_log(f, app_state, bottom[1]);

    if app_state.show_help {
        draw_help_popup(f);
    }
}

fn draw_too_small(f: &mut Frame, area: Rect) {
    f.render_widget(
        Paragraph::new("Window too small")
            .style(Style::default().fg(theme::RED).bg(theme::SURFACE0)),
        area,
    );
}

fn phase_style(phase: TransferPhase) -> Style {
    let color = match phase {
        TransferPhase::Initializing => theme::YELLOW,
        TransferPhase::Downloading => theme::BLUE,
        TransferPhase::Completed => theme::GREEN,
        TransferPhase::Failed => theme::RED,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

fn draw_summary(f: &mut Frame, app_state: &AppState, area: Rect) {
    let summary = &app_state.dashboard.summary;

    let name_width = area.width.saturating_sub(12) as usize;
    let lines = vec![
        Line::from(vec![
            Span::styled("Transfer: ", Style::default().fg(theme::SUBTEXT0)),
            Span::styled(
                truncate_with_ellipsis(&summary.name, name_width),
                Style::default().fg(theme::YELLOW).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled("Size:     ", Style::default().fg(theme::SUBTEXT0)),
            Span::styled(format_bytes(summary.total_size), Style::default().fg(theme::TEXT)),
        ]),
        Line::from(vec![
            Span::styled("Received: ", Style::default().fg(theme::SUBTEXT0)),
            Span::styled(format_bytes(summary.downloaded), Style::default().fg(theme::TEXT)),
        ]),
        Line::from(vec![
            Span::styled("Speed:    ", Style::default().fg(theme::SUBTEXT0)),
            Span::styled(
                format_speed(summary.rate_bps),
                speed_to_style(summary.rate_bps),
            ),
        ]),
        Line::from(vec![
            Span::styled("ETA:      ", Style::default().fg(theme::SUBTEXT0)),
            Span::styled(format_eta(summary.eta), Style::default().fg(theme::TEXT)),
        ]),
        Line::from(vec![
            Span::styled("Peers:    ", Style::default().fg(theme::SUBTEXT0)),
            Span::styled(summary.peer_count.to_string(), Style::default().fg(theme::TEXT)),
        ]),
        Line::from(vec![
            Span::styled("Status:   ", Style::default().fg(theme::SUBTEXT0)),
            Span::styled(summary.phase.label(), phase_style(summary.phase)),
        ]),
    ];

    let block = Block::default()
        .title(Span::styled("Transfer", Style::default().fg(theme::MAUVE)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::SURFACE2));

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_gauge(f: &mut Frame, app_state: &AppState, area: Rect) {
    let percent = app_state.dashboard.gauge_percent();
    let gauge = Gauge::default()
        .block(
            Block::default()
                .title(Span::styled("Progress", Style::default().fg(theme::MAUVE)))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme::SURFACE2)),
        )
        .gauge_style(Style::default().fg(theme::GREEN).bg(theme::SURFACE0))
        .label(format!("{}%", percent))
        .percent(percent);
    f.render_widget(gauge, area);
}

fn draw_speed_chart(f: &mut Frame, app_state: &AppState, area: Rect) {
    if area.width < 5 || area.height < 5 {
        return;
    }

    let history = &app_state.dashboard.rate_history;

    let points: Vec<(f64, f64)> = history
        .snapshot()
        .enumerate()
        .map(|(i, s)| (i as f64, s.mbps))
        .collect();

    let max_rate = points.iter().map(|&(_, y)| y).fold(0.0_f64, f64::max);
    let y_max = nice_upper_bound(max_rate);

    let datasets = vec![Dataset::default()
        .name("Download")
        .marker(Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(theme::BLUE).add_modifier(Modifier::BOLD))
        .data(&points)];

    let oldest = history
        .snapshot()
        .next()
        .map(|s| s.label.clone())
        .unwrap_or_else(|| "--:--".to_string());
    let x_labels = vec![
        Span::styled(oldest, Style::default().fg(theme::SUBTEXT0)),
        Span::styled("Now", Style::default().fg(theme::SUBTEXT0)),
    ];

    let y_labels = vec![
        Span::raw("0"),
        Span::styled(
            format!("{:.1} MB/s", y_max / 2.0),
            Style::default().fg(theme::SUBTEXT0),
        ),
        Span::styled(
            format!("{:.1} MB/s", y_max),
            Style::default().fg(theme::SUBTEXT0),
        ),
    ];

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .title(Span::styled("Speed History", Style::default().fg(theme::PEACH)))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme::SURFACE2)),
        )
        .x_axis(
            Axis::default()
                .style(Style::default().fg(theme::OVERLAY0))
                .bounds([0.0, history.capacity().saturating_sub(1) as f64])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(theme::OVERLAY0))
                .bounds([0.0, y_max])
                .labels(y_labels),
        )
        .legend_position(Some(LegendPosition::TopRight));

    f.render_widget(chart, area);
}

fn draw_peer_table(f: &mut Frame, app_state: &AppState, area: Rect) {
    if area.width < 2 || area.height < 2 {
        return;
    }

    let block = Block::default()
        .title(Span::styled(
            format!("Peers ({})", app_state.dashboard.summary.peer_count),
            Style::default().fg(theme::MAUVE),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::SURFACE2));

    let top = app_state.dashboard.top_peers(PEER_TABLE_LIMIT);
    if top.is_empty() {
        f.render_widget(
            Paragraph::new("No active peers")
                .style(Style::default().fg(theme::SURFACE2))
                .block(block),
            area,
        );
        return;
    }

    let header = Row::new(vec![
        Cell::from(Span::styled("Address", Style::default().fg(theme::YELLOW))),
        Cell::from(Span::styled("Proto", Style::default().fg(theme::YELLOW))),
        Cell::from(Span::styled("Received", Style::default().fg(theme::YELLOW))),
    ])
    .height(1);

    let rows = top.iter().map(|peer| {
        let row_color = if peer.bytes_received == 0 {
            theme::SURFACE1
        } else {
            address_color(&peer.address)
        };
        Row::new(vec![
            Cell::from(peer.address.clone()),
            Cell::from(peer.transport.clone()),
            Cell::from(format_bytes(peer.bytes_received)),
        ])
        .style(Style::default().fg(row_color))
    });

    let widths = [
        Constraint::Min(16),
        Constraint::Length(6),
        Constraint::Length(12),
    ];
    f.render_widget(Table::new(rows, widths).header(header).block(block), area);
}

fn draw_file_table(f: &mut Frame, app_state: &AppState, area: Rect) {
    if area.width < 2 || area.height < 2 {
        return;
    }

    let files = &app_state.dashboard.files;
    let focused = app_state.focus == FocusPanel::Files;

    let border_style = if focused {
        Style::default().fg(theme::MAUVE)
    } else {
        Style::default().fg(theme::SURFACE2)
    };

    let done = files.iter().filter(|f| f.done).count();
    let block = Block::default()
        .title(Span::styled(
            format!("Files ({}/{} done)", done, files.len()),
            Style::default().fg(theme::MAUVE),
        ))
        .borders(Borders::ALL)
        .border_style(border_style);

    let rows = files.iter().map(|file| {
        let (mark, mark_color, row_color) = if file.done {
            ("✔", theme::GREEN, theme::GREEN)
        } else {
            ("·", theme::SUBTEXT0, theme::TEXT)
        };
        Row::new(vec![
            Cell::from(Span::styled(mark, Style::default().fg(mark_color))),
            Cell::from(file.path.clone()),
            Cell::from(format_bytes(file.size)),
        ])
        .style(Style::default().fg(row_color))
    });

    let widths = [
        Constraint::Length(2),
        Constraint::Min(16),
        Constraint::Length(10),
    ];
    let table = Table::new(rows, widths)
        .block(block)
        .row_highlight_style(Style::default().add_modifier(Modifier::BOLD).fg(theme::YELLOW));

    let mut table_state = TableState::default();
    if focused && !files.is_empty() {
        table_state.select(Some(app_state.file_cursor.min(files.len() - 1)));
    }
    f.render_stateful_widget(table, area, &mut table_state);
}

fn draw_log(f: &mut Frame, app_state: &AppState, area: Rect) {
    if area.width < 2 || area.height < 2 {
        return;
    }

    let block = Block::default()
        .title(Span::styled("Log", Style::default().fg(theme::GREEN)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::SURFACE2));

    // Tail-follow: show the newest lines that fit.
    let visible = area.height.saturating_sub(2) as usize;
    let log = &app_state.dashboard.log;
    let items: Vec<ListItem> = log
        .iter()
        .skip(log.len().saturating_sub(visible))
        .map(|line| ListItem::new(Span::styled(line.as_str(), Style::default().fg(theme::SUBTEXT1))))
        .collect();

    f.render_widget(List::new(items).block(block), area);
}

fn draw_help_popup(f: &mut Frame) {
    let area = centered_rect(50, 50, f.area());
    f.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  q / Esc / Ctrl-C  ", Style::default().fg(theme::GREEN)),
            Span::styled("Quit", Style::default().fg(theme::SUBTEXT1)),
        ]),
        Line::from(vec![
            Span::styled("  Tab               ", Style::default().fg(theme::GREEN)),
            Span::styled("Focus file table", Style::default().fg(theme::SUBTEXT1)),
        ]),
        Line::from(vec![
            Span::styled("  ↑/↓ PgUp/PgDn     ", Style::default().fg(theme::GREEN)),
            Span::styled("Scroll files", Style::default().fg(theme::SUBTEXT1)),
        ]),
        Line::from(vec![
            Span::styled("  h                 ", Style::default().fg(theme::GREEN)),
            Span::styled("Toggle this help", Style::default().fg(theme::SUBTEXT1)),
        ]),
    ];

    let block = Block::default()
        .title(Span::styled("Help", Style::default().fg(theme::LAVENDER)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::LAVENDER));

    f.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TransferEvent;
    use crate::state::PeerSample;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn scenario_state() -> AppState {
        let mut app_state = AppState::new();
        app_state.dashboard.apply(TransferEvent::Started {
            name: "sample.iso".to_string(),
            total_size: 104_857_600,
            files: vec![
                ("a.bin".to_string(), 52_428_800),
                ("b.bin".to_string(), 52_428_800),
            ],
        });
        app_state.dashboard.apply(TransferEvent::Progress {
            downloaded: 52_428_800,
            rate_bps: 1_048_576,
            peers: vec![PeerSample {
                address: "mirror-a.example.net".to_string(),
                transport: "https".to_string(),
                bytes_received: 52_428_800,
            }],
        });
        app_state
    }

    fn render_to_string(app_state: &AppState, width: u16, height: u16) -> String {
        let backend = TestBackend::new(width, height);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| draw(f, app_state)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_draw_renders_all_panels() {
        let rendered = render_to_string(&scenario_state(), 100, 32);

        assert!(rendered.contains("sample.iso"));
        assert!(rendered.contains("50%"));
        assert!(rendered.contains("Speed History"));
        assert!(rendered.contains("mirror-a.example.net"));
        assert!(rendered.contains("a.bin"));
        assert!(rendered.contains("Log"));
    }

    #[test]
    fn test_degenerate_sizes_degrade_without_panic() {
        let rendered = render_to_string(&scenario_state(), 39, 12);
        assert!(rendered.contains("Window too small"));

        // Truly tiny panes still must not panic.
        let _ = render_to_string(&scenario_state(), 3, 2);
    }

    #[test]
    fn test_help_overlay_renders() {
        let mut app_state = scenario_state();
        app_state.show_help = true;
        let rendered = render_to_string(&app_state, 100, 32);
        assert!(rendered.contains("Quit"));
    }

    #[test]
    fn test_failed_transfer_is_visible() {
        let mut app_state = scenario_state();
        app_state.dashboard.apply(TransferEvent::Failed {
            message: "mirror exploded".to_string(),
            fatal: true,
        });
        let rendered = render_to_string(&app_state, 100, 32);
        assert!(rendered.contains("Failed"));
        assert!(rendered.contains("mirror exploded"));
    }

    #[test]
    fn test_peer_table_caps_at_limit() {
        let mut app_state = scenario_state();
        let peers: Vec<PeerSample> = (0..15)
            .map(|i| PeerSample {
                address: format!("peer-{:02}.example.net", i),
                transport: "https".to_string(),
                bytes_received: 1000 - i as u64,
            })
            .collect();
        app_state.dashboard.apply(TransferEvent::Progress {
            downloaded: 52_428_800,
            rate_bps: 1_048_576,
            peers,
        });

        let rendered = render_to_string(&app_state, 110, 40);
        assert!(rendered.contains("peer-00.example.net"));
        assert!(rendered.contains("peer-09.example.net"));
        assert!(!rendered.contains("peer-10.example.net"));
    }
}
