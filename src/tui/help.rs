use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key_line(key: &str, pad: usize, action: &str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key.to_string(), Style::default().fg(Color::Magenta)),
        Span::raw(format!("{:pad$}{action}", "")),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw("  Quit"),
        ]),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("↑/↓", Style::default().fg(Color::Magenta)),
            Span::raw(" or "),
            Span::styled("j/k", Style::default().fg(Color::Magenta)),
            Span::raw("  Select program or field"),
        ]),
        key_line("enter", 7, "Start/stop selected program"),
        key_line("s", 11, "Start/stop selected program"),
        key_line("u", 11, "Update configuration"),
        key_line("a", 11, "Toggle auto-update"),
        key_line("tab", 9, "Switch between programs and fields"),
        key_line("?", 11, "Show/hide this help"),
        Line::from(""),
        Line::from("Fields:"),
        key_line("e", 11, "Edit text or number field"),
        key_line("enter", 7, "Commit edit"),
        key_line("esc", 9, "Discard edit"),
        key_line("space", 7, "Toggle checkbox"),
        Line::from(""),
        Line::from(vec![
            Span::raw("Committed edits are pushed right away while auto-update is "),
            Span::styled("on", Style::default().fg(Color::Green)),
            Span::raw("."),
        ]),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
