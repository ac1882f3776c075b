use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

const KEYS: &[(&str, &str)] = &[
    ("Enter", "Start / restart the program"),
    ("Esc", "Stop the session (or cancel injection)"),
    ("n", "Execute one instruction"),
    ("↑/↓", "Speed +10 / -10"),
    ("←/→", "Speed -1 / +1"),
    ("p", "Pause (speed 0)"),
    ("g", "Super speed: run to completion"),
    ("i", "Inject the next typed character"),
    ("y", "Copy program output to clipboard"),
    ("?", "Toggle this help"),
];

fn key_line(key: &str, what: &str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(format!("{key:<12}"), Style::default().fg(Color::Magenta)),
        Span::raw(what.to_string()),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let mut lines = vec![
        Line::from("Keybinds:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw("  Quit"),
        ]),
    ];
    lines.extend(KEYS.iter().map(|(key, what)| key_line(key, what)));
    lines.extend([
        Line::from(""),
        Line::from("Speed:"),
        Line::from("  0 idle, 1-100 one instruction every 100/speed ms, super runs without pausing."),
        Line::from("  A fault or the end of the program drops the speed back to 0."),
    ]);

    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
