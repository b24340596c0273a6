//! Neo-Miami TUI Dashboard Module
//! ===============================
//!
//! Terminal rendition of the IoT dashboard. Uses Ratatui for rendering and
//! Crossbeam channels for snapshot and frame delivery from the drivers.
//!
//! Enable with the `dashboard` feature flag.
//!
//! Panels:
//! - Header with the fleet status pills
//! - Four metric cards (value, unit, change badge)
//! - Temperature sparkline (last 100 ticks)
//! - Sensor fleet table (status, reading, signal health)
//! - Digital twin summary (mean tower height, neon path opacity, star yaw)

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::Receiver;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Row, Sparkline, Table},
    Frame, Terminal,
};

use crate::animator::FrameSample;
use crate::telemetry::{Metric, MetricKind, SensorStatus, Snapshot, Trend};

/// Fixed fleet counters shown in the header.
pub const STATUS_PILLS: [(&str, &str); 3] = [
    ("AQ Monitors", "24"),
    ("Energy Hubs", "9"),
    ("Traffic Nodes", "14"),
];

const HISTORY_LEN: usize = 100;

// Neo-Miami palette
const TEAL: Color = Color::Rgb(0x38, 0xE8, 0xD0);
const PINK: Color = Color::Rgb(0xFF, 0x6E, 0xC7);
const PURPLE: Color = Color::Rgb(0x9F, 0x7A, 0xEA);
const BLUE: Color = Color::Rgb(0x5C, 0x7C, 0xFF);

fn metric_color(kind: MetricKind) -> Color {
    match kind {
        MetricKind::Temperature => TEAL,
        MetricKind::Humidity => PINK,
        MetricKind::AirQuality => PURPLE,
        MetricKind::NetworkHealth => BLUE,
    }
}

/// Value text for a metric card, e.g. `27.5°C`.
pub fn format_metric(metric: &Metric) -> String {
    format!("{}{}", metric.value, metric.kind.unit())
}

/// TUI dashboard fed by the telemetry and frame drivers.
pub struct TwinDashboard {
    snapshots: Receiver<Arc<Snapshot>>,
    frames: Receiver<FrameSample>,
    latest: Option<Arc<Snapshot>>,
    latest_frame: Option<FrameSample>,
    temperature_history: VecDeque<u64>,
    frame_count: usize,
}

impl TwinDashboard {
    pub fn new(snapshots: Receiver<Arc<Snapshot>>, frames: Receiver<FrameSample>) -> Self {
        Self {
            snapshots,
            frames,
            latest: None,
            latest_frame: None,
            temperature_history: VecDeque::with_capacity(HISTORY_LEN),
            frame_count: 0,
        }
    }

    /// Drains both channels, keeping only the newest values.
    pub fn drain(&mut self) {
        while let Ok(snapshot) = self.snapshots.try_recv() {
            let t = snapshot.metric(MetricKind::Temperature).value;
            self.temperature_history.push_back((t * 10.0).max(0.0) as u64);
            if self.temperature_history.len() > HISTORY_LEN {
                self.temperature_history.pop_front();
            }
            self.latest = Some(snapshot);
        }

        while let Ok(frame) = self.frames.try_recv() {
            self.latest_frame = Some(frame);
        }
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.latest.as_deref()
    }

    pub fn latest_frame(&self) -> Option<&FrameSample> {
        self.latest_frame.as_ref()
    }

    /// Run the TUI main loop (blocks until 'q' pressed)
    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal);

        // Restore terminal even if drawing failed
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
        loop {
            self.drain();

            terminal.draw(|f| self.ui(f))?;
            self.frame_count += 1;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.code == KeyCode::Char('q') || key.code == KeyCode::Esc {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Render the UI
    fn ui(&self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Length(5), // Metric cards
                Constraint::Length(6), // Sparkline
                Constraint::Min(8),    // Sensors + twin
                Constraint::Length(1), // Footer
            ])
            .split(f.area());

        // === HEADER ===
        let mut header_spans = vec![
            Span::styled(
                "Neo-Miami IoT Dashboard",
                Style::default().fg(TEAL).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  |  "),
            Span::styled("Smart City Operations", Style::default().fg(PINK)),
        ];
        for (label, value) in STATUS_PILLS {
            header_spans.push(Span::raw("  "));
            header_spans.push(Span::styled(
                format!("[{} {}]", value, label),
                Style::default().fg(Color::Gray),
            ));
        }
        let header = Paragraph::new(Line::from(header_spans))
            .block(Block::default().borders(Borders::BOTTOM));
        f.render_widget(header, chunks[0]);

        // === METRIC CARDS ===
        let card_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(25); 4])
            .split(chunks[1]);

        for (idx, kind) in MetricKind::ALL.iter().enumerate() {
            let lines = match self.latest() {
                Some(snapshot) => {
                    let metric = snapshot.metric(*kind);
                    let badge_color = match metric.trend() {
                        Trend::Up => PINK,
                        Trend::Down => BLUE,
                    };
                    vec![
                        Line::from(Span::styled(
                            format_metric(metric),
                            Style::default().fg(metric_color(*kind)).add_modifier(Modifier::BOLD),
                        )),
                        Line::from(Span::styled(metric.change_label(), Style::default().fg(badge_color))),
                        Line::from(Span::styled("Live sampled", Style::default().fg(Color::DarkGray))),
                    ]
                }
                None => vec![Line::from("waiting for telemetry…")],
            };
            let card = Paragraph::new(lines)
                .block(Block::default().title(kind.label()).borders(Borders::ALL));
            f.render_widget(card, card_chunks[idx]);
        }

        // === TEMPERATURE SPARKLINE ===
        let history: Vec<u64> = self.temperature_history.iter().cloned().collect();
        let sparkline = Sparkline::default()
            .block(Block::default().title("Temperature (last 100 ticks)").borders(Borders::ALL))
            .data(&history)
            .style(Style::default().fg(TEAL));
        f.render_widget(sparkline, chunks[2]);

        // === SENSORS + TWIN ===
        let lower = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(chunks[3]);

        let header_cells = ["Sensor", "Location", "Status", "Reading", "Health"]
            .iter()
            .map(|h| Span::styled(*h, Style::default().add_modifier(Modifier::BOLD)));
        let header = Row::new(header_cells).height(1);

        let rows: Vec<Row> = self
            .latest()
            .map(|snapshot| {
                snapshot
                    .sensors
                    .iter()
                    .map(|sensor| {
                        let status_color = match sensor.status {
                            SensorStatus::Online => Color::Green,
                            SensorStatus::Offline => Color::Red,
                        };
                        Row::new(vec![
                            Span::styled(sensor.name.clone(), Style::default().fg(PINK)),
                            Span::raw(sensor.location.clone()),
                            Span::styled(sensor.status.to_string(), Style::default().fg(status_color)),
                            Span::raw(format!("{}{}", sensor.value, sensor.unit)),
                            Span::raw(format!("{:.0}%", sensor.health)),
                        ])
                    })
                    .collect()
            })
            .unwrap_or_default();

        let table = Table::new(
            rows,
            [
                Constraint::Length(11),
                Constraint::Length(16),
                Constraint::Length(8),
                Constraint::Length(11),
                Constraint::Length(7),
            ],
        )
        .header(header)
        .block(Block::default().title("Sensor Fleet Health").borders(Borders::ALL));
        f.render_widget(table, lower[0]);

        let twin_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(4), Constraint::Length(3)])
            .split(lower[1]);

        let (twin_lines, opacity) = match &self.latest_frame {
            Some(FrameSample::City(frame)) => (
                vec![
                    Line::from(format!("t = {:.1}s", frame.elapsed)),
                    Line::from(format!("towers: {}  mean scale {:.2}", frame.buildings.len(), frame.mean_scale())),
                    Line::from(format!("star yaw {:.3} rad", frame.starfield_yaw)),
                ],
                frame.path_opacity,
            ),
            Some(FrameSample::Cube(frame)) => (
                vec![
                    Line::from(format!("frame {}", frame.frame)),
                    Line::from(format!("rotation x {:.2} y {:.2}", frame.rotation_x, frame.rotation_y)),
                ],
                1.0,
            ),
            None => (vec![Line::from("scene not running")], 0.0),
        };
        let twin = Paragraph::new(twin_lines)
            .style(Style::default().fg(TEAL))
            .block(Block::default().title("Neon City Digital Twin").borders(Borders::ALL));
        f.render_widget(twin, twin_chunks[0]);

        let gauge = Gauge::default()
            .block(Block::default().title("Neon Path").borders(Borders::ALL))
            .gauge_style(Style::default().fg(PINK))
            .ratio(opacity.clamp(0.0, 1.0));
        f.render_widget(gauge, twin_chunks[1]);

        // === FOOTER ===
        let online = self.latest().map(|s| s.online_count()).unwrap_or(0);
        let footer = Paragraph::new(format!(
            "Edge compute nodes stable · {} sensors online · frame {} · press 'q' to quit",
            online, self.frame_count
        ))
        .style(Style::default().fg(Color::DarkGray));
        f.render_widget(footer, chunks[4]);
    }
}

// =============================================================================
// TESTS
// =============================================================================
