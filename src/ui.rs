use crate::app::{format_coords, App, PANEL_WIDTH};
use fire_timeline::braille::BrailleCanvas;
use fire_timeline::conditions::{AqiBand, ConditionsError};
use fire_timeline::map::MapLayers;
use fire_timeline::observations::{
    Confidence, Observation, ObservationDataset, ObservationDetail, ResponseStage,
};
use fire_timeline::overlay::{Category, Rgba};
use fire_timeline::predictions::ProbabilityTier;
use fire_timeline::region::ObservationKind;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
    Frame,
};

/// Observation rows listed in the side panel
const MAX_LISTED: usize = 12;

pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Map and panel
            Constraint::Length(1), // Timeline strip
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    if app.show_panel {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(10), Constraint::Length(PANEL_WIDTH as u16)])
            .split(rows[0]);
        render_map(frame, app, cols[0]);
        render_panel(frame, app, cols[1]);
    } else {
        render_map(frame, app, rows[0]);
    }
    render_timeline(frame, app, rows[1]);
    render_status_bar(frame, app, rows[2]);
}

fn rgb(color: (u8, u8, u8)) -> Color {
    Color::Rgb(color.0, color.1, color.2)
}

fn render_map(frame: &mut Frame, app: &App, area: Rect) {
    let session = &app.session;
    let title = match session.timeline().current_date() {
        Some(date) => format!(" {} · {} ", session.region().name, date),
        None => format!(" {} · no dates ", session.region().name),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut viewport = app.viewport.clone();
    // Braille gives 2x4 resolution per character
    viewport.width = inner.width as usize * 2;
    viewport.height = inner.height as usize * 4;

    let land = session.land().snapshot();
    let layers = app.map_renderer.render(
        inner.width as usize,
        inner.height as usize,
        &viewport,
        land.as_deref(),
        Some(&session.region().bounds),
        &app.scene,
    );

    let cursor_pos = app.mouse_pixel_pos().and_then(|(px, py)| {
        let cx = (px / 2) as u16;
        let cy = (py / 4) as u16;
        (px >= 0 && py >= 0 && cx < inner.width && cy < inner.height).then_some((cx, cy))
    });

    frame.render_widget(MapWidget { layers, cursor_pos }, inner);
}

/// Braille map with colour layers and the cursor drawn on top
struct MapWidget {
    layers: MapLayers,
    cursor_pos: Option<(u16, u16)>,
}

impl MapWidget {
    fn render_layer(canvas: &BrailleCanvas, color: Color, area: Rect, buf: &mut Buffer) {
        for (col, row, ch) in canvas.cells() {
            if col >= area.width as usize || row >= area.height as usize {
                continue;
            }
            let x = area.x + col as u16;
            let y = area.y + row as u16;
            buf[(x, y)].set_char(ch).set_fg(color);
        }
    }
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Self::render_layer(&self.layers.land, Color::Green, area, buf);
        Self::render_layer(&self.layers.bounds, Color::DarkGray, area, buf);
        // Marker layers share cells; later layers win
        for layer in &self.layers.markers {
            Self::render_layer(&layer.canvas, rgb(layer.rgb), area, buf);
        }

        if let Some((cx, cy)) = self.cursor_pos {
            let x = area.x + cx;
            let y = area.y + cy;
            if x < area.x + area.width && y < area.y + area.height {
                buf[(x, y)].set_char('╋').set_fg(Color::Red);
            }
        }
    }
}

fn heading(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        text.to_string(),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    ))
}

fn dim(text: impl Into<String>) -> Span<'static> {
    Span::styled(text.into(), Style::default().fg(Color::DarkGray))
}

fn condition_error(e: &ConditionsError) -> &'static str {
    match e {
        ConditionsError::NoData => "no data",
        ConditionsError::MissingParameters | ConditionsError::Unavailable(_) => "unavailable",
    }
}

fn swatch(color: Rgba) -> Span<'static> {
    Span::styled("● ", Style::default().fg(Color::Rgb(color.r, color.g, color.b)))
}

/// Colour key for the dataset's marker encoding
fn observation_legend(dataset: &ObservationDataset) -> Vec<Line<'static>> {
    match dataset.kind {
        ObservationKind::Satellite => {
            let spans = [Confidence::High, Confidence::Nominal, Confidence::Low]
                .iter()
                .flat_map(|c| [swatch(c.color()), dim(format!("{}  ", c.label()))])
                .collect::<Vec<_>>();
            vec![Line::from(spans), Line::from(dim("size grows with frp"))]
        }
        ObservationKind::Incident => ResponseStage::KNOWN
            .iter()
            .chain(std::iter::once(&ResponseStage::Unknown))
            .map(|stage| {
                let (size, color) = stage.style();
                Line::from(vec![swatch(color), dim(format!("{} ({size:.0}px)", stage.label()))])
            })
            .collect(),
    }
}

fn observation_line(obs: &Observation) -> Line<'static> {
    let (_, color) = obs.style();
    let time = obs.time_of_day().unwrap_or("--:--").to_string();
    let detail = match &obs.detail {
        ObservationDetail::Satellite {
            confidence, frp, ..
        } => format!(
            "{} frp {}",
            confidence.label(),
            frp.map(|f| format!("{f:.1}")).unwrap_or_else(|| "-".into())
        ),
        ObservationDetail::Incident {
            stage,
            status,
            address,
        } => format!(
            "{} {} {}",
            stage.label(),
            status.as_deref().unwrap_or("-"),
            address.as_deref().unwrap_or("")
        ),
    };
    Line::from(vec![swatch(color), dim(format!("{time} ")), Span::raw(detail)])
}

fn render_panel(frame: &mut Frame, app: &App, area: Rect) {
    let session = &app.session;
    let mut lines: Vec<Line> = Vec::new();

    lines.push(heading("Imagery"));
    lines.push(Line::from(match session.imagery().active() {
        Some(layer) => Span::raw(format!("{} ({:.0}%)", layer.credit(), layer.alpha * 100.0)),
        None => dim("none for this date"),
    }));
    lines.push(Line::raw(""));

    lines.push(heading("Predictions"));
    match session.prediction_stats() {
        Some(stats) => lines.push(Line::raw(format!(
            "{} cells  ({} dup, {} sea, {} bad)",
            stats.kept, stats.duplicates, stats.sea, stats.invalid
        ))),
        None => lines.push(Line::from(dim("loading…"))),
    }
    let tiers = [
        (ProbabilityTier::High, "> 0.8"),
        (ProbabilityTier::Medium, "> 0.5"),
        (ProbabilityTier::Low, "≤ 0.5"),
    ];
    lines.push(Line::from(
        tiers
            .iter()
            .flat_map(|(tier, range)| {
                [swatch(tier.color()), dim(format!("{range}  "))]
            })
            .collect::<Vec<_>>(),
    ));
    lines.push(Line::raw(""));

    let filter = session.filter();
    let mut observed = heading("Observed");
    if let Some(stage) = filter.stage {
        observed.spans.push(dim(format!("  stage {}", stage.label())));
    }
    if let Some(status) = &filter.status {
        observed.spans.push(dim(format!("  {status}")));
    }
    lines.push(observed);
    match session.observations() {
        Some(dataset) => {
            let rendered: Vec<&Observation> = session.rendered_observations().collect();
            lines.push(Line::raw(format!("{} records on this date", rendered.len())));
            if let (ObservationKind::Incident, Some(date)) =
                (dataset.kind, session.timeline().current_date())
            {
                let counts = dataset.stage_counts(date, filter);
                lines.push(Line::from(
                    counts
                        .iter()
                        .flat_map(|(stage, n)| [swatch(stage.style().1), dim(format!("{n}  "))])
                        .collect::<Vec<_>>(),
                ));
            }
            lines.extend(observation_legend(dataset));
            lines.extend(rendered.iter().take(MAX_LISTED).map(|o| observation_line(o)));
            if rendered.len() > MAX_LISTED {
                lines.push(Line::from(dim(format!("… {} more", rendered.len() - MAX_LISTED))));
            }
        }
        None => lines.push(Line::from(dim("no dataset"))),
    }
    lines.push(Line::raw(""));

    lines.push(heading("Conditions"));
    match session.conditions() {
        Some(report) => {
            lines.push(Line::from(dim(format_coords(glam::DVec2::new(report.lon, report.lat)))));
            lines.push(match &report.aqi {
                Ok(aqi) => Line::from(vec![
                    Span::raw("AQI "),
                    Span::styled(
                        format!("{aqi:.0}"),
                        Style::default().fg(rgb(AqiBand::of(*aqi).rgb())),
                    ),
                ]),
                Err(e) => Line::raw(format!("AQI {}", condition_error(e))),
            });
            lines.push(match &report.weather {
                Ok(w) => {
                    let show = |v: Option<f64>, unit: &str| {
                        v.map(|v| format!("{v:.0}{unit}")).unwrap_or_else(|| "-".into())
                    };
                    Line::raw(format!(
                        "wind {} from {}  temp {}",
                        show(w.wind_speed, " km/h"),
                        show(w.wind_dir, "°"),
                        show(w.temp, "°C")
                    ))
                }
                Err(e) => Line::raw(format!("weather {}", condition_error(e))),
            });
        }
        None => lines.push(Line::from(dim("right-click or i to look up"))),
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

fn render_timeline(frame: &mut Frame, app: &App, area: Rect) {
    let timeline = app.session.timeline();
    let mut spans = vec![Span::styled(
        if timeline.is_playing() { " ▶ " } else { " ⏸ " },
        Style::default().fg(Color::Yellow),
    )];
    if timeline.is_empty() {
        spans.push(dim("no dates"));
    }
    for (i, date) in timeline.dates().iter().enumerate() {
        let text = format!("{} ", date.format("%m-%d"));
        let style = if i == timeline.index() {
            Style::default().fg(Color::Black).bg(Color::Yellow)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(text, style));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let registry = app.session.registry();
    let toggle = |category: Category, key: &str| {
        let on = registry.is_visible(category);
        Span::styled(
            format!("[{key}]{} {} ", category.label(), registry.len(category)),
            Style::default().fg(if on { Color::Green } else { Color::DarkGray }),
        )
    };

    let status = Line::from(vec![
        Span::raw(" "),
        toggle(Category::Grid, "g"),
        toggle(Category::Predicted, "p"),
        toggle(Category::Observed, "o"),
        dim("| "),
        Span::styled(app.center_coords(), Style::default().fg(Color::Cyan)),
        dim(" | "),
        Span::styled(app.session.status().to_string(), Style::default().fg(Color::White)),
        dim(" | ←/→ date space play r region f/s filter hjkl pan +/- zoom q quit"),
    ]);
    frame.render_widget(Paragraph::new(status), area);
}
