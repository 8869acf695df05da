// ui.rs

use std::time::Instant;

use plotters::style::RGBColor;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        Block, Borders, Clear, Paragraph, Wrap,
        canvas::{Canvas, Line as CanvasLine, Map, MapResolution, Points},
    },
};

use crate::analysis::RadiusChoice;
use crate::app::{App, AppMode, CurrentScreen};
use crate::export;
use crate::geometry;
use crate::overlay::class_steps;
use crate::ui_state::{BaseMap, Severity, Theme};

const FORM_LABEL_WIDTH: u16 = 12;
const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

struct ThemeColors {
    bg: Color,
    fg: Color,
    muted: Color,
    accent: Color,
    border: Color,
}

fn theme_colors(theme: Theme) -> ThemeColors {
    match theme {
        Theme::Light => ThemeColors {
            bg: Color::Rgb(248, 250, 252),
            fg: Color::Rgb(15, 23, 42),
            muted: Color::Rgb(100, 116, 139),
            accent: Color::Rgb(37, 99, 235),
            border: Color::Rgb(148, 163, 184),
        },
        Theme::Dark => ThemeColors {
            bg: Color::Rgb(15, 23, 42),
            fg: Color::Rgb(226, 232, 240),
            muted: Color::Rgb(148, 163, 184),
            accent: Color::Rgb(96, 165, 250),
            border: Color::Rgb(71, 85, 105),
        },
    }
}

pub fn render(frame: &mut Frame, app: &mut App) {
    // While the reveal runs the frame is drawn light and the dark circle is
    // painted over it.
    let theme = if app.ui.theme_transition.is_some() {
        Theme::Light
    } else {
        app.ui.theme
    };
    let colors = theme_colors(theme);
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg).fg(colors.fg)),
        frame.size(),
    );

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title bar
            Constraint::Min(0),    // Sidebar and map
            Constraint::Length(3), // Footer
        ])
        .split(frame.size());

    render_title_bar(frame, app, &colors, main_layout[0]);
    match app.current_screen {
        CurrentScreen::Map => render_map_screen(frame, app, &colors, main_layout[1]),
        CurrentScreen::Help => render_help_screen(frame, &colors, main_layout[1]),
    }
    render_toast(frame, app, &colors, main_layout[1]);
    render_footer(frame, app, &colors, main_layout[2]);
    render_theme_reveal(frame, app, Instant::now());
}

fn render_title_bar(frame: &mut Frame, app: &App, colors: &ThemeColors, area: Rect) {
    let theme = match app.ui.theme {
        Theme::Light => "Light",
        Theme::Dark => "Dark",
    };
    let title = Line::from(vec![
        Span::styled(" GEO NET ", Style::default().fg(colors.bg).bg(colors.accent).bold()),
        Span::raw("  Road network analysis"),
    ]);
    let status = Line::from(vec![
        Span::styled("Theme: ", Style::default().fg(colors.muted)),
        Span::raw(theme),
        Span::styled("  Base map: ", Style::default().fg(colors.muted)),
        Span::raw(app.ui.base_map.label()),
        Span::raw(" "),
    ]);
    frame.render_widget(Paragraph::new(title), area);
    frame.render_widget(Paragraph::new(status).alignment(Alignment::Right), area);
}

fn render_map_screen(frame: &mut Frame, app: &mut App, colors: &ThemeColors, area: Rect) {
    if !app.ui.sidebar_visible() {
        render_map(frame, app, colors, area);
        return;
    }

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(app.sidebar_width_percentage),
            Constraint::Percentage(100 - app.sidebar_width_percentage),
        ])
        .split(area);

    let sidebar = match (app.ui.input_panel_open, app.ui.layer_panel_open) {
        (true, true) => Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(10)])
            .split(body[0])
            .to_vec(),
        _ => vec![body[0]],
    };
    let mut panels = sidebar.into_iter();
    if app.ui.input_panel_open {
        if let Some(panel) = panels.next() {
            render_input_panel(frame, app, colors, panel);
        }
    }
    if app.ui.layer_panel_open {
        if let Some(panel) = panels.next() {
            render_layer_panel(frame, app, colors, panel);
        }
    }

    render_map(frame, app, colors, body[1]);

    // Divider on the sidebar's right edge; drag to resize.
    let divider_x = body[0].x + body[0].width.saturating_sub(1);
    let style = if app.is_resizing {
        Style::default().fg(Color::LightRed)
    } else {
        Style::default().fg(colors.border)
    };
    for y in body[0].y..body[0].y + body[0].height {
        frame
            .buffer_mut()
            .get_mut(divider_x, y)
            .set_symbol("│")
            .set_style(style);
    }
}

fn panel_block<'a>(title: &'a str, colors: &ThemeColors) -> Block<'a> {
    Block::default()
        .title(title)
        .title_style(Style::default().fg(colors.accent).bold())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors.border))
}

fn render_input_panel(frame: &mut Frame, app: &mut App, colors: &ThemeColors, area: Rect) {
    let block = panel_block(" Input ", colors);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let form_rows = if app.form.analysis_type.uses_centrality_params() {
        7
    } else {
        5
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),         // Search
            Constraint::Min(3),            // Upload list
            Constraint::Length(2),         // Upload info
            Constraint::Length(form_rows), // Analysis form
        ])
        .split(inner);

    // Search line
    if app.current_mode == AppMode::Searching {
        let search = Line::from(vec![
            Span::styled("Search: ", Style::default().fg(colors.accent)),
            Span::styled(app.search_query_buffer.clone(), Style::default().fg(Color::Yellow)),
        ]);
        frame.render_widget(Paragraph::new(search), chunks[0]);
        frame.set_cursor(
            chunks[0].x + 8 + app.search_query_cursor as u16,
            chunks[0].y,
        );
    } else {
        let hint = if app.search_query_buffer.is_empty() {
            format!("Archives in {} (/ to search)", app.data_dir.display())
        } else {
            format!("Filter: {}", app.search_query_buffer)
        };
        frame.render_widget(
            Paragraph::new(hint).style(Style::default().fg(colors.muted)),
            chunks[0],
        );
    }

    // Upload list
    let list_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors.border))
        .title(" Uploads ");
    let visible_rows = list_block.inner(chunks[1]).height as usize;
    app.clamp_scroll(visible_rows);

    let end = (app.scroll_offset + visible_rows).min(app.filtered_upload_indices.len());
    let mut list_items: Vec<Line> = Vec::new();
    for i in app.scroll_offset..end {
        let original_index = app.filtered_upload_indices[i];
        let file_name = &app.upload_files[original_index];
        let chosen = app
            .selected_upload
            .as_ref()
            .is_some_and(|p| p.ends_with(file_name));
        let marker = if chosen { "[x]" } else { "[ ]" };
        let mut style = Style::default().fg(colors.fg);
        if i == app.selected_file_index {
            style = style.bg(colors.border).add_modifier(Modifier::BOLD);
        }
        if chosen {
            style = style.fg(Color::Green);
        }
        list_items.push(Line::from(Span::styled(format!("{marker} {file_name}"), style)));
    }
    if list_items.is_empty() {
        list_items.push(Line::from("No .zip archives found").fg(colors.muted));
    }
    frame.render_widget(Paragraph::new(list_items).block(list_block), chunks[1]);

    // Upload info and success indicator
    let mut info_lines = Vec::new();
    match app.selected_upload_name() {
        Some(name) => info_lines.push(Line::from(vec![
            Span::styled("✔ ", Style::default().fg(Color::Green).bold()),
            Span::raw(name),
        ])),
        None => info_lines.push(Line::from("No archive selected (Enter)").fg(colors.muted)),
    }
    if let Some(info) = &app.upload_info {
        match &info.error {
            Some(error) => info_lines.push(Line::from(format!("Error: {error}")).fg(Color::Red)),
            None => info_lines.push(
                Line::from(format!(
                    "{} KB, modified {}",
                    info.file_size_kb, info.modified_time
                ))
                .fg(colors.muted),
            ),
        }
    }
    frame.render_widget(Paragraph::new(info_lines), chunks[2]);

    // Analysis form
    let editing = |mode: AppMode| app.current_mode == mode;
    let field_style = |active: bool| {
        if active {
            Style::default().fg(Color::White).bg(colors.accent)
        } else {
            Style::default().fg(colors.fg)
        }
    };
    let label = |text: &str| {
        Span::styled(
            format!("{:<width$}", text, width = FORM_LABEL_WIDTH as usize),
            Style::default().fg(colors.muted),
        )
    };

    let mut form_lines = vec![
        Line::from(vec![label("Type [t]"), Span::raw(app.form.analysis_type.label())]),
        Line::from(vec![label("Method[m]"), Span::raw(app.form.method.as_str())]),
        Line::from(vec![
            label("Classes[c]"),
            Span::styled(
                app.form.class_count_input.clone(),
                field_style(editing(AppMode::EditingClassCount)),
            ),
        ]),
    ];
    let mut cursor_row = None;
    if editing(AppMode::EditingClassCount) {
        cursor_row = Some(2);
    }
    if app.form.analysis_type.uses_centrality_params() {
        form_lines.push(Line::from(vec![label("Metric[g]"), Span::raw(app.form.metric.as_str())]));
        let radius = match app.form.radius_choice {
            RadiusChoice::Custom => Span::styled(
                format!("{} m", app.form.custom_radius_input),
                field_style(editing(AppMode::EditingRadius)),
            ),
            choice => Span::raw(choice.label()),
        };
        form_lines.push(Line::from(vec![label("Radius[r]"), radius]));
        if editing(AppMode::EditingRadius) {
            cursor_row = Some(4);
        }
    }
    form_lines.push(Line::from(""));
    form_lines.push(action_line(app, colors));

    if let Some(row) = cursor_row {
        frame.set_cursor(
            chunks[3].x + FORM_LABEL_WIDTH + app.edit_cursor as u16,
            chunks[3].y + row,
        );
    }
    frame.render_widget(Paragraph::new(form_lines), chunks[3]);
}

fn action_line(app: &App, colors: &ThemeColors) -> Line<'static> {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(colors.accent).bold());
    let run = if app.analyses_in_flight > 0 {
        Span::styled(" Running... ", Style::default().fg(Color::Yellow))
    } else {
        Span::raw(" Run  ")
    };
    let download = if app.download_in_flight {
        Span::styled(" Preparing...", Style::default().fg(Color::Yellow))
    } else if app.ui.download_enabled {
        Span::raw(" Download")
    } else {
        Span::styled(" Download", Style::default().fg(colors.muted).add_modifier(Modifier::DIM))
    };
    Line::from(vec![
        key("[a]"),
        run,
        key("[x]"),
        Span::raw(" Reset  "),
        key("[s]"),
        download,
    ])
}

fn render_layer_panel(frame: &mut Frame, app: &App, colors: &ThemeColors, area: Rect) {
    let block = panel_block(" Layer ", colors);
    let steps = match &app.result {
        Some(result) => class_steps(result.max_class_id).max(2),
        None => app.style.ramp.base_colors().len(),
    };
    let preview: Vec<Span> = app
        .style
        .colors(steps.min(inner_width(area)))
        .into_iter()
        .map(|c| Span::styled("█", Style::default().fg(rgb(c))))
        .collect();

    let on_off = |flag: bool| if flag { "on" } else { "off" };
    let visible = app.overlay.as_ref().is_some_and(|o| o.visible);
    let features = app.overlay.as_ref().map_or(0, |o| o.len());

    let lines = vec![
        Line::from(format!("Ramp [p/P]    {}", app.style.ramp.name())),
        Line::from(preview),
        Line::from(format!("Invert [i]    {}", on_off(app.style.invert))),
        Line::from(format!("Opacity [+/-] {}%", app.style.opacity_percent)),
        Line::from(format!("Width [[/]]   {} px", app.style.stroke_width)),
        Line::from(format!("Visible [v]   {}", on_off(visible))),
        Line::from(format!("Features      {features}")).fg(colors.muted),
    ];
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn inner_width(area: Rect) -> usize {
    usize::from(area.width.saturating_sub(2)).max(1)
}

fn render_map(frame: &mut Frame, app: &mut App, colors: &ThemeColors, area: Rect) {
    let block = Block::default()
        .title(format!(" Map: {} ", app.ui.base_map.label()))
        .title_style(Style::default().fg(colors.accent).bold())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors.border));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    app.map_area = inner;
    let app: &App = app;

    let fading = app.ui.is_fading();
    let background = map_background(app.ui.base_map, fading);
    let canvas_bg = rgb(background);
    let outline = if fading {
        Color::DarkGray
    } else {
        outline_color(app.ui.base_map)
    };
    let resolution = match app.ui.base_map {
        BaseMap::Terrain => MapResolution::High,
        _ => MapResolution::Low,
    };
    let (x_bounds, y_bounds) = (app.view.x, app.view.y);

    let base = Canvas::default()
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .marker(Marker::Braille)
        .background_color(canvas_bg)
        .paint(|ctx| {
            ctx.draw(&Map {
                color: outline,
                resolution,
            });
        });
    frame.render_widget(base, inner);

    // The overlay always sits above the base map, in its own canvas so the
    // stroke width can pick the marker.
    if let Some(overlay) = app.overlay.as_ref().filter(|o| o.visible) {
        let layer = Canvas::default()
            .x_bounds(x_bounds)
            .y_bounds(y_bounds)
            .marker(marker_for_width(app.style.stroke_width))
            .background_color(canvas_bg)
            .paint(|ctx| {
                for feature in overlay.features() {
                    let Some(value) = &feature.geometry else {
                        continue;
                    };
                    let color = blend(feature.style.color, background, feature.style.opacity);
                    draw_geometry(ctx, value, color);
                }
                if let Some(feature) = app.inspected_feature.and_then(|i| overlay.features().get(i)) {
                    if let Some(value) = &feature.geometry {
                        ctx.layer();
                        draw_geometry(ctx, value, Color::Yellow);
                    }
                }
            });
        frame.render_widget(layer, inner);
    }

    if let (Some(index), Some(overlay)) = (app.inspected_feature, &app.overlay) {
        if let Some(lines) = overlay.popup(index) {
            render_popup(frame, colors, inner, index, overlay.len(), lines);
        }
    }

    if inner.height > 0 && inner.width > 0 {
        let cell = format_distance(app.view.ground_width_m() / f64::from(inner.width));
        let text = match app.cursor_coords {
            Some((lon, lat)) => format!(" 1 cell ≈ {cell}  Lat: {lat:.4}  Lon: {lon:.4} "),
            None => format!(" 1 cell ≈ {cell} "),
        };
        let readout = Rect::new(inner.x, inner.y + inner.height - 1, inner.width, 1);
        frame.render_widget(
            Paragraph::new(text)
                .alignment(Alignment::Right)
                .style(Style::default().fg(colors.fg).bg(colors.bg)),
            readout,
        );
    }
}

fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{:.1} km", meters / 1000.0)
    } else {
        format!("{meters:.0} m")
    }
}

fn draw_geometry(ctx: &mut ratatui::widgets::canvas::Context<'_>, value: &geojson::Value, color: Color) {
    for path in geometry::paths_of(value) {
        for pair in path.windows(2) {
            ctx.draw(&CanvasLine {
                x1: pair[0].0,
                y1: pair[0].1,
                x2: pair[1].0,
                y2: pair[1].1,
                color,
            });
        }
    }
    let points = geometry::points_of(value);
    if !points.is_empty() {
        ctx.draw(&Points {
            coords: &points,
            color,
        });
    }
}

fn render_popup(
    frame: &mut Frame,
    colors: &ThemeColors,
    map: Rect,
    index: usize,
    total: usize,
    lines: Vec<String>,
) {
    let width = lines
        .iter()
        .map(|l| l.chars().count() as u16 + 4)
        .max()
        .unwrap_or(0)
        .max(18)
        .min(map.width);
    let height = (lines.len() as u16 + 2).min(map.height);
    let area = Rect::new(map.x + 1.min(map.width), map.y, width, height);
    let block = Block::default()
        .title(format!(" Feature {}/{} ", index + 1, total))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors.accent));
    let text: Vec<Line> = lines.into_iter().map(Line::from).collect();
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(text)
            .block(block)
            .style(Style::default().fg(colors.fg).bg(colors.bg)),
        area,
    );
}

fn render_toast(frame: &mut Frame, app: &App, colors: &ThemeColors, area: Rect) {
    let Some(toast) = &app.ui.toast else {
        return;
    };
    let (color, prefix) = match toast.severity {
        Severity::Info => (colors.accent, SPINNER[(app.tick_count % SPINNER.len() as u64) as usize]),
        Severity::Success => (Color::Green, "✔"),
        Severity::Warning => (Color::Yellow, "!"),
        Severity::Error => (Color::Red, "✖"),
    };
    let text = format!("{prefix} {}", toast.message);
    let width = (text.chars().count() as u16 + 4).min(area.width);
    let height = 3.min(area.height);
    let area = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + area.height - height,
        width,
        height,
    );
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(text)
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(color)),
            )
            .style(Style::default().fg(colors.fg).bg(colors.bg)),
        area,
    );
}

/// Circular dark reveal from the top-right corner while the theme changes.
/// Only cells inside the circle that still carry the light theme colors are
/// repainted, so the map canvas and toasts keep their own backgrounds.
fn render_theme_reveal(frame: &mut Frame, app: &App, now: Instant) {
    let Some(transition) = app.ui.theme_transition else {
        return;
    };
    let coverage = transition.coverage(now);
    let dark = theme_colors(Theme::Dark);
    let light = theme_colors(Theme::Light);
    let area = frame.size();
    let buffer = frame.buffer_mut();
    for y in area.y..area.y + area.height {
        for x in area.x..area.x + area.width {
            if !in_reveal(area, x, y, coverage) {
                continue;
            }
            let cell = buffer.get_mut(x, y);
            if cell.bg == light.bg {
                cell.set_bg(dark.bg);
            }
            if cell.fg == light.fg {
                cell.set_fg(dark.fg);
            }
        }
    }
}

fn in_reveal(area: Rect, x: u16, y: u16, coverage: f64) -> bool {
    if area.width == 0 || area.height == 0 {
        return false;
    }
    let dx = f64::from(area.x + area.width - x) / f64::from(area.width);
    let dy = f64::from(y - area.y + 1) / f64::from(area.height);
    (dx * dx + dy * dy).sqrt() / std::f64::consts::SQRT_2 <= coverage
}

/// Renders the help screen.
fn render_help_screen(frame: &mut Frame, colors: &ThemeColors, area: Rect) {
    let block = Block::default()
        .title(" Help ")
        .title_style(Style::default().fg(Color::Yellow).bold())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors.border));

    let help_text = Paragraph::new(
        "Uploads:\n\
          j/k or ↑/↓: Navigate archives\n\
          Enter/Space: Use highlighted archive\n\
          /: Fuzzy search   F5: Rescan data directory\n\n\
        Analysis:\n\
          t: Analysis type   m: Classification method   c: Class count\n\
          g: Metric   r: Radius (centrality only)\n\
          a: Run analysis   x: Reset   s: Download shapefile   e: Export PNG\n\n\
        Layer:\n\
          p/P: Color ramp   i: Invert   +/-: Opacity   [/]: Stroke width\n\
          v: Toggle layer   f: Fit to layer   n/N: Inspect features   Esc: Close popup\n\n\
        View:\n\
          T: Toggle theme   1/2/3: Positron / Dark / Terrain base map\n\
          b: Input panel   l: Layer panel\n\
          Shift+arrows or H/J/K/L: Pan   z/Z or mouse wheel: Zoom in/out\n\
          Click: Inspect feature   Drag divider: Resize sidebar\n\n\
          q: Quit (or leave Help)   h: This screen",
    )
    .block(block)
    .wrap(Wrap { trim: false })
    .style(Style::default().fg(colors.fg));

    frame.render_widget(help_text, area);
}

fn render_footer(frame: &mut Frame, app: &App, colors: &ThemeColors, area: Rect) {
    let screen = match app.current_screen {
        CurrentScreen::Map => "Map",
        CurrentScreen::Help => "Help",
    };
    let mode = match app.current_mode {
        AppMode::Navigation => "Navigation",
        AppMode::Searching => "Searching",
        AppMode::EditingClassCount => "Editing Classes",
        AppMode::EditingRadius => "Editing Radius",
    };
    let strong = |text: &'static str, color: Color| {
        Span::styled(text, Style::default().fg(color).add_modifier(Modifier::BOLD))
    };

    let mut spans = vec![
        Span::raw("Screen: "),
        strong(screen, colors.accent),
        Span::raw(" | Mode: "),
        strong(mode, Color::LightMagenta),
    ];
    if app.analyses_in_flight > 0 {
        spans.push(Span::raw(" | Requests: "));
        spans.push(Span::styled(
            app.analyses_in_flight.to_string(),
            Style::default().fg(Color::Yellow),
        ));
    }
    spans.extend([
        Span::raw(" | "),
        strong("q", Color::Red),
        Span::raw(" quit | "),
        strong("h", Color::Green),
        Span::raw(" help"),
    ]);

    let footer = Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(colors.border)),
        )
        .style(Style::default().fg(colors.muted));

    frame.render_widget(footer, area);
}

fn rgb(color: RGBColor) -> Color {
    Color::Rgb(color.0, color.1, color.2)
}

fn outline_color(base_map: BaseMap) -> Color {
    match base_map {
        BaseMap::Positron => Color::Rgb(176, 184, 194),
        BaseMap::Dark => Color::Rgb(71, 85, 105),
        BaseMap::Terrain => Color::Rgb(120, 140, 90),
    }
}

/// Canvas background as drawn, halved while the base map fades.
fn map_background(base_map: BaseMap, fading: bool) -> RGBColor {
    let RGBColor(r, g, b) = export::background(base_map);
    if fading {
        RGBColor(r / 2, g / 2, b / 2)
    } else {
        RGBColor(r, g, b)
    }
}

/// Feature color composited over the base map at the given opacity.
fn blend(fg: RGBColor, bg: RGBColor, opacity: f64) -> Color {
    let alpha = opacity.clamp(0.0, 1.0);
    let mix = |f: u8, b: u8| (f64::from(b) + (f64::from(f) - f64::from(b)) * alpha).round() as u8;
    Color::Rgb(mix(fg.0, bg.0), mix(fg.1, bg.1), mix(fg.2, bg.2))
}

fn marker_for_width(stroke_width: u32) -> Marker {
    match stroke_width {
        0 | 1 => Marker::Braille,
        2 => Marker::HalfBlock,
        _ => Marker::Block,
    }
}
