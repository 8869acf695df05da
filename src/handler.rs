// handler.rs
//
// Keyboard and mouse dispatch. Anything that needs the network comes back
// as a `Command` for the event loop to run off the UI thread.

use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use geojson::FeatureCollection;

use crate::analysis::{AnalysisRequest, RadiusChoice};
use crate::app::{App, AppMode, CurrentScreen};
use crate::ui_state::{BaseMap, Severity};

const HINT_TOAST: Duration = Duration::from_secs(2);
const OPACITY_STEP: i16 = 5;
const PAN_STEP: f64 = 0.1;
const ZOOM_IN: f64 = 0.5;
const ZOOM_OUT: f64 = 2.0;
const MIN_SIDEBAR_PERCENT: u16 = 20;
const MAX_SIDEBAR_PERCENT: u16 = 60;

#[derive(Debug)]
pub enum Command {
    RunAnalysis(AnalysisRequest),
    Download(FeatureCollection),
}

pub fn handle_key(app: &mut App, key: KeyEvent, now: Instant) -> Option<Command> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return None;
    }

    if app.current_screen == CurrentScreen::Help {
        if matches!(
            key.code,
            KeyCode::Char('q') | KeyCode::Char('h') | KeyCode::Char('?') | KeyCode::Esc
        ) {
            app.current_screen = CurrentScreen::Map;
        }
        return None;
    }

    match app.current_mode {
        AppMode::Navigation => handle_navigation_key(app, key, now),
        AppMode::Searching => {
            handle_search_key(app, key);
            None
        }
        AppMode::EditingClassCount | AppMode::EditingRadius => {
            handle_edit_key(app, key);
            None
        }
    }
}

fn handle_navigation_key(app: &mut App, key: KeyEvent, now: Instant) -> Option<Command> {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('h') | KeyCode::Char('?') => app.current_screen = CurrentScreen::Help,

        // Map view
        KeyCode::Left if key.modifiers.contains(KeyModifiers::SHIFT) => app.pan_view(-PAN_STEP, 0.0),
        KeyCode::Right if key.modifiers.contains(KeyModifiers::SHIFT) => app.pan_view(PAN_STEP, 0.0),
        KeyCode::Up if key.modifiers.contains(KeyModifiers::SHIFT) => app.pan_view(0.0, PAN_STEP),
        KeyCode::Down if key.modifiers.contains(KeyModifiers::SHIFT) => app.pan_view(0.0, -PAN_STEP),
        KeyCode::Char('H') => app.pan_view(-PAN_STEP, 0.0),
        KeyCode::Char('L') => app.pan_view(PAN_STEP, 0.0),
        KeyCode::Char('K') => app.pan_view(0.0, PAN_STEP),
        KeyCode::Char('J') => app.pan_view(0.0, -PAN_STEP),
        KeyCode::Char('z') => app.zoom_view(ZOOM_IN),
        KeyCode::Char('Z') => app.zoom_view(ZOOM_OUT),

        // Upload list
        KeyCode::Down | KeyCode::Char('j') => app.move_selection(1),
        KeyCode::Up | KeyCode::Char('k') => app.move_selection(-1),
        KeyCode::Enter | KeyCode::Char(' ') => {
            if !app.select_upload() {
                app.ui.show_toast(
                    format!("No .zip files in {}", app.data_dir.display()),
                    Severity::Warning,
                    Some(HINT_TOAST),
                    now,
                );
            }
        }
        KeyCode::Char('/') => {
            app.current_mode = AppMode::Searching;
            app.previous_search_query_buffer
                .clone_from(&app.search_query_buffer);
            app.search_query_cursor = app.search_query_buffer.len();
        }
        KeyCode::F(5) => app.rescan_upload_dir(now),

        // Analysis form
        KeyCode::Char('t') => app.form.analysis_type = app.form.analysis_type.next(),
        KeyCode::Char('m') => app.form.method = app.form.method.next(),
        KeyCode::Char('c') => {
            app.previous_edit_buffer.clone_from(&app.form.class_count_input);
            app.edit_cursor = app.form.class_count_input.len();
            app.current_mode = AppMode::EditingClassCount;
        }
        KeyCode::Char('g') | KeyCode::Char('r') if !app.form.analysis_type.uses_centrality_params() => {
            app.ui.show_toast(
                "Metric and radius apply to centrality analyses only",
                Severity::Info,
                Some(HINT_TOAST),
                now,
            );
        }
        KeyCode::Char('g') => app.form.metric = app.form.metric.next(),
        KeyCode::Char('r') => {
            app.form.radius_choice = app.form.radius_choice.next();
            if app.form.radius_choice == RadiusChoice::Custom {
                app.previous_edit_buffer
                    .clone_from(&app.form.custom_radius_input);
                app.edit_cursor = app.form.custom_radius_input.len();
                app.current_mode = AppMode::EditingRadius;
            }
        }

        // Requests
        KeyCode::Char('a') => {
            return app.prepare_analysis(now).map(Command::RunAnalysis);
        }
        KeyCode::Char('s') => {
            if app.ui.download_enabled && !app.download_in_flight {
                return app.prepare_download().map(Command::Download);
            }
        }
        KeyCode::Char('x') => app.reset(now),
        KeyCode::Char('e') => app.export_map(now),

        // Layer style
        KeyCode::Char('p') => app.set_ramp(app.style.ramp.next()),
        KeyCode::Char('P') => app.set_ramp(app.style.ramp.previous()),
        KeyCode::Char('i') => app.toggle_invert(),
        KeyCode::Char('+') | KeyCode::Char('=') => app.adjust_opacity(OPACITY_STEP),
        KeyCode::Char('-') => app.adjust_opacity(-OPACITY_STEP),
        KeyCode::Char(']') => app.adjust_stroke_width(1),
        KeyCode::Char('[') => app.adjust_stroke_width(-1),
        KeyCode::Char('v') => app.toggle_layer_visibility(),
        KeyCode::Char('f') => app.fit_to_overlay(),
        KeyCode::Char('n') => app.inspect_step(true),
        KeyCode::Char('N') => app.inspect_step(false),
        KeyCode::Esc => {
            if app.inspected_feature.take().is_none() {
                app.ui.hide_toast();
            }
        }

        // Chrome
        KeyCode::Char('T') => app.ui.toggle_theme(now),
        KeyCode::Char('1') => app.ui.change_base_map(BaseMap::Positron, now),
        KeyCode::Char('2') => app.ui.change_base_map(BaseMap::Dark, now),
        KeyCode::Char('3') => app.ui.change_base_map(BaseMap::Terrain, now),
        KeyCode::Char('l') => app.ui.toggle_layer_panel(),
        KeyCode::Char('b') => app.ui.toggle_input_panel(),
        _ => {}
    }
    None
}

fn handle_search_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.current_mode = AppMode::Navigation,
        KeyCode::Esc => {
            app.search_query_buffer
                .clone_from(&app.previous_search_query_buffer);
            app.current_mode = AppMode::Navigation;
            app.refilter_files();
        }
        code => {
            if edit_buffer(
                &mut app.search_query_buffer,
                &mut app.search_query_cursor,
                code,
                |_| true,
            ) {
                app.selected_file_index = 0;
                app.refilter_files();
            }
        }
    }
}

fn handle_edit_key(app: &mut App, key: KeyEvent) {
    let radius = app.current_mode == AppMode::EditingRadius;
    let buffer = if radius {
        &mut app.form.custom_radius_input
    } else {
        &mut app.form.class_count_input
    };
    match key.code {
        KeyCode::Enter => app.current_mode = AppMode::Navigation,
        KeyCode::Esc => {
            buffer.clone_from(&app.previous_edit_buffer);
            app.current_mode = AppMode::Navigation;
        }
        code => {
            edit_buffer(buffer, &mut app.edit_cursor, code, |c| {
                c.is_ascii_digit() || (radius && c == '.')
            });
        }
    }
}

/// Single-line text editing. Returns true when the buffer changed.
fn edit_buffer(
    buffer: &mut String,
    cursor: &mut usize,
    code: KeyCode,
    accepts: impl Fn(char) -> bool,
) -> bool {
    if *cursor > buffer.len() {
        *cursor = buffer.len();
    }
    match code {
        KeyCode::Char(c) if c.is_ascii() && !c.is_ascii_control() && accepts(c) => {
            buffer.insert(*cursor, c);
            *cursor += 1;
            true
        }
        KeyCode::Left => {
            *cursor = cursor.saturating_sub(1);
            false
        }
        KeyCode::Right => {
            *cursor = (*cursor + 1).min(buffer.len());
            false
        }
        KeyCode::Home => {
            *cursor = 0;
            false
        }
        KeyCode::End => {
            *cursor = buffer.len();
            false
        }
        KeyCode::Backspace if *cursor > 0 => {
            *cursor -= 1;
            buffer.remove(*cursor);
            true
        }
        KeyCode::Delete if *cursor < buffer.len() => {
            buffer.remove(*cursor);
            true
        }
        _ => false,
    }
}

/// Mouse handling: divider drag, wheel zoom, cursor readout and feature picking.
pub fn handle_mouse(app: &mut App, mouse: MouseEvent, terminal_width: u16) {
    let divider_x = sidebar_divider_x(app, terminal_width);
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if app.ui.sidebar_visible() && mouse.column.abs_diff(divider_x) <= 1 {
                app.is_resizing = true;
            } else {
                app.inspect_at(mouse.column, mouse.row);
            }
        }
        MouseEventKind::Drag(MouseButton::Left) if app.is_resizing && terminal_width > 0 => {
            let percent = (u32::from(mouse.column) * 100 / u32::from(terminal_width)) as u16;
            app.sidebar_width_percentage = percent.clamp(MIN_SIDEBAR_PERCENT, MAX_SIDEBAR_PERCENT);
        }
        MouseEventKind::Up(MouseButton::Left) => app.is_resizing = false,
        MouseEventKind::ScrollUp => app.zoom_at(mouse.column, mouse.row, ZOOM_IN),
        MouseEventKind::ScrollDown => app.zoom_at(mouse.column, mouse.row, ZOOM_OUT),
        MouseEventKind::Moved => {
            app.cursor_coords = app.cell_to_lon_lat(mouse.column, mouse.row);
        }
        _ => {}
    }
}

/// Column of the sidebar's right border.
pub fn sidebar_divider_x(app: &App, terminal_width: u16) -> u16 {
    let width = u32::from(terminal_width) * u32::from(app.sidebar_width_percentage) / 100;
    (width as u16).saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_keys(app: &mut App, keys: &str, now: Instant) {
        for c in keys.chars() {
            handle_key(app, press(KeyCode::Char(c)), now);
        }
    }

    fn new_app() -> App {
        App::new(PathBuf::from("data"), std::env::temp_dir())
    }

    #[test]
    fn class_count_edit_accepts_digits_and_reverts_on_escape() {
        let now = Instant::now();
        let mut app = new_app();
        handle_key(&mut app, press(KeyCode::Char('c')), now);
        assert_eq!(app.current_mode, AppMode::EditingClassCount);

        handle_key(&mut app, press(KeyCode::Backspace), now);
        type_keys(&mut app, "7x", now);
        assert_eq!(app.form.class_count_input, "7");
        handle_key(&mut app, press(KeyCode::Enter), now);
        assert_eq!(app.current_mode, AppMode::Navigation);
        assert_eq!(app.form.class_count(), 7);

        handle_key(&mut app, press(KeyCode::Char('c')), now);
        type_keys(&mut app, "99", now);
        handle_key(&mut app, press(KeyCode::Esc), now);
        assert_eq!(app.form.class_count_input, "7");
    }

    #[test]
    fn run_without_upload_issues_no_command() {
        let now = Instant::now();
        let mut app = new_app();
        let command = handle_key(&mut app, press(KeyCode::Char('a')), now);
        assert!(command.is_none());
        assert_eq!(
            app.ui.toast.as_ref().map(|t| t.severity),
            Some(Severity::Error)
        );
    }

    #[test]
    fn run_with_upload_returns_request() {
        let now = Instant::now();
        let mut app = new_app();
        app.selected_upload = Some(PathBuf::from("data/roads.zip"));
        handle_key(&mut app, press(KeyCode::Char('t')), now);
        handle_key(&mut app, press(KeyCode::Char('m')), now);

        match handle_key(&mut app, press(KeyCode::Char('a')), now) {
            Some(Command::RunAnalysis(request)) => {
                assert_eq!(request.analysis_type.as_str(), "closeness");
                assert_eq!(request.classification_method.as_str(), "Equal Count (Quantile)");
                assert_eq!(request.file, PathBuf::from("data/roads.zip"));
            }
            other => panic!("expected analysis command, got {other:?}"),
        }
    }

    #[test]
    fn custom_radius_enters_edit_mode() {
        let now = Instant::now();
        let mut app = new_app();
        // Connectivity ignores radius.
        handle_key(&mut app, press(KeyCode::Char('r')), now);
        assert_eq!(app.form.radius_choice, RadiusChoice::Global);

        handle_key(&mut app, press(KeyCode::Char('t')), now);
        for _ in 0..4 {
            handle_key(&mut app, press(KeyCode::Char('r')), now);
        }
        assert_eq!(app.form.radius_choice, RadiusChoice::Custom);
        assert_eq!(app.current_mode, AppMode::EditingRadius);
        type_keys(&mut app, "250.5m", now);
        handle_key(&mut app, press(KeyCode::Enter), now);
        assert_eq!(app.form.radius().as_form_value(), "250.5");
    }

    #[test]
    fn download_key_needs_a_result() {
        let now = Instant::now();
        let mut app = new_app();
        assert!(handle_key(&mut app, press(KeyCode::Char('s')), now).is_none());
        assert!(!app.download_in_flight);
    }

    #[test]
    fn search_filters_and_escape_restores() {
        let now = Instant::now();
        let mut app = new_app();
        app.setup_upload_files(vec!["roads.zip".to_string(), "rail.zip".to_string()]);
        handle_key(&mut app, press(KeyCode::Char('/')), now);
        type_keys(&mut app, "rd", now);
        assert_eq!(app.filtered_upload_indices, vec![0]);
        handle_key(&mut app, press(KeyCode::Esc), now);
        assert_eq!(app.filtered_upload_indices, vec![0, 1]);
        assert_eq!(app.current_mode, AppMode::Navigation);
    }

    #[test]
    fn help_screen_round_trip_and_ctrl_c_quits() {
        let now = Instant::now();
        let mut app = new_app();
        handle_key(&mut app, press(KeyCode::Char('h')), now);
        assert_eq!(app.current_screen, CurrentScreen::Help);
        handle_key(&mut app, press(KeyCode::Char('q')), now);
        assert_eq!(app.current_screen, CurrentScreen::Map);
        assert!(!app.should_quit);

        handle_key(&mut app, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), now);
        assert!(app.should_quit);
    }

    #[test]
    fn dragging_divider_resizes_sidebar() {
        let mut app = new_app();
        let width = 100;
        let divider = sidebar_divider_x(&app, width);
        let mouse = |kind, column| MouseEvent {
            kind,
            column,
            row: 3,
            modifiers: KeyModifiers::NONE,
        };
        handle_mouse(&mut app, mouse(MouseEventKind::Down(MouseButton::Left), divider), width);
        assert!(app.is_resizing);
        handle_mouse(&mut app, mouse(MouseEventKind::Drag(MouseButton::Left), 45), width);
        assert_eq!(app.sidebar_width_percentage, 45);
        handle_mouse(&mut app, mouse(MouseEventKind::Drag(MouseButton::Left), 95), width);
        assert_eq!(app.sidebar_width_percentage, MAX_SIDEBAR_PERCENT);
        handle_mouse(&mut app, mouse(MouseEventKind::Up(MouseButton::Left), 95), width);
        assert!(!app.is_resizing);
    }

    #[test]
    fn shifted_keys_pan_and_plain_keys_move_the_list() {
        let now = Instant::now();
        let mut app = new_app();
        app.setup_upload_files(vec!["a.zip".to_string(), "b.zip".to_string()]);
        let start = app.view;

        handle_key(&mut app, KeyEvent::new(KeyCode::Right, KeyModifiers::SHIFT), now);
        assert!(app.view.x[0] > start.x[0]);
        assert_eq!(app.selected_file_index, 0);

        handle_key(&mut app, KeyEvent::new(KeyCode::Char('H'), KeyModifiers::SHIFT), now);
        assert!((app.view.x[0] - start.x[0]).abs() < 1e-9);

        handle_key(&mut app, KeyEvent::new(KeyCode::Char('K'), KeyModifiers::SHIFT), now);
        assert!(app.view.y[0] > start.y[0]);

        handle_key(&mut app, press(KeyCode::Down), now);
        assert_eq!(app.selected_file_index, 1);
    }

    #[test]
    fn zoom_keys_and_wheel_rescale_the_view() {
        let now = Instant::now();
        let mut app = new_app();
        let width = app.view.width();
        handle_key(&mut app, press(KeyCode::Char('z')), now);
        assert!((app.view.width() - width / 2.0).abs() < 1e-9);
        handle_key(&mut app, KeyEvent::new(KeyCode::Char('Z'), KeyModifiers::SHIFT), now);
        assert!((app.view.width() - width).abs() < 1e-9);

        app.map_area = ratatui::layout::Rect::new(50, 2, 60, 30);
        let wheel = |kind: MouseEventKind, column: u16| MouseEvent {
            kind,
            column,
            row: 10,
            modifiers: KeyModifiers::NONE,
        };
        handle_mouse(&mut app, wheel(MouseEventKind::ScrollUp, 70), 120);
        assert!((app.view.width() - width / 2.0).abs() < 1e-9);
        assert!(app.cursor_coords.is_some());
        handle_mouse(&mut app, wheel(MouseEventKind::ScrollDown, 70), 120);
        assert!((app.view.width() - width).abs() < 1e-9);

        // Scrolling over the sidebar leaves the map alone.
        handle_mouse(&mut app, wheel(MouseEventKind::ScrollUp, 5), 120);
        assert!((app.view.width() - width).abs() < 1e-9);
    }
}
