// app.rs

use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use geojson::FeatureCollection;
use ratatui::layout::Rect;
use tracing::{error, info, warn};

use crate::analysis::{AnalysisForm, AnalysisRequest, AnalysisResult};
use crate::error::ClientError;
use crate::export;
use crate::files::{self, UploadInfo};
use crate::geometry::ViewBounds;
use crate::overlay::{Overlay, StyleSettings};
use crate::palette::Ramp;
use crate::ui_state::{Severity, UiState};

/// Name the converted shapefile archive is saved under.
pub const DOWNLOAD_FILENAME: &str = "geonet_output.zip";

const VALIDATION_TOAST: Duration = Duration::from_secs(3);
const ERROR_TOAST: Duration = Duration::from_secs(5);
const WARNING_TOAST: Duration = Duration::from_secs(5);
const SUCCESS_TOAST: Duration = Duration::from_secs(2);
const DOWNLOAD_ERROR_TOAST: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CurrentScreen {
    Map,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppMode {
    Navigation,
    Searching,
    EditingClassCount,
    EditingRadius,
}

#[derive(Debug, Clone, Copy)]
pub enum TerminalEvent {
    Resize,
}

/// Results delivered back to the UI thread by request workers.
#[derive(Debug)]
pub enum BackendEvent {
    AnalysisFinished {
        class_count: u32,
        outcome: Result<FeatureCollection, ClientError>,
    },
    DownloadFinished(Result<Vec<u8>, ClientError>),
}

/// Session context: everything the page used to keep in globals.
pub struct App {
    pub current_screen: CurrentScreen,
    pub current_mode: AppMode,
    pub should_quit: bool,

    // Upload archives
    pub data_dir: PathBuf,
    pub upload_files: Vec<String>,
    pub selected_file_index: usize, // Index in `filtered_upload_indices`
    pub scroll_offset: usize,
    pub filtered_upload_indices: Vec<usize>,
    pub upload_info: Option<UploadInfo>,
    pub selected_upload: Option<PathBuf>,

    // Fuzzy search
    pub search_query_buffer: String,
    pub search_query_cursor: usize,
    pub previous_search_query_buffer: String,

    // Analysis form and the field being edited
    pub form: AnalysisForm,
    pub edit_cursor: usize,
    pub previous_edit_buffer: String,

    // Current result and its overlay
    pub result: Option<AnalysisResult>,
    pub overlay: Option<Overlay>,
    pub style: StyleSettings,
    pub view: ViewBounds,
    pub inspected_feature: Option<usize>,
    pub cursor_coords: Option<(f64, f64)>,
    pub analyses_in_flight: usize,
    pub download_in_flight: bool,

    pub output_dir: PathBuf,
    pub ui: UiState,
    pub tick_count: u64,

    // Layout, written by the renderer each frame
    pub map_area: Rect,
    pub sidebar_width_percentage: u16,
    pub is_resizing: bool,
}

impl App {
    pub fn new(data_dir: PathBuf, output_dir: PathBuf) -> App {
        App {
            current_screen: CurrentScreen::Map,
            current_mode: AppMode::Navigation,
            should_quit: false,

            data_dir,
            upload_files: Vec::new(),
            selected_file_index: 0,
            scroll_offset: 0,
            filtered_upload_indices: Vec::new(),
            upload_info: None,
            selected_upload: None,

            search_query_buffer: String::new(),
            search_query_cursor: 0,
            previous_search_query_buffer: String::new(),

            form: AnalysisForm::default(),
            edit_cursor: 0,
            previous_edit_buffer: String::new(),

            result: None,
            overlay: None,
            style: StyleSettings::default(),
            view: ViewBounds::default(),
            inspected_feature: None,
            cursor_coords: None,
            analyses_in_flight: 0,
            download_in_flight: false,

            output_dir,
            ui: UiState::default(),
            tick_count: 0,

            map_area: Rect::default(),
            sidebar_width_percentage: 34,
            is_resizing: false,
        }
    }

    /// Replaces the archive list, e.g. after rescanning the data directory.
    pub fn setup_upload_files(&mut self, files: Vec<String>) {
        self.upload_files = files;
        self.selected_file_index = 0;
        self.scroll_offset = 0;
        self.refilter_files();
    }

    pub fn rescan_upload_dir(&mut self, now: Instant) {
        match files::scan_upload_dir(&self.data_dir) {
            Ok(found) => {
                info!(count = found.len(), dir = %self.data_dir.display(), "scanned upload directory");
                self.setup_upload_files(found);
            }
            Err(e) => {
                warn!(dir = %self.data_dir.display(), "cannot read upload directory: {e}");
                self.setup_upload_files(Vec::new());
                self.ui.show_toast(
                    format!("Cannot read {}: {e}", self.data_dir.display()),
                    Severity::Error,
                    Some(ERROR_TOAST),
                    now,
                );
            }
        }
    }

    pub fn refilter_files(&mut self) {
        self.filtered_upload_indices = self
            .upload_files
            .iter()
            .enumerate()
            .filter(|(_, name)| files::fuzzy_match(&self.search_query_buffer, name))
            .map(|(i, _)| i)
            .collect();
        if self.selected_file_index >= self.filtered_upload_indices.len() {
            self.selected_file_index = self.filtered_upload_indices.len().saturating_sub(1);
        }
        self.refresh_upload_info();
    }

    pub fn highlighted_upload(&self) -> Option<PathBuf> {
        let original = *self.filtered_upload_indices.get(self.selected_file_index)?;
        self.upload_files
            .get(original)
            .map(|name| self.data_dir.join(name))
    }

    fn refresh_upload_info(&mut self) {
        let highlighted = self.highlighted_upload();
        let cached = self.upload_info.as_ref().map(|info| &info.path);
        if highlighted.as_ref() != cached {
            self.upload_info = highlighted.as_deref().map(UploadInfo::load);
        }
    }

    pub fn move_selection(&mut self, delta: isize) {
        let len = self.filtered_upload_indices.len();
        if len == 0 {
            return;
        }
        let next = self.selected_file_index.saturating_add_signed(delta);
        self.selected_file_index = next.min(len - 1);
        self.refresh_upload_info();
    }

    /// Keeps the highlighted row inside a list of `visible_rows`.
    pub fn clamp_scroll(&mut self, visible_rows: usize) {
        let len = self.filtered_upload_indices.len();
        if visible_rows == 0 || len <= visible_rows {
            self.scroll_offset = 0;
            return;
        }
        if self.selected_file_index >= self.scroll_offset + visible_rows {
            self.scroll_offset = self.selected_file_index + 1 - visible_rows;
        }
        if self.selected_file_index < self.scroll_offset {
            self.scroll_offset = self.selected_file_index;
        }
        self.scroll_offset = self.scroll_offset.min(len - visible_rows);
    }

    /// Uses the highlighted archive as the file to upload.
    pub fn select_upload(&mut self) -> bool {
        match self.highlighted_upload() {
            Some(path) => {
                info!(file = %path.display(), "selected upload");
                self.selected_upload = Some(path);
                true
            }
            None => false,
        }
    }

    pub fn selected_upload_name(&self) -> Option<String> {
        self.selected_upload
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }

    pub fn max_class_id(&self) -> u64 {
        self.result.as_ref().map_or(0, |r| r.max_class_id)
    }

    /// Validates the form and builds the request to send.
    ///
    /// Without a selected archive nothing is sent and the user is told so.
    pub fn prepare_analysis(&mut self, now: Instant) -> Option<AnalysisRequest> {
        let Some(file) = self.selected_upload.clone() else {
            self.ui.show_toast(
                "Please upload a .zip file first.",
                Severity::Error,
                Some(VALIDATION_TOAST),
                now,
            );
            return None;
        };

        let request = self.form.to_request(&file);
        self.ui.show_toast(
            format!("Running Analysis ({} classes)...", request.class_count),
            Severity::Info,
            None,
            now,
        );
        self.analyses_in_flight += 1;
        info!(
            file = %request.file.display(),
            analysis_type = request.analysis_type.as_str(),
            method = request.classification_method.as_str(),
            class_count = request.class_count,
            "submitting analysis"
        );
        Some(request)
    }

    /// Applies a finished request. Failures leave the current result alone.
    pub fn apply_analysis_outcome(
        &mut self,
        class_count: u32,
        outcome: Result<FeatureCollection, ClientError>,
        now: Instant,
    ) {
        self.analyses_in_flight = self.analyses_in_flight.saturating_sub(1);

        let collection = match outcome {
            Ok(collection) => collection,
            Err(err) => {
                error!(status = ?err.status(), "analysis failed: {err}");
                self.ui.show_toast(
                    format!("Error: {err}"),
                    Severity::Error,
                    Some(ERROR_TOAST),
                    now,
                );
                return;
            }
        };

        let result = AnalysisResult::new(collection);
        let feature_count = result.feature_count();
        let actual_classes = result.max_class_id.saturating_add(1);
        info!(
            features = feature_count,
            max_class_id = result.max_class_id,
            requested = class_count,
            "analysis complete"
        );

        self.result = Some(result);
        self.render_result();
        self.ui.download_enabled = true;

        if actual_classes < u64::from(class_count) {
            warn!(actual_classes, requested = class_count, "fewer classes than requested");
            self.ui.show_toast(
                format!(
                    "Warning: Data only supports {actual_classes} classes (requested {class_count})."
                ),
                Severity::Warning,
                Some(WARNING_TOAST),
                now,
            );
        } else {
            self.ui.show_toast(
                format!("Analysis complete ({feature_count} features)"),
                Severity::Success,
                Some(SUCCESS_TOAST),
                now,
            );
        }
    }

    /// Replaces the overlay with one built from the current result and
    /// fits the view to it.
    pub fn render_result(&mut self) {
        self.overlay = None;
        self.inspected_feature = None;
        let Some(result) = &self.result else {
            return;
        };

        let overlay = Overlay::build(result, &self.style);
        if let Some(bounds) = overlay.bounds() {
            self.view = ViewBounds::fit(bounds);
        }
        self.overlay = Some(overlay);
        self.ui.layer_panel_open = true;
    }

    /// Pushes the current style settings onto the existing overlay.
    pub fn apply_style(&mut self) {
        let max_class_id = self.max_class_id();
        if let Some(overlay) = &mut self.overlay {
            overlay.restyle(&self.style, max_class_id);
        }
    }

    pub fn set_ramp(&mut self, ramp: Ramp) {
        self.style.ramp = ramp;
        self.apply_style();
    }

    pub fn toggle_invert(&mut self) {
        self.style.invert = !self.style.invert;
        self.apply_style();
    }

    pub fn adjust_opacity(&mut self, delta: i16) {
        self.style.adjust_opacity(delta);
        self.apply_style();
    }

    pub fn adjust_stroke_width(&mut self, delta: i32) {
        self.style.adjust_stroke_width(delta);
        self.apply_style();
    }

    pub fn toggle_layer_visibility(&mut self) {
        if let Some(overlay) = &mut self.overlay {
            overlay.visible = !overlay.visible;
            if !overlay.visible {
                self.inspected_feature = None;
            }
        }
    }

    pub fn fit_to_overlay(&mut self) {
        if let Some(bounds) = self.overlay.as_ref().and_then(Overlay::bounds) {
            self.view = ViewBounds::fit(bounds);
        }
    }

    /// Zooms around the view centre; `factor` below 1 zooms in.
    pub fn zoom_view(&mut self, factor: f64) {
        let center = (
            (self.view.x[0] + self.view.x[1]) / 2.0,
            (self.view.y[0] + self.view.y[1]) / 2.0,
        );
        self.view = self.view.zoom(factor, center);
    }

    /// Zooms around the map cell under the mouse. Ignored off the canvas.
    pub fn zoom_at(&mut self, column: u16, row: u16, factor: f64) {
        if let Some(anchor) = self.cell_to_lon_lat(column, row) {
            self.view = self.view.zoom(factor, anchor);
            self.cursor_coords = self.cell_to_lon_lat(column, row);
        }
    }

    pub fn pan_view(&mut self, dx: f64, dy: f64) {
        self.view = self.view.pan(dx, dy);
    }

    /// Clears the result, the overlay and the selected upload.
    pub fn reset(&mut self, now: Instant) {
        self.overlay = None;
        self.result = None;
        self.inspected_feature = None;
        self.ui.download_enabled = false;
        self.ui.layer_panel_open = false;
        self.selected_upload = None;
        info!("session reset");
        self.ui.show_toast(
            "Map layers and data cleared",
            Severity::Success,
            Some(SUCCESS_TOAST),
            now,
        );
    }

    /// The collection to convert, if there is one.
    pub fn prepare_download(&mut self) -> Option<FeatureCollection> {
        let collection = self.result.as_ref()?.collection.clone();
        self.download_in_flight = true;
        info!(features = collection.features.len(), "requesting shapefile download");
        Some(collection)
    }

    pub fn finish_download(&mut self, outcome: Result<Vec<u8>, ClientError>, now: Instant) {
        self.download_in_flight = false;
        let saved = outcome
            .map_err(|e| e.to_string())
            .and_then(|bytes| self.save_download(&bytes).map_err(|e| e.to_string()));
        match saved {
            Ok(path) => {
                info!(path = %path.display(), "download saved");
                self.ui.show_toast("Download completed!", Severity::Success, Some(SUCCESS_TOAST), now);
            }
            Err(e) => {
                error!("download failed: {e}");
                self.ui.show_toast(
                    "Error preparing download",
                    Severity::Error,
                    Some(DOWNLOAD_ERROR_TOAST),
                    now,
                );
            }
        }
    }

    fn save_download(&self, bytes: &[u8]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(DOWNLOAD_FILENAME);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Writes the current map to a PNG in the output directory.
    pub fn export_map(&mut self, now: Instant) {
        let Some(overlay) = &self.overlay else {
            self.ui.show_toast("Nothing to export yet.", Severity::Warning, Some(WARNING_TOAST), now);
            return;
        };
        let file_name = format!(
            "geonet_map_{}.png",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        );
        let path = self.output_dir.join(file_name);
        let exported = fs::create_dir_all(&self.output_dir)
            .map_err(|e| e.to_string())
            .and_then(|_| {
                export::export_png(&path, overlay, &self.view, self.ui.base_map)
                    .map_err(|e| e.to_string())
            });
        match exported {
            Ok(()) => {
                info!(path = %path.display(), "map exported");
                self.ui.show_toast(
                    format!("Map exported to {}", path.display()),
                    Severity::Success,
                    Some(SUCCESS_TOAST),
                    now,
                );
            }
            Err(e) => {
                error!("export failed: {e}");
                self.ui.show_toast(format!("Export failed: {e}"), Severity::Error, Some(ERROR_TOAST), now);
            }
        }
    }

    /// Steps the feature popup forwards or backwards through the overlay.
    pub fn inspect_step(&mut self, forward: bool) {
        let Some(len) = self
            .overlay
            .as_ref()
            .filter(|o| o.visible && !o.is_empty())
            .map(Overlay::len)
        else {
            self.inspected_feature = None;
            return;
        };
        self.inspected_feature = Some(match (self.inspected_feature, forward) {
            (None, true) => 0,
            (None, false) => len - 1,
            (Some(i), true) => (i + 1) % len,
            (Some(i), false) => (i + len - 1) % len,
        });
    }

    /// Terminal cell to lon/lat, if it lies on the map canvas.
    pub fn cell_to_lon_lat(&self, column: u16, row: u16) -> Option<(f64, f64)> {
        let area = self.map_area;
        if area.width == 0
            || area.height == 0
            || column < area.x
            || row < area.y
            || column >= area.x + area.width
            || row >= area.y + area.height
        {
            return None;
        }
        let fx = (f64::from(column - area.x) + 0.5) / f64::from(area.width);
        let fy = (f64::from(row - area.y) + 0.5) / f64::from(area.height);
        Some((
            self.view.x[0] + fx * self.view.width(),
            self.view.y[1] - fy * self.view.height(),
        ))
    }

    /// Opens the popup for the feature under a clicked cell.
    pub fn inspect_at(&mut self, column: u16, row: u16) {
        let Some((lon, lat)) = self.cell_to_lon_lat(column, row) else {
            return;
        };
        let cell = (self.view.width() / f64::from(self.map_area.width.max(1)))
            .max(self.view.height() / f64::from(self.map_area.height.max(1)));
        self.inspected_feature = self
            .overlay
            .as_ref()
            .filter(|o| o.visible)
            .and_then(|o| o.nearest_feature(lon, lat, cell * 2.0));
    }

    pub fn tick(&mut self, now: Instant) {
        self.tick_count = self.tick_count.wrapping_add(1);
        self.ui.tick(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::{collection, line_feature};
    use crate::client::AnalysisBackend;
    use crate::palette::tests::to_hex;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records calls and replays canned outcomes.
    struct FakeBackend {
        calls: Mutex<Vec<AnalysisRequest>>,
        response: Mutex<Option<Result<FeatureCollection, ClientError>>>,
    }

    impl FakeBackend {
        fn replying(response: Result<FeatureCollection, ClientError>) -> Self {
            FakeBackend {
                calls: Mutex::new(Vec::new()),
                response: Mutex::new(Some(response)),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().map(|c| c.len()).unwrap_or(0)
        }
    }

    impl AnalysisBackend for FakeBackend {
        fn analyze(&self, request: &AnalysisRequest) -> Result<FeatureCollection, ClientError> {
            self.calls.lock().expect("lock").push(request.clone());
            self.response
                .lock()
                .expect("lock")
                .take()
                .unwrap_or_else(|| Err(ClientError::InvalidResponse("no canned reply".into())))
        }

        fn download(&self, _collection: &FeatureCollection) -> Result<Vec<u8>, ClientError> {
            Ok(b"PK".to_vec())
        }
    }

    /// What the event loop does for one submission, minus the worker thread.
    fn submit(app: &mut App, backend: &dyn AnalysisBackend, now: Instant) {
        if let Some(request) = app.prepare_analysis(now) {
            let outcome = backend.analyze(&request);
            app.apply_analysis_outcome(request.class_count, outcome, now);
        }
    }

    fn app_with_upload() -> App {
        let mut app = App::new(PathBuf::from("data"), std::env::temp_dir());
        app.selected_upload = Some(PathBuf::from("data/roads.zip"));
        app
    }

    fn three_class_result() -> FeatureCollection {
        collection(vec![
            line_feature(Some(json!(0)), Some(1.0), 0.0),
            line_feature(Some(json!(1)), Some(2.0), 1.0),
            line_feature(Some(json!(2)), Some(3.0), 2.0),
        ])
    }

    fn toast_text(app: &App) -> Option<(Severity, String)> {
        app.ui.toast.as_ref().map(|t| (t.severity, t.message.clone()))
    }

    #[test]
    fn missing_file_never_reaches_backend() {
        let now = Instant::now();
        let mut app = App::new(PathBuf::from("data"), std::env::temp_dir());
        let backend = FakeBackend::replying(Ok(three_class_result()));

        submit(&mut app, &backend, now);

        assert_eq!(backend.call_count(), 0);
        assert_eq!(
            toast_text(&app),
            Some((Severity::Error, "Please upload a .zip file first.".to_string()))
        );
        assert!(app.result.is_none());
        assert_eq!(app.analyses_in_flight, 0);
        app.tick(now + VALIDATION_TOAST);
        assert!(app.ui.toast.is_none());
    }

    #[test]
    fn fewer_classes_than_requested_warns_but_renders() {
        let now = Instant::now();
        let mut app = app_with_upload();
        app.form.class_count_input = "5".to_string();
        let backend = FakeBackend::replying(Ok(three_class_result()));

        submit(&mut app, &backend, now);

        assert_eq!(backend.call_count(), 1);
        assert_eq!(app.max_class_id(), 2);
        let overlay = app.overlay.as_ref().expect("overlay rendered");
        assert!(overlay.visible);
        let stops = app.style.colors(3);
        assert_eq!(stops.len(), 3);
        assert_eq!(
            to_hex(overlay.features()[2].style.color),
            to_hex(stops[2])
        );
        assert_eq!(
            toast_text(&app),
            Some((
                Severity::Warning,
                "Warning: Data only supports 3 classes (requested 5).".to_string()
            ))
        );
        assert!(app.ui.download_enabled);
        assert!(app.ui.layer_panel_open);
    }

    #[test]
    fn enough_classes_shows_success() {
        let now = Instant::now();
        let mut app = app_with_upload();
        app.form.class_count_input = "3".to_string();
        let backend = FakeBackend::replying(Ok(three_class_result()));

        submit(&mut app, &backend, now);

        assert_eq!(
            toast_text(&app).map(|(s, _)| s),
            Some(Severity::Success)
        );
    }

    #[test]
    fn server_error_keeps_previous_overlay() {
        let now = Instant::now();
        let mut app = app_with_upload();
        submit(&mut app, &FakeBackend::replying(Ok(three_class_result())), now);
        let view_before = app.view;
        let features_before = app.overlay.as_ref().map(Overlay::len);

        let failing = FakeBackend::replying(Err(ClientError::Server {
            status: 500,
            detail: "No valid .shp file".to_string(),
        }));
        submit(&mut app, &failing, now);

        assert_eq!(failing.call_count(), 1);
        assert_eq!(app.overlay.as_ref().map(Overlay::len), features_before);
        assert!(app.result.is_some());
        assert_eq!(app.view, view_before);
        assert_eq!(
            toast_text(&app),
            Some((Severity::Error, "Error: No valid .shp file".to_string()))
        );
    }

    #[test]
    fn restyle_does_not_move_the_view() {
        let now = Instant::now();
        let mut app = app_with_upload();
        submit(&mut app, &FakeBackend::replying(Ok(three_class_result())), now);
        let view = app.view;
        let bounds = app.overlay.as_ref().and_then(Overlay::bounds);

        app.set_ramp(Ramp::Magma);
        app.toggle_invert();
        app.adjust_opacity(-30);
        app.adjust_stroke_width(2);

        let overlay = app.overlay.as_ref().expect("overlay kept");
        assert_eq!(app.view, view);
        assert_eq!(overlay.bounds(), bounds);
        assert_eq!(
            to_hex(overlay.features()[0].style.color),
            to_hex(app.style.colors(3)[0])
        );
        assert!((overlay.features()[0].style.opacity - 0.5).abs() < 1e-9);
    }

    #[test]
    fn reset_clears_session() {
        let now = Instant::now();
        let mut app = app_with_upload();
        submit(&mut app, &FakeBackend::replying(Ok(three_class_result())), now);

        app.reset(now);

        assert!(app.result.is_none());
        assert!(app.overlay.is_none());
        assert_eq!(app.max_class_id(), 0);
        assert!(app.selected_upload.is_none());
        assert!(!app.ui.download_enabled);
        assert!(!app.ui.layer_panel_open);
        assert!(app.prepare_download().is_none());
    }

    #[test]
    fn download_saves_fixed_filename() {
        let now = Instant::now();
        let out = std::env::temp_dir().join(format!("geonet-app-dl-{}", std::process::id()));
        let mut app = App::new(PathBuf::from("data"), out.clone());
        app.selected_upload = Some(PathBuf::from("data/roads.zip"));
        let backend = FakeBackend::replying(Ok(three_class_result()));
        submit(&mut app, &backend, now);

        let collection = app.prepare_download().expect("result present");
        assert!(app.download_in_flight);
        app.finish_download(backend.download(&collection), now);

        assert!(!app.download_in_flight);
        assert_eq!(fs::read(out.join(DOWNLOAD_FILENAME)).ok(), Some(b"PK".to_vec()));
        assert_eq!(
            toast_text(&app),
            Some((Severity::Success, "Download completed!".to_string()))
        );

        app.finish_download(Err(ClientError::InvalidResponse("x".into())), now);
        assert_eq!(
            toast_text(&app),
            Some((Severity::Error, "Error preparing download".to_string()))
        );
        let _ = fs::remove_dir_all(out);
    }

    #[test]
    fn inspection_cycles_and_hit_tests() {
        let now = Instant::now();
        let mut app = app_with_upload();
        submit(&mut app, &FakeBackend::replying(Ok(three_class_result())), now);

        app.inspect_step(true);
        assert_eq!(app.inspected_feature, Some(0));
        app.inspect_step(false);
        assert_eq!(app.inspected_feature, Some(2));

        // Map canvas 30x10 cells over the fitted view.
        app.map_area = Rect::new(10, 5, 30, 10);
        assert_eq!(app.cell_to_lon_lat(9, 5), None);
        let (lon, lat) = app.cell_to_lon_lat(10, 5).expect("inside canvas");
        assert!(lon < app.view.x[0] + app.view.width() / 20.0);
        assert!(lat > app.view.y[1] - app.view.height() / 5.0);

        // Feature 1 runs (1,0)-(2,1); its midpoint sits at the canvas centre.
        app.view = ViewBounds {
            x: [0.0, 3.0],
            y: [0.0, 1.0],
        };
        app.inspect_at(10 + 15, 5 + 5);
        assert_eq!(app.inspected_feature, Some(1));
    }

    #[test]
    fn last_response_wins() {
        let now = Instant::now();
        let mut app = app_with_upload();
        let first = app.prepare_analysis(now).expect("request");
        let second = app.prepare_analysis(now).expect("request");
        assert_eq!(app.analyses_in_flight, 2);

        app.apply_analysis_outcome(
            second.class_count,
            Ok(collection(vec![line_feature(Some(json!(7)), None, 0.0)])),
            now,
        );
        app.apply_analysis_outcome(first.class_count, Ok(three_class_result()), now);

        assert_eq!(app.analyses_in_flight, 0);
        assert_eq!(app.max_class_id(), 2);
    }

    #[test]
    fn file_list_filters_and_selects() {
        let mut app = App::new(PathBuf::from("data"), std::env::temp_dir());
        app.setup_upload_files(vec![
            "colombo_roads.zip".to_string(),
            "kandy_rail.zip".to_string(),
            "galle_roads.zip".to_string(),
        ]);
        app.search_query_buffer = "rds".to_string();
        app.refilter_files();
        assert_eq!(app.filtered_upload_indices, vec![0, 2]);

        app.move_selection(1);
        assert!(app.select_upload());
        assert_eq!(app.selected_upload_name().as_deref(), Some("galle_roads.zip"));

        app.search_query_buffer = "zzz".to_string();
        app.refilter_files();
        assert!(app.highlighted_upload().is_none());
    }

    #[test]
    fn hidden_layer_has_no_reachable_popup() {
        let now = Instant::now();
        let mut app = app_with_upload();
        submit(&mut app, &FakeBackend::replying(Ok(three_class_result())), now);
        app.inspect_step(true);
        assert_eq!(app.inspected_feature, Some(0));

        app.toggle_layer_visibility();
        assert_eq!(app.inspected_feature, None);
        app.inspect_step(true);
        assert_eq!(app.inspected_feature, None);

        app.toggle_layer_visibility();
        app.inspect_step(false);
        assert_eq!(app.inspected_feature, Some(2));
    }

    #[test]
    fn export_writes_timestamped_png() {
        let now = Instant::now();
        let out = std::env::temp_dir().join(format!("geonet-app-export-{}", std::process::id()));
        let _ = fs::remove_dir_all(&out);
        let mut app = App::new(PathBuf::from("data"), out.clone());
        app.selected_upload = Some(PathBuf::from("data/roads.zip"));
        submit(&mut app, &FakeBackend::replying(Ok(three_class_result())), now);

        app.export_map(now);

        let pngs: Vec<PathBuf> = fs::read_dir(&out)
            .expect("output dir created")
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("geonet_map_") && n.ends_with(".png"))
            })
            .collect();
        assert_eq!(pngs.len(), 1);
        let bytes = fs::read(&pngs[0]).expect("read export");
        assert!(bytes.starts_with(b"\x89PNG\r\n\x1a\n"));
        assert_eq!(toast_text(&app).map(|(s, _)| s), Some(Severity::Success));
        let _ = fs::remove_dir_all(out);
    }

    #[test]
    fn export_without_overlay_only_warns() {
        let now = Instant::now();
        let out = std::env::temp_dir().join(format!("geonet-app-noexport-{}", std::process::id()));
        let _ = fs::remove_dir_all(&out);
        let mut app = App::new(PathBuf::from("data"), out.clone());

        app.export_map(now);

        assert_eq!(
            toast_text(&app),
            Some((Severity::Warning, "Nothing to export yet.".to_string()))
        );
        assert!(!out.exists());
    }

    #[test]
    fn mouse_zoom_is_anchored_and_pan_moves_view() {
        let mut app = App::new(PathBuf::from("data"), std::env::temp_dir());
        app.map_area = Rect::new(0, 0, 40, 20);
        app.view = ViewBounds {
            x: [0.0, 4.0],
            y: [0.0, 2.0],
        };
        let anchor = app.cell_to_lon_lat(10, 5).expect("on canvas");

        app.zoom_at(10, 5, 0.5);
        assert!((app.view.width() - 2.0).abs() < 1e-9);
        let after = app.cell_to_lon_lat(10, 5).expect("on canvas");
        assert!((after.0 - anchor.0).abs() < 1e-9);
        assert!((after.1 - anchor.1).abs() < 1e-9);

        let before = app.view;
        app.zoom_at(60, 5, 0.5);
        assert_eq!(app.view, before);

        app.pan_view(0.5, 0.0);
        assert!((app.view.x[0] - (before.x[0] + 1.0)).abs() < 1e-9);

        app.zoom_view(2.0);
        assert!((app.view.width() - 4.0).abs() < 1e-9);
    }
}
