// ui_state.rs
//
// Cosmetic state: theme, base map, panels and toasts. Nothing here affects
// the analysis data.

use std::time::{Duration, Instant};

pub const THEME_REVEAL: Duration = Duration::from_millis(600);
pub const BASE_MAP_FADE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseMap {
    Positron,
    Dark,
    Terrain,
}

impl BaseMap {
    pub fn label(self) -> &'static str {
        match self {
            BaseMap::Positron => "Positron",
            BaseMap::Dark => "Dark",
            BaseMap::Terrain => "Terrain",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub severity: Severity,
    /// `None` keeps the toast until something replaces it.
    pub expires_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy)]
pub struct ThemeTransition {
    pub target: Theme,
    pub started: Instant,
}

impl ThemeTransition {
    pub fn progress(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        (elapsed / THEME_REVEAL.as_secs_f64()).clamp(0.0, 1.0)
    }

    /// Fraction of the screen covered by the reveal: grows towards dark,
    /// shrinks towards light.
    pub fn coverage(&self, now: Instant) -> f64 {
        let p = self.progress(now);
        // ease-out cubic
        let eased = 1.0 - (1.0 - p).powi(3);
        match self.target {
            Theme::Dark => eased,
            Theme::Light => 1.0 - eased,
        }
    }
}

#[derive(Debug)]
pub struct UiState {
    pub theme: Theme,
    pub base_map: BaseMap,
    /// Base map waiting for its fade-out to finish.
    pub pending_base_map: Option<(BaseMap, Instant)>,
    pub theme_transition: Option<ThemeTransition>,
    pub layer_panel_open: bool,
    pub input_panel_open: bool,
    pub toast: Option<Toast>,
    pub download_enabled: bool,
}

impl Default for UiState {
    fn default() -> Self {
        UiState {
            theme: Theme::Light,
            base_map: BaseMap::Positron,
            pending_base_map: None,
            theme_transition: None,
            layer_panel_open: false,
            input_panel_open: true,
            toast: None,
            download_enabled: false,
        }
    }
}

impl UiState {
    pub fn show_toast(
        &mut self,
        message: impl Into<String>,
        severity: Severity,
        ttl: Option<Duration>,
        now: Instant,
    ) {
        self.toast = Some(Toast {
            message: message.into(),
            severity,
            expires_at: ttl.map(|d| now + d),
        });
    }

    pub fn hide_toast(&mut self) {
        self.toast = None;
    }

    /// Flips the theme and swaps to the matching base map without a fade.
    pub fn toggle_theme(&mut self, now: Instant) {
        let (target, map) = match self.theme {
            Theme::Light => (Theme::Dark, BaseMap::Dark),
            Theme::Dark => (Theme::Light, BaseMap::Positron),
        };
        self.apply_base_map(map);
        self.theme = target;
        self.theme_transition = Some(ThemeTransition {
            target,
            started: now,
        });
    }

    /// Starts the fade; the map is swapped once [`BASE_MAP_FADE`] has passed.
    pub fn change_base_map(&mut self, map: BaseMap, now: Instant) {
        self.pending_base_map = Some((map, now));
    }

    /// Swaps the base map immediately. The dark map implies the dark theme.
    pub fn apply_base_map(&mut self, map: BaseMap) {
        self.pending_base_map = None;
        self.base_map = map;
        self.theme = if map == BaseMap::Dark {
            Theme::Dark
        } else {
            Theme::Light
        };
    }

    pub fn is_fading(&self) -> bool {
        self.pending_base_map.is_some()
    }

    pub fn toggle_layer_panel(&mut self) {
        self.layer_panel_open = !self.layer_panel_open;
    }

    pub fn toggle_input_panel(&mut self) {
        self.input_panel_open = !self.input_panel_open;
    }

    pub fn sidebar_visible(&self) -> bool {
        self.input_panel_open || self.layer_panel_open
    }

    /// Expires toasts and finishes transitions.
    pub fn tick(&mut self, now: Instant) {
        if let Some(toast) = &self.toast {
            if toast.expires_at.is_some_and(|at| now >= at) {
                self.toast = None;
            }
        }
        if let Some((map, started)) = self.pending_base_map {
            if now.saturating_duration_since(started) >= BASE_MAP_FADE {
                self.apply_base_map(map);
            }
        }
        if let Some(transition) = self.theme_transition {
            if transition.progress(now) >= 1.0 {
                self.theme_transition = None;
            }
        }
    }
}
