//! Crop editor state machine.
//!
//! ```text
//! Empty ──begin_loading──▶ Loading ──image_loaded──▶ Ready ──edit──▶ Editing
//!   ▲                        │                         │               │
//!   └──────load_failed───────┘                         └──confirm──────┴──▶ Confirmed
//!
//! any non-terminal state ──cancel──▶ Cancelled
//! ```
//!
//! The selection lives in percent of the *displayed* image so it survives
//! display resizes. Every operation keeps three invariants:
//!
//! - the rectangle stays inside `[0, 100]` on both axes,
//! - `width_px / height_px` equals the configured aspect ratio,
//! - the zoom stays within `[min_zoom, max_zoom]`.
//!
//! Editing is synchronous and does no I/O. `confirm` hands the source image
//! and the final displayed-pixel crop to the caller, which runs extraction.

use crate::config::CropConfig;
use crate::imaging::{
    PercentRect, PixelRect, center_aspect_rect, clamp_rect, percent_to_pixels, scale_about_center,
};
use crate::types::SourceImage;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorState {
    Empty,
    Loading,
    Ready,
    Editing,
    Confirmed,
    Cancelled,
}

impl EditorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, EditorState::Confirmed | EditorState::Cancelled)
    }

    fn is_editable(self) -> bool {
        matches!(self, EditorState::Ready | EditorState::Editing)
    }
}

impl fmt::Display for EditorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EditorState::Empty => "empty",
            EditorState::Loading => "loading",
            EditorState::Ready => "ready",
            EditorState::Editing => "editing",
            EditorState::Confirmed => "confirmed",
            EditorState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EditorError {
    #[error("Cannot {action} while the editor is {state}")]
    InvalidTransition {
        action: &'static str,
        state: EditorState,
    },
    #[error("The crop selection is empty")]
    DegenerateSelection,
}

/// Current selection: a percent rectangle, the zoom scale, and the aspect
/// ratio (width / height) it is locked to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropSelection {
    pub rect: PercentRect,
    pub zoom: f64,
    pub aspect: f64,
}

/// What `confirm` hands to the extractor.
#[derive(Debug)]
pub struct ConfirmedCrop {
    pub source: SourceImage,
    /// Crop in displayed pixels.
    pub crop: PixelRect,
    /// Size the image was displayed at.
    pub display: (u32, u32),
}

#[derive(Debug)]
pub struct CropEditor {
    state: EditorState,
    config: CropConfig,
    source: Option<SourceImage>,
    display: (u32, u32),
    selection: Option<CropSelection>,
}

impl CropEditor {
    pub fn new(config: &CropConfig) -> Self {
        Self {
            state: EditorState::Empty,
            config: config.clone(),
            source: None,
            display: (0, 0),
            selection: None,
        }
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    pub fn selection(&self) -> Option<&CropSelection> {
        self.selection.as_ref()
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    pub fn display(&self) -> (u32, u32) {
        self.display
    }

    fn transition_error(&self, action: &'static str) -> EditorError {
        EditorError::InvalidTransition {
            action,
            state: self.state,
        }
    }

    pub fn begin_loading(&mut self) -> Result<(), EditorError> {
        if self.state != EditorState::Empty {
            return Err(self.transition_error("start loading"));
        }
        self.state = EditorState::Loading;
        Ok(())
    }

    /// Accept a decoded image and compute the initial centered selection.
    ///
    /// `display` is the size the image is shown at; `None` means natural size.
    /// On a wrong-state call the source is dropped, which releases its preview.
    pub fn image_loaded(
        &mut self,
        source: SourceImage,
        display: Option<(u32, u32)>,
    ) -> Result<(), EditorError> {
        if self.state != EditorState::Loading {
            return Err(self.transition_error("accept an image"));
        }
        let display = match display {
            Some((w, h)) if w > 0 && h > 0 => (w, h),
            _ => source.natural_dimensions(),
        };
        let aspect = self.config.aspect();
        self.selection = Some(CropSelection {
            rect: center_aspect_rect(display, aspect, self.config.initial_coverage),
            zoom: 1.0,
            aspect,
        });
        self.display = display;
        self.source = Some(source);
        self.state = EditorState::Ready;
        Ok(())
    }

    pub fn load_failed(&mut self) -> Result<(), EditorError> {
        if self.state != EditorState::Loading {
            return Err(self.transition_error("fail loading"));
        }
        self.state = EditorState::Empty;
        Ok(())
    }

    fn edit(&mut self, action: &'static str) -> Result<&mut CropSelection, EditorError> {
        if !self.state.is_editable() {
            return Err(self.transition_error(action));
        }
        self.state = EditorState::Editing;
        self.selection
            .as_mut()
            .ok_or(EditorError::InvalidTransition {
                action,
                state: EditorState::Editing,
            })
    }

    /// Percent height that keeps `width_pct` at the locked pixel aspect.
    fn height_for(&self, width_pct: f64) -> f64 {
        let (w, h) = self.display;
        let aspect = self.config.aspect();
        width_pct * w as f64 / (aspect * h as f64)
    }

    /// Move the selection's top-left corner, keeping its size.
    pub fn move_to(&mut self, x: f64, y: f64) -> Result<(), EditorError> {
        let selection = self.edit("move the selection")?;
        selection.rect.x = x.max(0.0);
        selection.rect.y = y.max(0.0);
        selection.rect = clamp_rect(selection.rect);
        Ok(())
    }

    /// Set the selection width in percent; the height follows the aspect ratio
    /// and the center stays put.
    /// A non-finite width leaves the selection as it is.
    pub fn resize(&mut self, width_pct: f64) -> Result<(), EditorError> {
        let width = width_pct.max(0.0);
        let height = self.height_for(width);
        let selection = self.edit("resize the selection")?;
        if !width_pct.is_finite() || !height.is_finite() {
            return Ok(());
        }
        let (cx, cy) = selection.rect.center();
        selection.rect = clamp_rect(PercentRect {
            x: cx - width / 2.0,
            y: cy - height / 2.0,
            width,
            height,
        });
        Ok(())
    }

    /// Change the zoom scale. The selection is rescaled about its center by
    /// `old / new`, then shrunk and shifted back inside the image if needed.
    pub fn set_zoom(&mut self, scale: f64) -> Result<(), EditorError> {
        let (min, max) = (self.config.min_zoom, self.config.max_zoom);
        let selection = self.edit("zoom")?;
        let zoom = if scale.is_finite() {
            scale.clamp(min, max)
        } else {
            selection.zoom
        };
        let factor = selection.zoom / zoom;
        selection.rect = clamp_rect(scale_about_center(selection.rect, factor));
        selection.zoom = zoom;
        Ok(())
    }

    /// Place the selection by its displayed-pixel origin and width. The
    /// height follows from the aspect ratio.
    pub fn select_pixels(&mut self, x: u32, y: u32, width: u32) -> Result<(), EditorError> {
        let (disp_w, disp_h) = self.display;
        let width_pct = width as f64 / disp_w.max(1) as f64 * 100.0;
        let height_pct = self.height_for(width_pct);
        let selection = self.edit("select a region")?;
        if !height_pct.is_finite() {
            return Ok(());
        }
        selection.rect = clamp_rect(PercentRect {
            x: x as f64 / disp_w.max(1) as f64 * 100.0,
            y: y as f64 / disp_h.max(1) as f64 * 100.0,
            width: width_pct,
            height: height_pct,
        });
        Ok(())
    }

    /// The selection in displayed pixels.
    pub fn pixel_crop(&self) -> Option<PixelRect> {
        let selection = self.selection.as_ref()?;
        Some(percent_to_pixels(
            selection.rect,
            self.display,
            selection.aspect,
        ))
    }

    /// Whether `confirm` would succeed.
    pub fn can_confirm(&self) -> bool {
        self.state.is_editable() && self.pixel_crop().is_some_and(|c| !c.is_degenerate())
    }

    pub fn confirm(&mut self) -> Result<ConfirmedCrop, EditorError> {
        if !self.state.is_editable() {
            return Err(self.transition_error("confirm"));
        }
        let crop = self
            .pixel_crop()
            .filter(|c| !c.is_degenerate())
            .ok_or(EditorError::DegenerateSelection)?;
        let source = self
            .source
            .take()
            .ok_or_else(|| self.transition_error("confirm"))?;
        self.state = EditorState::Confirmed;
        Ok(ConfirmedCrop {
            source,
            crop,
            display: self.display,
        })
    }

    /// Abort the session and release the source image.
    pub fn cancel(&mut self) -> Result<(), EditorError> {
        if self.state.is_terminal() {
            return Err(self.transition_error("cancel"));
        }
        if let Some(mut source) = self.source.take() {
            source.release();
        }
        self.selection = None;
        self.state = EditorState::Cancelled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::PreviewRegistry;
    use crate::test_helpers::source_image;
    use std::sync::Arc;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    fn ready_editor(previews: &Arc<PreviewRegistry>, w: u32, h: u32) -> CropEditor {
        let mut editor = CropEditor::new(&CropConfig::default());
        editor.begin_loading().unwrap();
        editor
            .image_loaded(source_image(previews, w, h), None)
            .unwrap();
        editor
    }

    fn assert_aspect(editor: &CropEditor) {
        let sel = editor.selection().unwrap();
        let (w, h) = editor.display();
        let px_w = sel.rect.width * w as f64;
        let px_h = sel.rect.height * h as f64;
        assert!(approx(px_w / px_h, sel.aspect), "aspect {}", px_w / px_h);
        assert!(sel.rect.x >= 0.0 && sel.rect.x + sel.rect.width <= 100.0 + 1e-9);
        assert!(sel.rect.y >= 0.0 && sel.rect.y + sel.rect.height <= 100.0 + 1e-9);
    }

    #[test]
    fn starts_empty() {
        let editor = CropEditor::new(&CropConfig::default());
        assert_eq!(editor.state(), EditorState::Empty);
        assert!(!editor.can_confirm());
        assert!(editor.pixel_crop().is_none());
    }

    #[test]
    fn initial_selection_is_centered_square() {
        let previews = PreviewRegistry::new();
        let editor = ready_editor(&previews, 2000, 1000);
        assert_eq!(editor.state(), EditorState::Ready);

        let crop = editor.pixel_crop().unwrap();
        assert_eq!(crop.width, 900);
        assert_eq!(crop.height, 900);
        assert_eq!(crop.x, 550);
        assert_eq!(crop.y, 50);
        assert_aspect(&editor);
        assert!(editor.can_confirm());
    }

    #[test]
    fn display_size_drives_selection() {
        let previews = PreviewRegistry::new();
        let mut editor = CropEditor::new(&CropConfig::default());
        editor.begin_loading().unwrap();
        editor
            .image_loaded(source_image(&previews, 2000, 1000), Some((1000, 500)))
            .unwrap();
        assert_eq!(editor.display(), (1000, 500));
        assert_eq!(editor.pixel_crop().unwrap().width, 450);
    }

    #[test]
    fn edits_move_to_editing() {
        let previews = PreviewRegistry::new();
        let mut editor = ready_editor(&previews, 1000, 1000);
        editor.move_to(0.0, 0.0).unwrap();
        assert_eq!(editor.state(), EditorState::Editing);
        let sel = editor.selection().unwrap();
        assert!(approx(sel.rect.x, 0.0));
        assert!(approx(sel.rect.width, 90.0));
    }

    #[test]
    fn move_past_edge_is_clamped() {
        let previews = PreviewRegistry::new();
        let mut editor = ready_editor(&previews, 1000, 1000);
        editor.move_to(95.0, 95.0).unwrap();
        let sel = editor.selection().unwrap();
        assert!(approx(sel.rect.x, 10.0));
        assert!(approx(sel.rect.y, 10.0));
    }

    #[test]
    fn resize_keeps_center_and_aspect() {
        let previews = PreviewRegistry::new();
        let mut editor = ready_editor(&previews, 2000, 1000);
        let before = editor.selection().unwrap().rect.center();
        editor.resize(20.0).unwrap();
        let sel = editor.selection().unwrap();
        assert!(approx(sel.rect.width, 20.0));
        assert!(approx(sel.rect.height, 40.0));
        assert!(approx(sel.rect.center().0, before.0));
        assert_aspect(&editor);
    }

    #[test]
    fn resize_larger_than_image_is_shrunk() {
        let previews = PreviewRegistry::new();
        let mut editor = ready_editor(&previews, 2000, 1000);
        editor.resize(80.0).unwrap();
        let sel = editor.selection().unwrap();
        assert!(approx(sel.rect.height, 100.0));
        assert!(approx(sel.rect.width, 50.0));
        assert_aspect(&editor);
    }

    #[test]
    fn zoom_in_shrinks_selection_about_center() {
        let previews = PreviewRegistry::new();
        let mut editor = ready_editor(&previews, 1000, 1000);
        editor.set_zoom(2.0).unwrap();
        let sel = editor.selection().unwrap();
        assert!(approx(sel.rect.width, 45.0));
        assert_eq!(sel.rect.center(), (50.0, 50.0));
        assert_eq!(sel.zoom, 2.0);
    }

    #[test]
    fn zoom_out_is_clamped_inside_image() {
        let previews = PreviewRegistry::new();
        let mut editor = ready_editor(&previews, 1200, 800);
        editor.move_to(100.0, 100.0).unwrap();
        editor.set_zoom(0.5).unwrap();
        assert_aspect(&editor);
        let sel = editor.selection().unwrap();
        assert!(approx(sel.rect.height, 100.0));
    }

    #[test]
    fn zoom_is_bounded() {
        let previews = PreviewRegistry::new();
        let mut editor = ready_editor(&previews, 1000, 1000);
        editor.set_zoom(10.0).unwrap();
        assert_eq!(editor.selection().unwrap().zoom, 3.0);
        editor.set_zoom(0.01).unwrap();
        assert_eq!(editor.selection().unwrap().zoom, 0.5);
        editor.set_zoom(f64::NAN).unwrap();
        assert_eq!(editor.selection().unwrap().zoom, 0.5);
    }

    #[test]
    fn resize_to_fractional_oversize_fills_image() {
        let previews = PreviewRegistry::new();
        let mut editor = ready_editor(&previews, 1000, 1000);
        editor.resize(128.766).unwrap();
        let sel = editor.selection().unwrap();
        assert_eq!(sel.rect.width, 100.0);
        assert_eq!((sel.rect.x, sel.rect.y), (0.0, 0.0));
        assert_aspect(&editor);
    }

    #[test]
    fn resize_non_finite_keeps_selection() {
        let previews = PreviewRegistry::new();
        let mut editor = ready_editor(&previews, 1000, 1000);
        let before = editor.selection().unwrap().rect;
        editor.resize(f64::INFINITY).unwrap();
        editor.resize(f64::NAN).unwrap();
        assert_eq!(editor.selection().unwrap().rect, before);
        assert_eq!(editor.state(), EditorState::Editing);
    }

    #[test]
    fn resize_sweep_stays_inside_image() {
        let previews = PreviewRegistry::new();
        for (w, h) in [(1000, 1000), (2000, 1000), (800, 1200)] {
            let mut editor = ready_editor(&previews, w, h);
            for step in 0..300_000 {
                editor.resize(100.0 + step as f64 * 0.001).unwrap();
                assert_aspect(&editor);
            }
        }
    }

    #[test]
    fn select_pixels_sweep_stays_inside_image() {
        let previews = PreviewRegistry::new();
        for (w, h) in [(1000, 1000), (2000, 1000), (999, 1333)] {
            let mut editor = ready_editor(&previews, w, h);
            for width in 1..=4 * w {
                editor.select_pixels(width % 97, width % 89, width).unwrap();
                assert_aspect(&editor);
                assert!(editor.pixel_crop().is_some_and(|c| c.x + c.width <= w));
            }
        }
    }

    #[test]
    fn zoom_sweep_stays_inside_image() {
        let previews = PreviewRegistry::new();
        for (w, h) in [(1000, 1000), (1200, 800), (640, 480)] {
            let mut editor = ready_editor(&previews, w, h);
            for step in 0..=2500 {
                editor.set_zoom(0.5 + step as f64 * 0.001).unwrap();
                assert_aspect(&editor);
                editor.set_zoom(0.5).unwrap();
                assert_aspect(&editor);
            }
        }
    }

    #[test]
    fn degenerate_selection_cannot_confirm() {
        let previews = PreviewRegistry::new();
        let mut editor = ready_editor(&previews, 1000, 1000);
        editor.resize(0.0).unwrap();
        assert!(!editor.can_confirm());
        assert_eq!(editor.confirm().unwrap_err(), EditorError::DegenerateSelection);
        assert_eq!(editor.state(), EditorState::Editing);
    }

    #[test]
    fn select_pixels_uses_display_space() {
        let previews = PreviewRegistry::new();
        let mut editor = ready_editor(&previews, 2000, 1000);
        editor.select_pixels(500, 0, 1000).unwrap();
        assert_eq!(
            editor.pixel_crop().unwrap(),
            PixelRect {
                x: 500,
                y: 0,
                width: 1000,
                height: 1000
            }
        );
    }

    #[test]
    fn confirm_hands_over_source() {
        let previews = PreviewRegistry::new();
        let mut editor = ready_editor(&previews, 800, 600);
        let confirmed = editor.confirm().unwrap();
        assert_eq!(editor.state(), EditorState::Confirmed);
        assert_eq!(confirmed.display, (800, 600));
        assert_eq!(confirmed.source.width, 800);
        assert!(editor.source().is_none());
        assert_eq!(previews.live_count(), 1);
    }

    #[test]
    fn cancel_releases_source() {
        let previews = PreviewRegistry::new();
        let mut editor = ready_editor(&previews, 800, 600);
        assert_eq!(previews.live_count(), 1);
        editor.cancel().unwrap();
        assert_eq!(editor.state(), EditorState::Cancelled);
        assert_eq!(previews.live_count(), 0);
    }

    #[test]
    fn terminal_states_reject_everything() {
        let previews = PreviewRegistry::new();
        let mut editor = ready_editor(&previews, 800, 600);
        editor.cancel().unwrap();
        assert!(matches!(
            editor.confirm(),
            Err(EditorError::InvalidTransition { .. })
        ));
        assert!(editor.cancel().is_err());
        assert!(editor.set_zoom(2.0).is_err());
        assert!(editor.begin_loading().is_err());
    }

    #[test]
    fn wrong_state_transitions() {
        let previews = PreviewRegistry::new();
        let mut editor = CropEditor::new(&CropConfig::default());
        assert!(editor.move_to(1.0, 1.0).is_err());
        assert!(editor.load_failed().is_err());
        assert!(
            editor
                .image_loaded(source_image(&previews, 10, 10), None)
                .is_err()
        );
        // Rejected source is dropped, not leaked
        assert_eq!(previews.live_count(), 0);
    }

    #[test]
    fn load_failure_returns_to_empty() {
        let mut editor = CropEditor::new(&CropConfig::default());
        editor.begin_loading().unwrap();
        editor.load_failed().unwrap();
        assert_eq!(editor.state(), EditorState::Empty);
        editor.begin_loading().unwrap();
        assert_eq!(editor.state(), EditorState::Loading);
    }

    #[test]
    fn non_square_aspect_ratio() {
        let previews = PreviewRegistry::new();
        let config = CropConfig {
            aspect_ratio: [4, 3],
            ..CropConfig::default()
        };
        let mut editor = CropEditor::new(&config);
        editor.begin_loading().unwrap();
        editor
            .image_loaded(source_image(&previews, 1000, 1000), None)
            .unwrap();
        assert_aspect(&editor);
        editor.set_zoom(0.5).unwrap();
        assert_aspect(&editor);
        let crop = editor.pixel_crop().unwrap();
        assert_eq!(crop.width * 3, crop.height * 4);
    }
}
