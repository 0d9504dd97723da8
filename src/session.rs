// ============================================================================
// FILTER SESSION — which image is loaded, which filter is active
// ============================================================================
//
// A session owns the untouched original and the most recent filter result.
// Filters always re-derive from the original (never chain on a prior
// result), and exactly one filter kind is active at a time: selecting a new
// kind supersedes the previous one. Presentation layers observe this state;
// they do not carry their own copy of it.
//
// Sessions are not meant for concurrent mutation. `apply_filter` takes
// `&mut self`, so the borrow checker already enforces the one-operation-at-
// a-time rule; callers that offload work to another thread must move the
// session there wholesale.
// ============================================================================

use image::RgbImage;
use std::str::FromStr;

use crate::error::Error;
use crate::ops::{clone, mask, stylize};

/// The closed set of available filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Cartoon,
    Sketch,
    OilPaint,
    ColorShift,
    Clone,
}

impl FilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Cartoon => "cartoon",
            FilterKind::Sketch => "sketch",
            FilterKind::OilPaint => "oilpaint",
            FilterKind::ColorShift => "colorshift",
            FilterKind::Clone => "clone",
        }
    }
}

impl FromStr for FilterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cartoon" => Ok(FilterKind::Cartoon),
            "sketch" => Ok(FilterKind::Sketch),
            "oilpaint" | "oil-paint" | "oil" => Ok(FilterKind::OilPaint),
            "colorshift" | "color-shift" | "dreamy" => Ok(FilterKind::ColorShift),
            "clone" => Ok(FilterKind::Clone),
            other => Err(format!(
                "unknown filter '{other}' (expected cartoon, sketch, oilpaint, colorshift or clone)"
            )),
        }
    }
}

/// Coarse session state, derived from what the session holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No image loaded.
    Empty,
    /// Original set, no result yet.
    Loaded,
    /// Original set and a filter result present.
    Filtered,
}

/// State machine tracking the loaded original, the active filter kind and
/// the currently displayed result.
#[derive(Debug, Default)]
pub struct FilterSession {
    original: Option<RgbImage>,
    active_kind: Option<FilterKind>,
    result: Option<RgbImage>,
    clone_seed: u32,
}

impl FilterSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed for the clone compositor's jitter; equal seeds reproduce equal
    /// collages.
    pub fn set_clone_seed(&mut self, seed: u32) {
        self.clone_seed = seed;
    }

    pub fn clone_seed(&self) -> u32 {
        self.clone_seed
    }

    /// Load a new original. Any previous result and active kind are
    /// discarded; they belonged to the old image.
    pub fn load(&mut self, image: RgbImage) {
        self.original = Some(image);
        self.active_kind = None;
        self.result = None;
    }

    /// Drop everything and return to the empty state.
    pub fn reset(&mut self) {
        self.original = None;
        self.active_kind = None;
        self.result = None;
    }

    pub fn state(&self) -> SessionState {
        match (&self.original, &self.result) {
            (None, _) => SessionState::Empty,
            (Some(_), None) => SessionState::Loaded,
            (Some(_), Some(_)) => SessionState::Filtered,
        }
    }

    pub fn original(&self) -> Option<&RgbImage> {
        self.original.as_ref()
    }

    /// The most recent filter result, if any. This is what export encodes.
    pub fn result(&self) -> Option<&RgbImage> {
        self.result.as_ref()
    }

    pub fn active_kind(&self) -> Option<FilterKind> {
        self.active_kind
    }

    /// Run the given filter on the untouched original and make its output
    /// the session's result. Blocking; returns when the new result is ready.
    pub fn apply_filter(&mut self, kind: FilterKind) -> Result<&RgbImage, Error> {
        let original = self.original.as_ref().ok_or(Error::NoImageLoaded)?;

        let output = match kind {
            FilterKind::Cartoon => stylize::cartoon_core(original)?,
            FilterKind::Sketch => stylize::sketch_core(original)?,
            FilterKind::OilPaint => stylize::oil_paint_core(original)?,
            FilterKind::ColorShift => stylize::color_shift_core(original)?,
            FilterKind::Clone => {
                let subject = mask::subject_mask(original);
                clone::clone_collage(original, &subject, self.clone_seed)?
            }
        };

        self.active_kind = Some(kind);
        Ok(self.result.insert(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn test_image() -> RgbImage {
        let mut img = RgbImage::new(24, 24);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgb([(x * 10 % 256) as u8, (y * 10 % 256) as u8, 128]);
        }
        img
    }

    #[test]
    fn filter_without_image_fails() {
        let mut session = FilterSession::new();
        assert_eq!(session.state(), SessionState::Empty);
        assert!(matches!(
            session.apply_filter(FilterKind::Cartoon),
            Err(Error::NoImageLoaded)
        ));
    }

    #[test]
    fn reset_discards_everything() {
        let mut session = FilterSession::new();
        session.load(test_image());
        session.apply_filter(FilterKind::Sketch).unwrap();
        session.reset();
        assert_eq!(session.state(), SessionState::Empty);
        assert!(session.original().is_none());
        assert!(session.result().is_none());
        assert!(matches!(
            session.apply_filter(FilterKind::Sketch),
            Err(Error::NoImageLoaded)
        ));
    }

    #[test]
    fn load_clears_prior_result_and_active_kind() {
        let mut session = FilterSession::new();
        session.load(test_image());
        session.apply_filter(FilterKind::ColorShift).unwrap();
        assert_eq!(session.state(), SessionState::Filtered);

        session.load(test_image());
        assert_eq!(session.state(), SessionState::Loaded);
        assert!(session.result().is_none());
        assert!(session.active_kind().is_none());
    }

    #[test]
    fn selecting_a_new_kind_supersedes_the_old_one() {
        let mut session = FilterSession::new();
        session.load(test_image());

        session.apply_filter(FilterKind::Cartoon).unwrap();
        assert_eq!(session.active_kind(), Some(FilterKind::Cartoon));

        session.apply_filter(FilterKind::Sketch).unwrap();
        assert_eq!(session.active_kind(), Some(FilterKind::Sketch));

        // Filters derive from the original, never from the prior result.
        let standalone = crate::ops::stylize::sketch_core(&test_image()).unwrap();
        assert_eq!(session.result().unwrap().as_raw(), standalone.as_raw());
    }

    #[test]
    fn clone_filter_runs_end_to_end() {
        let mut session = FilterSession::new();
        session.set_clone_seed(11);
        session.load(test_image());
        let result = session.apply_filter(FilterKind::Clone).unwrap();
        // round(24 * 1.3) x round(24 * 1.1)
        assert_eq!(result.dimensions(), (31, 26));
    }

    #[test]
    fn filter_kind_parses_from_cli_names() {
        assert_eq!("cartoon".parse::<FilterKind>().unwrap(), FilterKind::Cartoon);
        assert_eq!("oil-paint".parse::<FilterKind>().unwrap(), FilterKind::OilPaint);
        assert_eq!("DREAMY".parse::<FilterKind>().unwrap(), FilterKind::ColorShift);
        assert!("sepia".parse::<FilterKind>().is_err());
    }
}
