use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::error::SelectionError;
use crate::model::Axis;

pub const DEFAULT_CONTENT_PLACEHOLDER: &str = "Content";
pub const DEFAULT_FUNCTION_PLACEHOLDER: &str = "Instruction";

/// The "content only" / "instruction only" switches. At most one is on.
///
/// "Content only" suppresses the function axis (its card shows a placeholder and needs no
/// selection); "instruction only" does the same to the content axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AxisMode {
    content_only: bool,
    function_only: bool,
}

impl AxisMode {
    pub fn content_only(self) -> bool {
        self.content_only
    }

    pub fn function_only(self) -> bool {
        self.function_only
    }

    /// Whether `axis` has its own only-mode switched on.
    pub fn only(self, axis: Axis) -> bool {
        match axis {
            Axis::Content => self.content_only,
            Axis::Function => self.function_only,
        }
    }

    /// Turns the only-mode of `axis` on or off; turning it on clears the other axis's switch.
    pub fn set_only(&mut self, axis: Axis, on: bool) {
        match axis {
            Axis::Content => self.content_only = on,
            Axis::Function => self.function_only = on,
        }
        if on {
            match axis {
                Axis::Content => self.function_only = false,
                Axis::Function => self.content_only = false,
            }
        }
    }

    /// An axis is suppressed when the other axis is in only-mode.
    pub fn is_suppressed(self, axis: Axis) -> bool {
        self.only(axis.other())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placeholders {
    pub content: String,
    pub function: String,
}

impl Default for Placeholders {
    fn default() -> Self {
        Self {
            content: DEFAULT_CONTENT_PLACEHOLDER.to_string(),
            function: DEFAULT_FUNCTION_PLACEHOLDER.to_string(),
        }
    }
}

impl Placeholders {
    pub fn for_axis(&self, axis: Axis) -> &str {
        match axis {
            Axis::Content => &self.content,
            Axis::Function => &self.function,
        }
    }
}

/// The two card faces as last displayed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CardResult {
    pub content: String,
    pub function: String,
}

impl CardResult {
    pub fn placeholders(p: &Placeholders) -> Self {
        Self {
            content: p.content.clone(),
            function: p.function.clone(),
        }
    }

    pub fn set(&mut self, axis: Axis, value: String) {
        match axis {
            Axis::Content => self.content = value,
            Axis::Function => self.function = value,
        }
    }
}

/// Outcome of drawing both cards; each axis succeeds or fails on its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DualDraw {
    pub content: Result<String, SelectionError>,
    pub function: Result<String, SelectionError>,
}

impl DualDraw {
    pub fn get(&self, axis: Axis) -> &Result<String, SelectionError> {
        match axis {
            Axis::Content => &self.content,
            Axis::Function => &self.function,
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &SelectionError> {
        [&self.content, &self.function]
            .into_iter()
            .filter_map(|r| r.as_ref().err())
    }

    pub fn is_ok(&self) -> bool {
        self.content.is_ok() && self.function.is_ok()
    }
}

/// Uniform, memoryless picker over eligible items.
pub struct DrawEngine<R = StdRng> {
    rng: R,
    placeholders: Placeholders,
}

impl DrawEngine<StdRng> {
    pub fn from_entropy(placeholders: Placeholders) -> Self {
        Self::with_rng(StdRng::from_entropy(), placeholders)
    }

    pub fn seeded(seed: u64, placeholders: Placeholders) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), placeholders)
    }
}

impl<R: Rng> DrawEngine<R> {
    pub fn with_rng(rng: R, placeholders: Placeholders) -> Self {
        Self { rng, placeholders }
    }

    pub fn placeholders(&self) -> &Placeholders {
        &self.placeholders
    }

    /// Draws one card face. A suppressed axis always yields its placeholder; otherwise an empty
    /// eligible set is an error and a non-empty one yields a uniformly chosen element.
    pub fn draw_axis(
        &mut self,
        axis: Axis,
        eligible: &[String],
        mode: AxisMode,
    ) -> Result<String, SelectionError> {
        if mode.is_suppressed(axis) {
            return Ok(self.placeholders.for_axis(axis).to_string());
        }
        eligible
            .choose(&mut self.rng)
            .cloned()
            .ok_or(SelectionError::NoEligibleItems(axis))
    }

    pub fn draw(&mut self, content: &[String], function: &[String], mode: AxisMode) -> DualDraw {
        DualDraw {
            content: self.draw_axis(Axis::Content, content, mode),
            function: self.draw_axis(Axis::Function, function, mode),
        }
    }
}
