//! Reserved regions and pinned results on a scene document.
//!
//! Everything here is a pure edit of one `SceneData` plus the scene's
//! `PinBook`; callers decide when the edited document is recorded and saved.

use serde::{Deserialize, Serialize};

use crate::model::{Element, ElementKind, PinLayout, Point, Rect, SceneData};

mod notes;
mod placeholder;
mod results;
mod wrap;

pub use self::placeholder::{Placeholder, placeholders};
pub use self::results::{MediaPayload, ResolveOutcome, has_result};
pub use self::wrap::{line_height, wrap_text};

/// Per-scene stacking bookkeeping for anchored pins, persisted with the
/// scene's cache entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PinBook {
    /// Element the next anchored pin is stacked beneath.
    #[serde(default)]
    pub last_pinned: Option<String>,

    /// Top-left of the pin column, fixed once the first pin is placed.
    #[serde(default)]
    pub origin: Option<Point>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Placement {
    /// Stacked top-to-bottom from the scene's pin origin (chat results).
    Anchored,
    /// To the right of the given selection bounds (direct edit actions).
    Beside(Rect),
}

/// Edits one scene's document and pin bookkeeping together.
pub struct Pinboard<'a> {
    doc: &'a mut SceneData,
    book: &'a mut PinBook,
    layout: &'a PinLayout,
}

impl<'a> Pinboard<'a> {
    pub fn new(doc: &'a mut SceneData, book: &'a mut PinBook, layout: &'a PinLayout) -> Self {
        Self { doc, book, layout }
    }

    pub fn doc(&self) -> &SceneData {
        self.doc
    }

    fn place(&mut self, placement: Placement, width: f64, height: f64) -> Rect {
        match placement {
            Placement::Anchored => self.next_anchor(width, height),
            Placement::Beside(sel) => {
                Rect::new(sel.right() + self.layout.gap, sel.y, width, height)
            }
        }
    }

    fn next_anchor(&mut self, width: f64, height: f64) -> Rect {
        let origin = match self.book.origin {
            Some(o) => o,
            None => {
                let o = self.default_origin();
                self.book.origin = Some(o);
                o
            }
        };
        let below = self
            .book
            .last_pinned
            .as_deref()
            .and_then(|id| self.doc.element(id))
            .filter(|el| el.is_live())
            .map(|el| el.bounds().bottom() + self.layout.gap);
        Rect::new(origin.x, below.unwrap_or(origin.y), width, height)
    }

    // Right of everything already drawn, aligned with its top edge.
    fn default_origin(&self) -> Point {
        let bounds = self
            .doc
            .live_elements()
            .map(Element::bounds)
            .reduce(|a, b| a.union(&b));
        match bounds {
            Some(b) => Point {
                x: b.right() + self.layout.gap,
                y: b.y,
            },
            None => Point::default(),
        }
    }

    fn mark_pinned(&mut self, id: &str) {
        self.book.last_pinned = Some(id.to_string());
    }

    fn text_element(&self, text: &str, width: f64) -> (ElementKind, f64) {
        let font_size = self.layout.font_size;
        let lines = wrap_text(text, width, font_size);
        let height = line_height(font_size) * lines.len().max(1) as f64;
        (
            ElementKind::Text {
                text: lines.join("\n"),
                font_size,
                original_text: Some(text.trim().to_string()),
            },
            height,
        )
    }

    fn push(&mut self, el: Element) -> String {
        let id = el.id.clone();
        self.doc.elements.push(el);
        id
    }
}

#[cfg(test)]
#[path = "tests/pins_tests.rs"]
mod tests;
