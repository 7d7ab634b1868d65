use super::*;
use crate::model::{ElementRole, PlaceholderLeg};

impl Pinboard<'_> {
    /// Pins a chat text region beneath the previous pin.
    pub fn pin_note(&mut self, text: &str) -> String {
        let width = self.layout.note_width;
        let (kind, height) = self.text_element(text, width);
        let rect = self.next_anchor(width, height);
        let el = Element::new(kind, rect).with_role(ElementRole::PinnedNote);
        let id = self.push(el);
        self.mark_pinned(&id);
        id
    }

    /// Replaces a pinned note's text in place. Returns false when the note is
    /// gone or already shows `text`.
    pub fn update_note(&mut self, id: &str, text: &str) -> bool {
        let width = self.layout.note_width;
        let (kind, height) = self.text_element(text, width);
        let Some(el) = self.doc.element_mut(id).filter(|el| el.is_live()) else {
            return false;
        };
        if el.kind == kind {
            return false;
        }
        el.kind = kind;
        el.height = height;
        el.bump();
        true
    }

    /// Removes a pinned note. The next pin stacks beneath the pin placed
    /// before it.
    pub fn drop_note(&mut self, id: &str) -> bool {
        let Some(el) = self.doc.element_mut(id).filter(|el| el.is_live()) else {
            return false;
        };
        el.tombstone();
        if self.book.last_pinned.as_deref() == Some(id) {
            self.book.last_pinned = self
                .doc
                .live_elements()
                .filter(|el| is_pin(el))
                .last()
                .map(|el| el.id.clone());
        }
        true
    }
}

fn is_pin(el: &Element) -> bool {
    match el.role.as_ref() {
        Some(ElementRole::PinnedNote) | Some(ElementRole::MediaResult { .. }) => true,
        Some(ElementRole::Placeholder { leg, .. }) => *leg == PlaceholderLeg::Frame,
        None => false,
    }
}
