use serde_json::Value;

use super::*;
use crate::model::{ElementRole, JobId, MediaKind, PlaceholderLeg, random_id};

const LABEL_INSET: f64 = 12.0;

/// A reserved frame+label pair. Both legs carry the same single group id and
/// are only ever tombstoned together.
#[derive(Clone, Debug, PartialEq)]
pub struct Placeholder {
    pub group: String,
    pub frame_id: String,
    pub label_id: Option<String>,
    pub media: MediaKind,
    pub job_id: Option<JobId>,
    pub bounds: Rect,
}

/// Live placeholders in document order (by frame position).
pub fn placeholders(doc: &SceneData) -> Vec<Placeholder> {
    let mut out: Vec<Placeholder> = Vec::new();
    for el in doc.live_elements() {
        let Some(ElementRole::Placeholder {
            group,
            leg,
            media,
            job_id,
        }) = el.role.as_ref()
        else {
            continue;
        };
        if *leg != PlaceholderLeg::Frame {
            continue;
        }
        let label_id = doc
            .live_elements()
            .find(|other| {
                matches!(
                    other.role.as_ref(),
                    Some(ElementRole::Placeholder { group: g, leg: PlaceholderLeg::Label, .. }) if g == group
                )
            })
            .map(|other| other.id.clone());
        out.push(Placeholder {
            group: group.clone(),
            frame_id: el.id.clone(),
            label_id,
            media: *media,
            job_id: job_id.clone(),
            bounds: el.bounds(),
        });
    }
    out
}

pub(super) fn find_placeholder(doc: &SceneData, group: &str) -> Option<Placeholder> {
    placeholders(doc).into_iter().find(|p| p.group == group)
}

impl Pinboard<'_> {
    pub fn create_placeholder(
        &mut self,
        label: &str,
        media: MediaKind,
        job_id: Option<JobId>,
        placement: Placement,
    ) -> Placeholder {
        let (width, height) = match media {
            MediaKind::Image => (self.layout.placeholder_width, self.layout.placeholder_height),
            MediaKind::Video => (self.layout.video_width, self.layout.video_height),
        };
        let bounds = self.place(placement, width, height);
        let group = random_id();

        let role = |leg| ElementRole::Placeholder {
            group: group.clone(),
            leg,
            media,
            job_id: job_id.clone(),
        };

        let mut frame = Element::new(ElementKind::Shape("rectangle".to_string()), bounds)
            .with_role(role(PlaceholderLeg::Frame))
            .with_extra("strokeStyle", Value::from("dashed"))
            .with_extra("backgroundColor", Value::from("transparent"));
        frame.group_ids = vec![group.clone()];

        let text_width = (bounds.width - 2.0 * LABEL_INSET).max(1.0);
        let (kind, text_height) = self.text_element(label, text_width);
        let mut text = Element::new(
            kind,
            Rect::new(
                bounds.x + LABEL_INSET,
                bounds.y + LABEL_INSET,
                text_width,
                text_height,
            ),
        )
        .with_role(role(PlaceholderLeg::Label));
        text.group_ids = vec![group.clone()];

        let frame_id = self.push(frame);
        let label_id = self.push(text);
        if placement == Placement::Anchored {
            self.mark_pinned(&frame_id);
        }
        tracing::debug!(group = %group, media = media.label(), "placeholder created");

        Placeholder {
            group,
            frame_id,
            label_id: Some(label_id),
            media,
            job_id,
            bounds,
        }
    }

    /// Binds an untagged placeholder to the job that will fill it.
    pub fn tag_placeholder(&mut self, group: &str, job_id: &JobId) -> bool {
        let mut changed = false;
        for el in self.doc.elements.iter_mut().filter(|e| e.is_live()) {
            if let Some(ElementRole::Placeholder {
                group: g,
                job_id: slot,
                ..
            }) = el.role.as_mut()
                && g == group
                && slot.as_ref() != Some(job_id)
            {
                *slot = Some(job_id.clone());
                el.bump();
                changed = true;
            }
        }
        changed
    }

    /// Rewrites the label, re-wrapped to the frame width. Returns false when
    /// the placeholder is gone or already shows `text`.
    pub fn update_placeholder_text(&mut self, group: &str, text: &str) -> bool {
        let Some(ph) = find_placeholder(self.doc, group) else {
            return false;
        };
        let Some(label_id) = ph.label_id else {
            return false;
        };
        let text_width = (ph.bounds.width - 2.0 * LABEL_INSET).max(1.0);
        let (kind, height) = self.text_element(text, text_width);
        let Some(label) = self.doc.element_mut(&label_id) else {
            return false;
        };
        if label.kind == kind {
            return false;
        }
        label.kind = kind;
        label.height = height;
        label.bump();
        true
    }

    /// Tombstones both legs of a placeholder.
    pub fn retire_placeholder(&mut self, group: &str) -> bool {
        let mut changed = false;
        for el in self.doc.elements.iter_mut() {
            if el.is_live() && el.placeholder_group() == Some(group) {
                el.tombstone();
                changed = true;
            }
        }
        if changed {
            tracing::debug!(group, "placeholder retired");
        }
        changed
    }
}
