use super::placeholder::find_placeholder;
use super::*;
use crate::model::{ElementRole, FileDescriptor, JobId, MediaKind, random_id};

/// A finished media result ready to be placed on the document.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaPayload {
    pub media: MediaKind,
    pub job_id: Option<JobId>,
    pub ordinal: u32,
    pub asset_id: Option<String>,
    pub url: String,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub mime_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolveOutcome {
    Inserted(Vec<String>),
    /// Every result was already on the document; nothing was added.
    AlreadyPresent,
}

/// True when a result with the same job and ordinal, the same asset, or the
/// same url is already on the document. Tombstoned results count, so a
/// result the user deleted is not brought back.
pub fn has_result(doc: &SceneData, payload: &MediaPayload) -> bool {
    doc.elements.iter().any(|el| match el.role.as_ref() {
        Some(ElementRole::MediaResult {
            job_id,
            ordinal,
            asset_id,
            url,
            ..
        }) => {
            let same_job = payload.job_id.is_some()
                && job_id.as_ref() == payload.job_id.as_ref()
                && *ordinal == payload.ordinal;
            let same_asset = payload.asset_id.is_some() && asset_id == &payload.asset_id;
            same_job || same_asset || *url == payload.url
        }
        _ => false,
    })
}

impl Pinboard<'_> {
    /// Replaces a placeholder with its results. The first result takes the
    /// placeholder's slot (aspect kept, centre kept); later ones are laid out
    /// to its right. Results already on the document are skipped, and the
    /// placeholder is retired either way.
    pub fn resolve_placeholder(&mut self, group: &str, results: &[MediaPayload]) -> ResolveOutcome {
        let Some(ph) = find_placeholder(self.doc, group) else {
            return self.insert_results(Placement::Anchored, results);
        };

        let mut inserted = Vec::new();
        for (i, payload) in results.iter().enumerate() {
            if has_result(self.doc, payload) {
                continue;
            }
            let slot = Rect::new(
                ph.bounds.x + i as f64 * (ph.bounds.width + self.layout.gap),
                ph.bounds.y,
                ph.bounds.width,
                ph.bounds.height,
            );
            let rect = slot.fit(
                payload.width.unwrap_or(slot.width),
                payload.height.unwrap_or(slot.height),
            );
            inserted.push(self.push_result(payload, rect));
        }
        self.retire_placeholder(group);

        if self.book.last_pinned.as_deref() == Some(ph.frame_id.as_str())
            && let Some(first) = inserted.first()
        {
            self.mark_pinned(first);
        }

        if inserted.is_empty() {
            ResolveOutcome::AlreadyPresent
        } else {
            ResolveOutcome::Inserted(inserted)
        }
    }

    /// Places results that have no placeholder.
    pub fn insert_results(&mut self, placement: Placement, results: &[MediaPayload]) -> ResolveOutcome {
        let mut inserted = Vec::new();
        let mut cursor = placement;
        for payload in results {
            if has_result(self.doc, payload) {
                continue;
            }
            let (w, h) = self.default_size(payload.media);
            let slot = self.place(cursor, w, h);
            let rect = slot.fit(payload.width.unwrap_or(w), payload.height.unwrap_or(h));
            let id = self.push_result(payload, rect);
            match cursor {
                Placement::Anchored => self.mark_pinned(&id),
                Placement::Beside(_) => cursor = Placement::Beside(slot),
            }
            inserted.push(id);
        }
        if inserted.is_empty() {
            ResolveOutcome::AlreadyPresent
        } else {
            ResolveOutcome::Inserted(inserted)
        }
    }

    fn default_size(&self, media: MediaKind) -> (f64, f64) {
        match media {
            MediaKind::Image => (self.layout.placeholder_width, self.layout.placeholder_height),
            MediaKind::Video => (self.layout.video_width, self.layout.video_height),
        }
    }

    fn push_result(&mut self, payload: &MediaPayload, rect: Rect) -> String {
        let kind = match payload.media {
            MediaKind::Image => {
                let file = FileDescriptor {
                    id: random_id(),
                    mime_type: payload
                        .mime_type
                        .clone()
                        .filter(|m| !m.is_empty())
                        .unwrap_or_else(|| "image/png".to_string()),
                    data_url: payload.url.clone(),
                    created: time::OffsetDateTime::now_utc().unix_timestamp() * 1000,
                };
                self.doc.insert_file(&file);
                ElementKind::Image { file_id: file.id }
            }
            MediaKind::Video => ElementKind::Embeddable {
                link: payload.url.clone(),
            },
        };
        let el = Element::new(kind, rect).with_role(ElementRole::MediaResult {
            media: payload.media,
            job_id: payload.job_id.clone(),
            ordinal: payload.ordinal,
            asset_id: payload.asset_id.clone(),
            url: payload.url.clone(),
        });
        tracing::debug!(url = %payload.url, ordinal = payload.ordinal, "media result inserted");
        self.push(el)
    }
}
