use super::*;
use crate::pins::Pinboard;

impl Workspace {
    /// Runs `f` against a copy of the scene's document and pin book, then
    /// records the result like an editor mutation. A change the engine made
    /// itself is saved on the short debounce.
    pub(super) fn edit_scene<T>(&self, key: &SceneKey, f: impl FnOnce(&mut Pinboard<'_>) -> T) -> Result<T> {
        let layout = self.inner.config.layout.clone();
        let (out, changed, dirty, pins_changed) = self.with_loaded_slot(key, |slot| {
            let mut data = slot.scene.data.clone();
            let before = slot.pins.clone();
            let out = {
                let mut board = Pinboard::new(&mut data, &mut slot.pins, &layout);
                f(&mut board)
            };
            let pins_changed = slot.pins != before;
            let (changed, dirty) = slot.accept(data);
            (out, changed, dirty, pins_changed)
        })?;

        if pins_changed {
            self.persist_pins(key);
        }
        if changed {
            self.persist_scene(key);
            self.emit(SyncEvent::SceneChanged {
                scene: self.with_state(|st| st.resolve(key)),
            });
            self.emit_save_state(key);
        }
        if dirty {
            self.schedule_flush(key, true);
        }
        Ok(out)
    }
}
