use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, MutexGuard, PoisonError,
};

use tracing::debug;

use crate::events::{
    CurrentPreviewSceneChanged, CurrentProgramSceneChanged, EventType, RawEvent,
    StudioModeStateChanged,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Observable session state, primed right after identification and kept
/// current by the reader task as scene and studio-mode events arrive.
#[derive(Debug, Default)]
pub(super) struct SessionState {
    studio_mode_enabled: AtomicBool,
    scenes: Mutex<SceneNames>,
}

#[derive(Debug, Default)]
struct SceneNames {
    program: Option<String>,
    preview: Option<String>,
}

impl SessionState {
    pub fn studio_mode_enabled(&self) -> bool {
        self.studio_mode_enabled.load(Ordering::Acquire)
    }

    /// Toggle studio mode. Leaving studio mode drops the preview scene, as
    /// the server no longer has one.
    pub fn set_studio_mode_enabled(&self, enabled: bool) {
        self.studio_mode_enabled.store(enabled, Ordering::Release);
        if !enabled {
            lock(&self.scenes).preview = None;
        }
    }

    pub fn program_scene(&self) -> Option<String> {
        lock(&self.scenes).program.clone()
    }

    pub fn set_program_scene(&self, name: String) {
        lock(&self.scenes).program = Some(name);
    }

    pub fn preview_scene(&self) -> Option<String> {
        lock(&self.scenes).preview.clone()
    }

    pub fn set_preview_scene(&self, name: String) {
        lock(&self.scenes).preview = Some(name);
    }

    /// The scene the user is working on: the preview while studio mode is
    /// enabled, the program scene otherwise.
    pub fn current_scene(&self) -> Option<String> {
        let scenes = lock(&self.scenes);
        scenes.preview.clone().or_else(|| scenes.program.clone())
    }

    /// Fold a raw event into the state. Events of other types and payloads
    /// that don't match their advertised shape are ignored.
    pub fn apply_event(&self, raw: &RawEvent) {
        let ty = raw.event_type.as_str();

        if ty == StudioModeStateChanged::NAME {
            if let Some(event) = decode::<StudioModeStateChanged>(raw) {
                self.set_studio_mode_enabled(event.studio_mode_enabled);
            }
        } else if ty == CurrentProgramSceneChanged::NAME {
            if let Some(event) = decode::<CurrentProgramSceneChanged>(raw) {
                self.set_program_scene(event.scene_name);
            }
        } else if ty == CurrentPreviewSceneChanged::NAME {
            if let Some(event) = decode::<CurrentPreviewSceneChanged>(raw) {
                self.set_preview_scene(event.scene_name);
            }
        }
    }
}

fn decode<E: EventType>(raw: &RawEvent) -> Option<E> {
    match serde_json::from_value(raw.event_data.clone()) {
        Ok(event) => Some(event),
        Err(error) => {
            debug!(ty = E::NAME, %error, "ignoring undecodable event for state tracking");
            None
        }
    }
}
