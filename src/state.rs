use std::path::PathBuf;

use crate::data::loader::SceneLoader;
use crate::data::model::Scene;
use crate::error::Result;
use crate::resample::resample_scene;
use crate::worker::{spawn_scene_load, SceneLoadHandle, SceneReady};

// ---------------------------------------------------------------------------
// Scene session state
// ---------------------------------------------------------------------------

/// The current scene of a session plus the load in flight, independent of
/// any front-end.
pub struct SceneState {
    loader: SceneLoader,
    scenes_directory: PathBuf,

    /// Last successfully loaded scene (None until the first load completes).
    pub current: Option<SceneReady>,

    /// Load in progress, if any.
    pending: Option<SceneLoadHandle>,

    /// Status / error message for the front-end.
    pub status_message: Option<String>,

    /// Whether a load is in progress.
    pub loading: bool,
}

impl SceneState {
    pub fn new(loader: SceneLoader, scenes_directory: PathBuf) -> Self {
        Self {
            loader,
            scenes_directory,
            current: None,
            pending: None,
            status_message: None,
            loading: false,
        }
    }

    /// Start loading `name` in the background.  A load already in flight is
    /// abandoned; its result is dropped when it arrives.
    pub fn request_load(&mut self, name: &str) -> Result<()> {
        let handle = spawn_scene_load(self.loader.clone(), name, self.scenes_directory.clone())?;
        self.pending = Some(handle);
        self.loading = true;
        self.status_message = Some(format!("Loading {name}…"));
        Ok(())
    }

    /// Ingest the pending result if it has arrived.  Returns true when the
    /// state changed.  A failed load keeps the previous scene.
    pub fn poll(&mut self) -> bool {
        let Some(handle) = self.pending.as_mut() else {
            return false;
        };
        let Some(result) = handle.try_take() else {
            return false;
        };
        let name = handle.name().to_string();
        self.pending = None;
        self.apply(&name, result);
        true
    }

    /// Block until the pending load finishes and ingest it.
    pub fn wait(&mut self) -> bool {
        let Some(handle) = self.pending.take() else {
            return false;
        };
        let name = handle.name().to_string();
        let result = handle.wait();
        self.apply(&name, result);
        true
    }

    fn apply(&mut self, name: &str, result: Result<SceneReady>) {
        self.loading = false;
        match result {
            Ok(ready) => {
                self.status_message = None;
                self.current = Some(ready);
            }
            Err(e) => {
                log::warn!("Keeping previous scene after failed load of '{name}'");
                self.status_message = Some(format!("Error loading {name}: {e}"));
            }
        }
    }

    /// The current scene resampled onto `new_wavelengths`, for the
    /// acquisition simulator.
    pub fn interpolated(&self, new_wavelengths: &[f64]) -> Option<Result<Scene>> {
        self.current
            .as_ref()
            .map(|ready| resample_scene(&ready.loaded.scene, new_wavelengths))
    }
}
