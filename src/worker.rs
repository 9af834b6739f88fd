use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use ndarray::{Array2, Array3};

use crate::color::Palette;
use crate::data::loader::SceneLoader;
use crate::data::model::LoadedScene;
use crate::error::{Result, SceneError};
use crate::stats::{self, ClassStatistics};

// ---------------------------------------------------------------------------
// Result message
// ---------------------------------------------------------------------------

/// Everything a viewer needs about a freshly loaded scene, delivered as one
/// message.
#[derive(Debug, Clone)]
pub struct SceneReady {
    pub loaded: LoadedScene,
    pub statistics: ClassStatistics,
}

impl SceneReady {
    /// Cube and its wavelength axis (spectral viewer).
    pub fn spectra(&self) -> (&Array3<f32>, &[f64]) {
        (self.loaded.scene.cube(), self.loaded.scene.wavelengths())
    }

    /// Class statistics with the colours and names to draw them.
    pub fn class_spectra(&self) -> (&ClassStatistics, &Palette, &[String]) {
        (&self.statistics, &self.loaded.palette, &self.loaded.label_values)
    }

    /// Label map for the ground-truth view.
    pub fn ground_truth(&self) -> (&Array2<u32>, &[String], &Palette) {
        (self.loaded.scene.labels(), &self.loaded.label_values, &self.loaded.palette)
    }

    /// Label map with the labels a histogram should leave out.
    pub fn label_counts(&self) -> (&Array2<u32>, &[String], &[u32], &Palette) {
        (
            self.loaded.scene.labels(),
            &self.loaded.label_values,
            &self.loaded.ignored_labels,
            &self.loaded.palette,
        )
    }
}

// ---------------------------------------------------------------------------
// Background load
// ---------------------------------------------------------------------------

/// Handle to one background load.  Exactly one result is ever delivered.
#[derive(Debug)]
pub struct SceneLoadHandle {
    name: String,
    rx: Receiver<Result<SceneReady>>,
    thread: Option<JoinHandle<()>>,
    delivered: bool,
}

/// Load `name` and compute its class statistics on a dedicated thread.
pub fn spawn_scene_load(loader: SceneLoader, name: &str, root: PathBuf) -> Result<SceneLoadHandle> {
    let (tx, rx) = channel();
    let worker_name = name.to_string();
    let thread = thread::Builder::new()
        .name(format!("scene-load-{name}"))
        .spawn(move || {
            let result = load_worker(&loader, &worker_name, &root);
            if let Err(e) = &result {
                log::error!("Loading scene '{worker_name}' failed: {e}");
            }
            if tx.send(result).is_err() {
                log::debug!("Result for scene '{worker_name}' dropped: handle gone");
            }
        })
        .map_err(|e| {
            log::error!("Could not start loader thread: {e}");
            SceneError::Worker(name.to_string())
        })?;

    Ok(SceneLoadHandle {
        name: name.to_string(),
        rx,
        thread: Some(thread),
        delivered: false,
    })
}

fn load_worker(loader: &SceneLoader, name: &str, root: &std::path::Path) -> Result<SceneReady> {
    let loaded = loader.get_scene(name, root)?;
    let statistics = stats::compute(
        loaded.scene.cube(),
        loaded.scene.labels(),
        &loaded.label_values,
        &loaded.ignored_labels,
    )?;
    Ok(SceneReady { loaded, statistics })
}

impl SceneLoadHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block until the worker reports.
    pub fn wait(mut self) -> Result<SceneReady> {
        let result = self
            .rx
            .recv()
            .unwrap_or_else(|_| Err(SceneError::Worker(self.name.clone())));
        self.join();
        result
    }

    /// Non-blocking poll: `None` while the load is running and after the
    /// result has been taken.
    pub fn try_take(&mut self) -> Option<Result<SceneReady>> {
        if self.delivered {
            return None;
        }
        let result = match self.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(SceneError::Worker(self.name.clone())),
        };
        self.delivered = true;
        self.join();
        Some(result)
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Loader thread for scene '{}' panicked", self.name);
            }
        }
    }
}
