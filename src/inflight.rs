use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Paths with a conversion currently queued or running.
///
/// Keyed by output path: two sources sharing a stem (`a.jpg`, `a.png`) would
/// otherwise race for the same `a.webp`.
#[derive(Debug, Default)]
pub struct InFlight {
    paths: Mutex<HashSet<PathBuf>>,
    idle: Condvar,
}

impl InFlight {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reserve `path`; `None` if it is already reserved.
    pub fn try_claim(self: &Arc<Self>, path: &Path) -> Option<Claim> {
        let mut paths = self.paths.lock();
        if !paths.insert(path.to_path_buf()) {
            return None;
        }
        Some(Claim {
            registry: Arc::clone(self),
            path: path.to_path_buf(),
        })
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block until every claim has been released.
    pub fn wait_idle(&self) {
        let mut paths = self.paths.lock();
        while !paths.is_empty() {
            self.idle.wait(&mut paths);
        }
    }
}

/// Reservation released on drop.
#[derive(Debug)]
pub struct Claim {
    registry: Arc<InFlight>,
    path: PathBuf,
}

impl Claim {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        let mut paths = self.registry.paths.lock();
        paths.remove(&self.path);
        if paths.is_empty() {
            self.registry.idle.notify_all();
        }
    }
}
