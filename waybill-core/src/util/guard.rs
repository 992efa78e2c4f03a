use std::fs;
use std::path::PathBuf;

/// Deletes `path` on drop unless disarmed, so no exit path can leave a
/// partial artifact behind.
pub(crate) struct TempGuard {
    path: PathBuf,
    armed: bool,
}

impl TempGuard {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn removes_file_unless_disarmed() {
        let dir = tempfile::tempdir().unwrap();

        let doomed = dir.path().join("doomed");
        File::create(&doomed).unwrap();
        drop(TempGuard::new(doomed.clone()));
        assert!(!doomed.exists());

        let kept = dir.path().join("kept");
        File::create(&kept).unwrap();
        let mut g = TempGuard::new(kept.clone());
        g.disarm();
        drop(g);
        assert!(kept.exists());
    }
}
