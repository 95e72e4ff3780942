//! Working-directory files produced by a run.

use std::path::PathBuf;

use crate::error::PresentoError;

/// Tracks the files one run writes into its output directory.
///
/// Files registered as intermediates are removed by [`ArtifactStore::clean_intermediates`];
/// final artifacts stay on disk unless the run discards them.
#[derive(Debug)]
pub struct ArtifactStore {
    directory: PathBuf,
    run_id: String,
    intermediates: Vec<PathBuf>,
    finals: Vec<PathBuf>,
}

impl ArtifactStore {
    /// Create the store, making `directory` if it does not exist.
    pub async fn open(
        directory: impl Into<PathBuf>,
        run_id: impl Into<String>,
    ) -> Result<Self, PresentoError> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory).await?;
        Ok(Self {
            directory,
            run_id: run_id.into(),
            intermediates: Vec::new(),
            finals: Vec::new(),
        })
    }

    /// Run-scoped path for `stem` with `extension`, e.g. `slides-<run>.pdf`.
    pub fn path_for(&self, stem: &str, extension: &str) -> PathBuf {
        self.directory
            .join(format!("{}-{}.{}", stem, self.run_id, extension))
    }

    /// Write a final artifact and return its path.
    pub async fn write_final(
        &mut self,
        stem: &str,
        extension: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, PresentoError> {
        let path = self.path_for(stem, extension);
        self.finals.push(path.clone());
        tokio::fs::write(&path, bytes).await?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "Wrote artifact");
        Ok(path)
    }

    /// Write a temporary file that is removed on cleanup.
    pub async fn write_intermediate(
        &mut self,
        stem: &str,
        extension: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, PresentoError> {
        let path = self.path_for(stem, extension);
        self.intermediates.push(path.clone());
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    pub fn intermediates(&self) -> &[PathBuf] {
        &self.intermediates
    }

    /// Remove every intermediate file. Failures are logged, not returned.
    pub async fn clean_intermediates(&mut self) -> usize {
        remove_all(std::mem::take(&mut self.intermediates)).await
    }

    /// Remove the final artifacts written so far, for a run that failed
    /// after producing some of them.
    pub async fn discard_finals(&mut self) -> usize {
        remove_all(std::mem::take(&mut self.finals)).await
    }
}

async fn remove_all(paths: Vec<PathBuf>) -> usize {
    let mut failures = 0;
    for path in paths {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                failures += 1;
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove run file");
            }
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_names_are_run_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let a = ArtifactStore::open(dir.path(), "run-a").await.unwrap();
        let b = ArtifactStore::open(dir.path(), "run-b").await.unwrap();
        assert_ne!(a.path_for("slides", "pdf"), b.path_for("slides", "pdf"));
        assert!(
            a.path_for("slides", "pdf")
                .ends_with("slides-run-a.pdf")
        );
    }

    #[tokio::test]
    async fn test_intermediates_removed_finals_kept() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ArtifactStore::open(dir.path().join("out"), "r1").await.unwrap();

        let tmp = store.write_intermediate("segment-1", "wav", b"x").await.unwrap();
        let keep = store.write_final("podcast", "wav", b"y").await.unwrap();
        assert!(tmp.exists());

        assert_eq!(store.clean_intermediates().await, 0);
        assert!(!tmp.exists());
        assert!(keep.exists());
        assert!(store.intermediates().is_empty());
    }

    #[tokio::test]
    async fn test_discard_finals_removes_written_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ArtifactStore::open(dir.path(), "r3").await.unwrap();
        let pdf = store.write_final("slides", "pdf", b"%PDF").await.unwrap();
        assert!(pdf.exists());

        assert_eq!(store.discard_finals().await, 0);
        assert!(!pdf.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_intermediate_is_not_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ArtifactStore::open(dir.path(), "r2").await.unwrap();
        let tmp = store.write_intermediate("segment-1", "wav", b"x").await.unwrap();
        std::fs::remove_file(&tmp).unwrap();
        assert_eq!(store.clean_intermediates().await, 0);
    }
}
