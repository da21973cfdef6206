//! Filesystem-backed cassette store.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Cassette, Interaction, PlaybackTransport, RecordingTransport};
use crate::error::CassetteError;
use crate::mode::CassetteName;
use crate::transport::Transport;

const CASSETTE_EXTENSION: &str = "cassette";

/// What the store should hand back for a cassette.
pub enum CassetteMode {
    /// Forward through `upstream` and persist every exchange.
    Record(Arc<dyn Transport>),
    /// Serve stored exchanges only.
    Play,
}

/// Reads and writes cassettes under a single directory. Cheap to clone;
/// clones share the per-cassette write locks.
#[derive(Debug, Clone)]
pub struct CassetteStore {
    dir: PathBuf,
    writers: Arc<Mutex<HashMap<CassetteName, Arc<Mutex<()>>>>>,
}

impl CassetteStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            writers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn writer(&self, name: &CassetteName) -> Arc<Mutex<()>> {
        self.writers
            .lock()
            .await
            .entry(name.clone())
            .or_default()
            .clone()
    }

    pub fn path_for(&self, name: &CassetteName) -> PathBuf {
        self.dir.join(format!("{name}.{CASSETTE_EXTENSION}"))
    }

    /// Load a cassette. A cassette that was never written is empty.
    pub async fn load(&self, name: &CassetteName) -> Result<Cassette, CassetteError> {
        let path = self.path_for(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(Cassette {
                    name: name.to_string(),
                    interactions: Vec::new(),
                })
            }
            Err(source) => return Err(CassetteError::Io { path, source }),
        };

        serde_json::from_slice(&bytes).map_err(|source| CassetteError::Malformed { path, source })
    }

    /// Append one interaction to the cassette on disk and return the new
    /// interaction count.
    ///
    /// Writers of the same cassette are serialized and each re-reads the
    /// file, so every recorder sharing this store sees the others' appends.
    pub async fn append(&self, name: &CassetteName, interaction: Interaction) -> Result<usize, CassetteError> {
        let writer = self.writer(name).await;
        let _guard = writer.lock().await;

        let mut cassette = self.load(name).await?;
        cassette.interactions.push(interaction);
        self.save(name, &cassette).await?;
        Ok(cassette.interactions.len())
    }

    /// Write the whole cassette, replacing the previous file atomically.
    async fn save(&self, name: &CassetteName, cassette: &Cassette) -> Result<(), CassetteError> {
        let json = serde_json::to_vec_pretty(cassette).map_err(|source| CassetteError::Encode {
            name: name.to_string(),
            source,
        })?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| CassetteError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.path_for(name);
        let tmp = self
            .dir
            .join(format!("{name}.{CASSETTE_EXTENSION}.{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|source| CassetteError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| CassetteError::Io { path, source })
    }

    /// Open `name` and return a transport that records into it or plays it back.
    pub async fn transport(
        &self,
        name: CassetteName,
        mode: CassetteMode,
    ) -> Result<Arc<dyn Transport>, CassetteError> {
        let cassette = self.load(&name).await?;
        let transport: Arc<dyn Transport> = match mode {
            CassetteMode::Record(upstream) => {
                tracing::debug!(
                    cassette = %name,
                    existing = cassette.interactions.len(),
                    "Opened cassette for recording"
                );
                Arc::new(RecordingTransport::new(upstream, self.clone(), name))
            }
            CassetteMode::Play => {
                if cassette.interactions.is_empty() {
                    tracing::warn!(cassette = %name, "Playing a cassette with no recorded interactions");
                }
                Arc::new(PlaybackTransport::new(cassette))
            }
        };
        Ok(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::{Interaction, StoredRequest, StoredResponse};
    use std::collections::BTreeMap;

    fn name(s: &str) -> CassetteName {
        CassetteName::try_from(s).unwrap()
    }

    fn interaction(url: &str) -> Interaction {
        Interaction {
            request: StoredRequest {
                method: "GET".into(),
                url: url.into(),
                headers: BTreeMap::new(),
                body: Vec::new(),
            },
            response: StoredResponse {
                status: 200,
                headers: BTreeMap::new(),
                body: b"ok".to_vec(),
            },
            recorded_at: 0,
        }
    }

    #[tokio::test]
    async fn test_missing_cassette_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CassetteStore::new(dir.path());
        let cassette = store.load(&name("never")).await.unwrap();
        assert_eq!(cassette.name, "never");
        assert!(cassette.interactions.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CassetteStore::new(dir.path().join("nested"));
        let cassette = Cassette {
            name: "nice music".into(),
            interactions: vec![interaction("http://up.test/a")],
        };

        store.save(&name("nice music"), &cassette).await.unwrap();
        assert!(dir.path().join("nested/nice music.cassette").exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|file| file.to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");

        let loaded = store.load(&name("nice music")).await.unwrap();
        assert_eq!(loaded, cassette);
    }

    #[tokio::test]
    async fn test_malformed_cassette_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.cassette"), b"{not json").unwrap();
        let store = CassetteStore::new(dir.path());

        let err = store.load(&name("broken")).await.unwrap_err();
        assert!(matches!(err, CassetteError::Malformed { .. }));

        let err = store
            .transport(name("broken"), CassetteMode::Play)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CassetteError::Malformed { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_are_all_kept() {
        const WRITERS: usize = 16;

        let dir = tempfile::tempdir().unwrap();
        let store = CassetteStore::new(dir.path());

        let handles: Vec<_> = (0..WRITERS)
            .map(|i| {
                // Separate clones, as separate recorders would hold.
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .append(&name("shared"), interaction(&format!("http://up.test/{i}")))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let saved = store.load(&name("shared")).await.unwrap();
        let mut urls: Vec<_> = saved.interactions.iter().map(|i| i.request.url.clone()).collect();
        urls.sort();
        let mut expected: Vec<_> = (0..WRITERS).map(|i| format!("http://up.test/{i}")).collect();
        expected.sort();
        assert_eq!(urls, expected);
    }
}
