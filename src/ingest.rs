use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, Instrument};

use crate::spotify::{DataError, SpotifyClient, TimeRange, DEFAULT_LIMIT};
use crate::storage::BlobStore;

/// One post-login fetch-and-persist run.
pub struct IngestionJob {
    pub principal_id: String,
    pub access_token: String,
}

/// Fetches the listening stats a user just authorized and hands them to the
/// blob store. Failures end the job and are only logged.
#[derive(Clone)]
pub struct Ingestor {
    spotify: SpotifyClient,
    store: Arc<dyn BlobStore>,
}

impl Ingestor {
    pub fn new(spotify: SpotifyClient, store: Arc<dyn BlobStore>) -> Self {
        Self { spotify, store }
    }

    /// Detaches the job from the caller. Dropping the returned handle does not
    /// cancel it.
    pub fn schedule(&self, job: IngestionJob) -> JoinHandle<()> {
        let ingestor = self.clone();
        let span = tracing::info_span!("ingest", principal_id = %job.principal_id);
        tokio::spawn(async move { ingestor.run(job).await }.instrument(span))
    }

    pub async fn run(&self, job: IngestionJob) {
        let (artists, tracks) = tokio::join!(
            self.spotify
                .top_artists(&job.access_token, TimeRange::MediumTerm, DEFAULT_LIMIT),
            self.spotify
                .top_tracks(&job.access_token, TimeRange::MediumTerm, DEFAULT_LIMIT),
        );

        let mut stored = 0;
        for (kind, result) in [("artists", artists), ("tracks", tracks)] {
            if self.persist(&job.principal_id, kind, result).await {
                stored += 1;
            }
        }
        info!(stored, "ingestion finished");
    }

    async fn persist(&self, principal_id: &str, kind: &str, fetched: Result<Value, DataError>) -> bool {
        let payload = match fetched {
            Ok(payload) => payload,
            Err(e) => {
                error!(kind, error = %e, "failed to fetch top {}", kind);
                return false;
            }
        };

        let blob_name = format!("{}/{}.json", principal_id, kind);
        match self.store.upload(&blob_name, &payload).await {
            Ok(url) => {
                info!(blob = %blob_name, url = %url, "stored listening data");
                true
            }
            Err(e) => {
                error!(blob = %blob_name, error = %e, "failed to store listening data");
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::StorageError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Remembers every upload; optionally refuses them.
    #[derive(Default)]
    pub(crate) struct RecordingStore {
        pub(crate) uploads: Mutex<Vec<(String, Value)>>,
        pub(crate) fail: bool,
    }

    impl RecordingStore {
        pub(crate) fn names(&self) -> Vec<String> {
            let mut names: Vec<String> = self
                .uploads
                .lock()
                .unwrap()
                .iter()
                .map(|(name, _)| name.clone())
                .collect();
            names.sort();
            names
        }
    }

    #[async_trait]
    impl BlobStore for RecordingStore {
        async fn upload(&self, blob_name: &str, payload: &Value) -> Result<String, StorageError> {
            if self.fail {
                return Err(StorageError::InvalidName(blob_name.to_string()));
            }
            self.uploads
                .lock()
                .unwrap()
                .push((blob_name.to_string(), payload.clone()));
            Ok(format!("mem://{}", blob_name))
        }
    }

    async fn mount_data(server: &MockServer, artists: u16, tracks: u16) {
        Mock::given(method("GET"))
            .and(path("/v1/me/top/artists"))
            .respond_with(ResponseTemplate::new(artists).set_body_json(json!({"items": ["artist"]})))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/me/top/tracks"))
            .respond_with(ResponseTemplate::new(tracks).set_body_json(json!({"items": ["track"]})))
            .mount(server)
            .await;
    }

    fn job() -> IngestionJob {
        IngestionJob {
            principal_id: "user42".into(),
            access_token: "tok1".into(),
        }
    }

    #[tokio::test]
    async fn persists_artists_and_tracks() {
        let server = MockServer::start().await;
        mount_data(&server, 200, 200).await;
        let store = Arc::new(RecordingStore::default());
        let ingestor = Ingestor::new(
            SpotifyClient::new(server.uri(), reqwest::Client::new()),
            store.clone(),
        );

        ingestor.schedule(job()).await.unwrap();

        assert_eq!(store.names(), vec!["user42/artists.json", "user42/tracks.json"]);
        let uploads = store.uploads.lock().unwrap();
        let artists = uploads.iter().find(|(n, _)| n.ends_with("artists.json")).unwrap();
        assert_eq!(artists.1, json!({"items": ["artist"]}));
    }

    #[tokio::test]
    async fn failed_fetch_skips_only_that_blob() {
        let server = MockServer::start().await;
        mount_data(&server, 500, 200).await;
        let store = Arc::new(RecordingStore::default());
        let ingestor = Ingestor::new(
            SpotifyClient::new(server.uri(), reqwest::Client::new()),
            store.clone(),
        );

        ingestor.run(job()).await;

        assert_eq!(store.names(), vec!["user42/tracks.json"]);
    }

    #[tokio::test]
    async fn all_fetches_failing_never_touches_storage() {
        let server = MockServer::start().await;
        mount_data(&server, 401, 401).await;
        let store = Arc::new(RecordingStore::default());
        let ingestor = Ingestor::new(
            SpotifyClient::new(server.uri(), reqwest::Client::new()),
            store.clone(),
        );

        ingestor.schedule(job()).await.unwrap();

        assert!(store.names().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_is_swallowed() {
        let server = MockServer::start().await;
        mount_data(&server, 200, 200).await;
        let store = Arc::new(RecordingStore {
            fail: true,
            ..Default::default()
        });
        let ingestor = Ingestor::new(
            SpotifyClient::new(server.uri(), reqwest::Client::new()),
            store.clone(),
        );

        // Completes without panicking or returning an error.
        ingestor.schedule(job()).await.unwrap();
        assert!(store.names().is_empty());
    }
}
