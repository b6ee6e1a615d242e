//! Recorded upstream responses, used in place of paid live calls while
//! developing and testing.

use std::{
    fs, io,
    path::PathBuf,
};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{error::ClientError, model::LocationInput};

use super::{WeatherSource, visual_crossing::timeline_uri};

/// Directory of `<city>-<state>.json` snapshots.
#[derive(Debug, Clone)]
pub struct FixtureStore {
    dir: PathBuf,
}

impl FixtureStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// File name for a location: `Plentywood, MT` becomes `plentywood-mt.json`.
    ///
    /// City is the first comma-separated part, state the last; a single part
    /// serves as both. Anything outside `[a-z0-9-]` becomes `_`, so the name
    /// always stays inside the fixture directory.
    pub fn file_name(location: &LocationInput) -> String {
        let raw = location.as_str();
        let city = raw.split(',').next().unwrap_or_default();
        let state = raw.rsplit(',').next().unwrap_or_default();
        format!("{}-{}.json", sanitize(city), sanitize(state))
    }

    pub fn path_for(&self, location: &LocationInput) -> PathBuf {
        self.dir.join(Self::file_name(location))
    }

    pub fn read(&self, location: &LocationInput) -> Result<Option<Vec<u8>>, ClientError> {
        let path = self.path_for(location);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ClientError::Fixture { path, source }),
        }
    }

    /// Write a snapshot unless one already exists. Returns whether a file was written.
    pub fn write_if_absent(&self, location: &LocationInput, body: &[u8]) -> Result<bool, ClientError> {
        let path = self.path_for(location);
        if path.exists() {
            return Ok(false);
        }

        fs::create_dir_all(&self.dir).map_err(|source| ClientError::Fixture {
            path: self.dir.clone(),
            source,
        })?;
        fs::write(&path, body).map_err(|source| ClientError::Fixture {
            path: path.clone(),
            source,
        })?;

        tracing::info!(path = %path.display(), "wrote test fixture");
        Ok(true)
    }
}

fn sanitize(part: &str) -> String {
    part.trim()
        .chars()
        .map(|c| match c.to_ascii_lowercase() {
            c @ ('a'..='z' | '0'..='9' | '-') => c,
            _ => '_',
        })
        .collect()
}

#[derive(Debug)]
enum Mode<S> {
    /// Serve fixtures only; a missing fixture is a fetch error.
    Replay { base_url: String },
    /// Serve fixtures when present, otherwise call `live` and keep its body.
    Record { live: S },
}

/// [`WeatherSource`] backed by a [`FixtureStore`].
#[derive(Debug)]
pub struct FixtureSource<S> {
    store: FixtureStore,
    mode: Mode<S>,
}

impl FixtureSource<super::visual_crossing::VisualCrossingClient> {
    pub fn replay(store: FixtureStore, base_url: String) -> Self {
        Self {
            store,
            mode: Mode::Replay { base_url },
        }
    }
}

impl<S: WeatherSource> FixtureSource<S> {
    pub fn recording(store: FixtureStore, live: S) -> Self {
        Self {
            store,
            mode: Mode::Record { live },
        }
    }
}

#[async_trait]
impl<S: WeatherSource> WeatherSource for FixtureSource<S> {
    fn uri(&self, location: &LocationInput, begin: NaiveDate, end: NaiveDate) -> String {
        match &self.mode {
            Mode::Replay { base_url } => timeline_uri(base_url, location, begin, end, None),
            Mode::Record { live } => live.uri(location, begin, end),
        }
    }

    async fn fetch(
        &self,
        location: &LocationInput,
        begin: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<u8>, ClientError> {
        if let Some(body) = self.store.read(location)? {
            tracing::debug!(%location, "serving weather from fixture");
            return Ok(body);
        }

        match &self.mode {
            Mode::Replay { .. } => Err(ClientError::MissingFixture(FixtureStore::file_name(location))),
            Mode::Record { live } => {
                let body = live.fetch(location, begin, end).await?;
                if let Err(err) = self.store.write_if_absent(location, &body) {
                    tracing::warn!(%location, error = %err, "could not record fixture");
                }
                Ok(body)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Debug, Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WeatherSource for CountingSource {
        fn uri(&self, location: &LocationInput, begin: NaiveDate, end: NaiveDate) -> String {
            timeline_uri("https://live.test", location, begin, end, Some("KEY"))
        }

        async fn fetch(&self, _: &LocationInput, _: NaiveDate, _: NaiveDate) -> Result<Vec<u8>, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(br#"{"resolvedAddress":"Live"}"#.to_vec())
        }
    }

    fn input(s: &str) -> LocationInput {
        LocationInput::parse(s).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 29).unwrap()
    }

    #[test]
    fn file_name_is_city_dash_state() {
        assert_eq!(FixtureStore::file_name(&input("Plentywood, MT")), "plentywood-mt.json");
        assert_eq!(FixtureStore::file_name(&input("New York City, NY")), "new_york_city-ny.json");
        assert_eq!(FixtureStore::file_name(&input("Paris")), "paris-paris.json");
        assert_eq!(FixtureStore::file_name(&input("Paris, Lamar, TX")), "paris-tx.json");
    }

    #[test]
    fn file_name_cannot_leave_fixture_dir() {
        let name = FixtureStore::file_name(&input("../secret, x"));
        assert_eq!(name, "___secret-x.json");

        let name = FixtureStore::file_name(&input("a/b\\c, ../../etc"));
        assert!(!name.contains('/') && !name.contains('\\') && !name.contains(".."));

        let dir = TempDir::new().unwrap();
        let store = FixtureStore::new(dir.path().join("fixtures"));
        let path = store.path_for(&input("../secret, x"));
        assert_eq!(path.parent(), Some(dir.path().join("fixtures").as_path()));
    }

    #[tokio::test]
    async fn replay_ignores_files_outside_fixture_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("secret-x.json"), r#"{"leaked":true}"#).unwrap();
        let source = FixtureSource::replay(FixtureStore::new(dir.path().join("fixtures")), "https://vc.test".into());

        let err = source.fetch(&input("../secret, x"), day(), day()).await.unwrap_err();
        assert!(matches!(err, ClientError::MissingFixture(ref name) if name == "___secret-x.json"));
    }

    #[test]
    fn write_if_absent_keeps_first_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = FixtureStore::new(dir.path().join("nested"));
        let loc = input("Tampa, FL");

        assert!(store.write_if_absent(&loc, b"first").unwrap());
        assert!(!store.write_if_absent(&loc, b"second").unwrap());
        assert_eq!(store.read(&loc).unwrap(), Some(b"first".to_vec()));
    }

    #[test]
    fn read_missing_fixture_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FixtureStore::new(dir.path().to_path_buf());
        assert_eq!(store.read(&input("Nowhere, ZZ")).unwrap(), None);
    }

    #[tokio::test]
    async fn replay_without_fixture_is_an_error() {
        let dir = TempDir::new().unwrap();
        let source = FixtureSource::replay(FixtureStore::new(dir.path().to_path_buf()), "https://vc.test".into());

        let err = source.fetch(&input("Nowhere, ZZ"), day(), day()).await.unwrap_err();
        assert!(matches!(err, ClientError::MissingFixture(ref name) if name == "nowhere-zz.json"));
    }

    #[tokio::test]
    async fn recording_calls_live_once_then_replays() {
        let dir = TempDir::new().unwrap();
        let store = FixtureStore::new(dir.path().to_path_buf());
        let source = FixtureSource::recording(store.clone(), CountingSource::default());
        let loc = input("Plentywood, MT");

        let first = source.fetch(&loc, day(), day()).await.unwrap();
        let second = source.fetch(&loc, day(), day()).await.unwrap();

        assert_eq!(first, second);
        let Mode::Record { live } = &source.mode else {
            panic!("expected recording mode");
        };
        assert_eq!(live.calls.load(Ordering::SeqCst), 1);
        assert!(store.path_for(&loc).exists());
        assert!(source.uri(&loc, day(), day()).ends_with("?key=KEY"));
    }
}
