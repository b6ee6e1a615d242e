use crate::{
    Config,
    error::ClientError,
    model::LocationInput,
    provider::{
        fixture::{FixtureSource, FixtureStore},
        visual_crossing::VisualCrossingClient,
    },
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::{convert::TryFrom, fmt::Debug, sync::Arc};

pub mod fixture;
pub mod visual_crossing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Live,
    Fixture,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Live => "live",
            SourceKind::Fixture => "fixture",
        }
    }

    pub const fn all() -> &'static [SourceKind] {
        &[SourceKind::Live, SourceKind::Fixture]
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for SourceKind {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "live" => Ok(SourceKind::Live),
            "fixture" => Ok(SourceKind::Fixture),
            _ => Err(anyhow::anyhow!(
                "Unknown source '{value}'. Supported sources: live, fixture."
            )),
        }
    }
}

/// Where raw weather bodies come from. Implementations return whatever bytes
/// they get, valid JSON or not; deciding what the bytes mean is up to the caller.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    /// URI a fetch for these arguments would call, kept for diagnostics.
    fn uri(&self, location: &LocationInput, begin: NaiveDate, end: NaiveDate) -> String;

    async fn fetch(
        &self,
        location: &LocationInput,
        begin: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<u8>, ClientError>;
}

/// Construct the configured source.
pub fn source_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherSource>> {
    let fixtures = FixtureStore::new(config.fixture_dir.clone());

    let source: Arc<dyn WeatherSource> = match config.source_kind()? {
        SourceKind::Fixture => Arc::new(FixtureSource::replay(
            fixtures,
            config.base_url.clone(),
        )),
        SourceKind::Live => {
            let live = VisualCrossingClient::new(
                config.base_url.clone(),
                config.require_api_key()?,
                config.timeout(),
            )?;
            if config.record_fixtures {
                Arc::new(FixtureSource::recording(fixtures, live))
            } else {
                Arc::new(live)
            }
        }
    };

    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_as_str_roundtrip() {
        for kind in SourceKind::all() {
            let parsed = SourceKind::try_from(kind.as_str()).expect("roundtrip should succeed");
            assert_eq!(*kind, parsed);
        }
    }

    #[test]
    fn source_kind_is_case_insensitive() {
        assert_eq!(SourceKind::try_from("LIVE").unwrap(), SourceKind::Live);
    }

    #[test]
    fn fixture_source_needs_no_api_key() {
        let mut cfg = Config::default();
        cfg.set_source(SourceKind::Fixture);
        assert!(source_from_config(&cfg).is_ok());
    }

    #[test]
    fn fixture_source_builds_live_uri() {
        let mut cfg = Config::default();
        cfg.set_source(SourceKind::Fixture);
        let source = source_from_config(&cfg).unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 9, 29).unwrap();
        let input = LocationInput::parse("Tampa, FL").unwrap();
        let uri = source.uri(&input, day, day);
        assert!(uri.starts_with(crate::config::DEFAULT_BASE_URL));
        assert!(uri.contains("/Tampa%2C+FL/2024-09-29/2024-09-29"));
    }
}
