use std::{sync::Arc, time::Instant};

use chrono::{NaiveDate, Utc};

use crate::{
    error::{StoreError, ValidationError},
    model::{LocationRecord, UNRESOLVED, WeatherPayload},
    provider::WeatherSource,
    store::LocationStore,
};

/// Outcome of one refresh: the payload plus any validation problems the
/// store reported for the saved body.
#[derive(Debug, Clone, PartialEq)]
pub struct Refreshed {
    pub payload: WeatherPayload,
    pub errors: Vec<ValidationError>,
}

/// Calls the weather source for a record and writes the result back.
///
/// Transport and parse failures never escape: they become a `bad_request`
/// payload that is persisted like any other. Only a failing store is an error.
#[derive(Debug, Clone)]
pub struct Refresher {
    source: Arc<dyn WeatherSource>,
    store: Arc<dyn LocationStore>,
}

impl Refresher {
    pub fn new(source: Arc<dyn WeatherSource>, store: Arc<dyn LocationStore>) -> Self {
        Self { source, store }
    }

    /// Refresh with today's single-day window.
    pub async fn refresh(&self, record: &mut LocationRecord) -> Result<Refreshed, StoreError> {
        self.refresh_on(record, Utc::now().date_naive()).await
    }

    pub async fn refresh_on(
        &self,
        record: &mut LocationRecord,
        day: NaiveDate,
    ) -> Result<Refreshed, StoreError> {
        let started = Instant::now();
        let uri = self.source.uri(&record.input, day, day);

        let payload = self.call_service(record, day).await;

        if let Some(resolved) = payload.resolved_address() {
            record.resolved_as = resolved.to_string();
        } else if !payload.is_bad_request() {
            record.resolved_as = UNRESOLVED.to_string();
        }
        record.raw_body = Some(payload.to_json());
        record.generated_at = Some(Utc::now());
        record.request_uri = Some(uri);

        let errors = self.store.save(record)?;

        tracing::info!(
            record_id = %record.id,
            location = %record.input,
            valid = !payload.is_bad_request(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "refreshed weather data"
        );

        Ok(Refreshed { payload, errors })
    }

    async fn call_service(&self, record: &LocationRecord, day: NaiveDate) -> WeatherPayload {
        let body = match self.source.fetch(&record.input, day, day).await {
            Ok(body) => body,
            Err(err) => {
                tracing::error!(record_id = %record.id, location = %record.input, error = %err, "weather request failed");
                return WeatherPayload::bad_request(err.to_string());
            }
        };

        match WeatherPayload::from_slice(&body) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(record_id = %record.id, location = %record.input, error = %err, "could not parse weather response");
                WeatherPayload::bad_request(String::from_utf8_lossy(&body))
            }
        }
    }
}
