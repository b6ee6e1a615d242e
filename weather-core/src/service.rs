use std::{cmp::Reverse, sync::Arc, time::Duration};

use chrono::Utc;

use crate::{
    Config,
    cache::{FreshnessCache, Seed},
    error::{ServiceError, StoreError, ValidationError},
    model::{LocationInput, LocationRecord, RecordId},
    presenter::{Presenter, ViewModel, ViewTables},
    provider::{WeatherSource, source_from_config},
    refresh::Refresher,
    store::{JsonFileStore, LocationStore},
};

#[derive(Debug, Clone)]
pub struct Created {
    pub record: LocationRecord,
    pub view: ViewModel,
    /// Non-empty when the lookup failed; the record is kept regardless.
    pub errors: Vec<ValidationError>,
}

impl Created {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Shown {
    pub record: LocationRecord,
    pub view: ViewModel,
    pub from_cache: bool,
}

#[derive(Debug, Clone)]
pub struct IndexRow {
    pub record: LocationRecord,
    pub summary: Vec<String>,
}

/// Store, source, cache and presenter wired together.
#[derive(Debug)]
pub struct WeatherService {
    store: Arc<dyn LocationStore>,
    refresher: Refresher,
    cache: FreshnessCache,
    tables: ViewTables,
}

impl WeatherService {
    pub fn new(source: Arc<dyn WeatherSource>, store: Arc<dyn LocationStore>, ttl: Duration) -> Self {
        Self {
            refresher: Refresher::new(source, store.clone()),
            store,
            cache: FreshnessCache::new(ttl),
            tables: ViewTables::default(),
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let source = source_from_config(config)?;
        let store = JsonFileStore::open(config.store_file_path()?)?;
        Ok(Self::new(source, Arc::new(store), config.cache_ttl()))
    }

    pub fn with_tables(mut self, tables: ViewTables) -> Self {
        self.tables = tables;
        self
    }

    pub fn cache(&self) -> &FreshnessCache {
        &self.cache
    }

    /// Create a record and fetch its weather right away. The fetch result
    /// also seeds the cache.
    pub async fn create(&self, input: &str) -> Result<Created, ServiceError> {
        let input = LocationInput::parse(input)?;
        let mut record = self.store.create(input)?;
        tracing::info!(record_id = %record.id, location = %record.input, "created location");

        let key = record.cache_key();
        let mut errors = Vec::new();
        let (refresher, rec, errs) = (&self.refresher, &mut record, &mut errors);
        let lookup = self
            .cache
            .get_or_refresh(key, move || async move {
                let refreshed = refresher.refresh(rec).await?;
                *errs = refreshed.errors;
                Ok::<_, StoreError>(refreshed.payload)
            })
            .await?;

        let view = Presenter::with_tables(&lookup.payload, self.tables).view();
        Ok(Created {
            record,
            view,
            errors,
        })
    }

    /// Current weather for a record, refreshed only when it is older than the
    /// cache TTL. A body stored by an earlier process still counts as cached
    /// while it is young enough.
    pub async fn show(&self, id: RecordId) -> Result<Shown, ServiceError> {
        let mut record = self.store.load(id)?;

        let key = record.cache_key();
        let seed = self.stored_seed(&record);
        let (refresher, rec) = (&self.refresher, &mut record);
        let lookup = self
            .cache
            .get_seeded_or_refresh(key, seed, move || async move {
                refresher.refresh(rec).await.map(|r| r.payload)
            })
            .await?;

        // Another caller may have refreshed while we waited on the slot.
        if !lookup.was_refreshed() {
            record = self.store.load(id)?;
        }

        let view = Presenter::with_tables(&lookup.payload, self.tables).view();
        Ok(Shown {
            record,
            view,
            from_cache: !lookup.was_refreshed(),
        })
    }

    /// Summary of every record from its stored body, newest first. Never fetches.
    pub fn index(&self) -> Result<Vec<IndexRow>, ServiceError> {
        let mut records = self.store.list()?;
        records.sort_by_key(|r| Reverse(r.generated_at));

        Ok(records
            .into_iter()
            .map(|record| {
                let summary = Presenter::with_tables(&record.payload(), self.tables).index_summary();
                IndexRow { record, summary }
            })
            .collect())
    }

    fn stored_seed(&self, record: &LocationRecord) -> Option<Seed> {
        let age = Utc::now()
            .signed_duration_since(record.generated_at?)
            .to_std()
            .ok()?;
        let remaining = self.cache.ttl().checked_sub(age)?;
        Some(Seed {
            payload: record.payload(),
            remaining,
        })
    }

    pub fn delete(&self, id: RecordId) -> Result<(), ServiceError> {
        self.store.delete(id)?;
        tracing::info!(record_id = %id, "deleted location");
        Ok(())
    }
}
