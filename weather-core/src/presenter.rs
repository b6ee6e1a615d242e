//! Pure translation of a [`WeatherPayload`] into display fields.
//!
//! Every view is produced by walking a fixed rename table over the upstream
//! keys. Adding a field means adding a table row; nothing here branches on
//! individual fields. Missing keys render as [`NOT_AVAILABLE`].

use serde::{Serialize, Serializer, ser::SerializeMap};
use serde_json::{Map, Value};

use crate::model::WeatherPayload;

pub const NOT_AVAILABLE: &str = "n/a";

/// `(view name, upstream key)` pairs.
pub type FieldTable = &'static [(&'static str, &'static str)];

/// One row of the high/low view and the columns it is built from.
#[derive(Debug, Clone, Copy)]
pub struct RowSpec {
    pub name: &'static str,
    pub columns: FieldTable,
}

/// Rename tables driving the presenter.
#[derive(Debug, Clone, Copy)]
pub struct ViewTables {
    pub current_conditions: FieldTable,
    pub high_low: &'static [RowSpec],
    pub hourly: FieldTable,
    /// View names picked from `current_conditions` for list views.
    pub index_summary: &'static [&'static str],
    /// Upstream key holding a day's date.
    pub day_date: &'static str,
    /// Upstream key holding a day's hourly list.
    pub day_hours: &'static str,
}

pub const VISUAL_CROSSING: ViewTables = ViewTables {
    current_conditions: &[
        ("temperature", "temp"),
        ("feelsLike", "feelslike"),
        ("humidity", "humidity"),
        ("precipAmount", "precip"),
        ("precipProbability", "precipprob"),
        ("timeEpoch", "datetimeEpoch"),
    ],
    high_low: &[
        RowSpec {
            name: "temp",
            columns: &[("mean", "temp"), ("high", "tempmax"), ("low", "tempmin")],
        },
        RowSpec {
            name: "feelsLike",
            columns: &[
                ("mean", "feelslike"),
                ("high", "feelslikemax"),
                ("low", "feelslikemin"),
            ],
        },
    ],
    hourly: &[
        ("time", "datetime"),
        ("temperature", "temp"),
        ("conditionsText", "conditions"),
        ("precipProbability", "precipprob"),
    ],
    index_summary: &["temperature", "feelsLike", "precipProbability"],
    day_date: "datetime",
    day_hours: "hours",
};

impl Default for ViewTables {
    fn default() -> Self {
        VISUAL_CROSSING
    }
}

/// Ordered named values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<(&'static str, String)>);

impl Fields {
    fn from_table(table: FieldTable, source: Option<&Map<String, Value>>) -> Self {
        Self(
            table
                .iter()
                .map(|(name, key)| (*name, render(source.and_then(|s| s.get(*key)))))
                .collect(),
        )
    }

    fn not_available(table: FieldTable) -> Self {
        Self::from_table(table, None)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(n, v)| (*n, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Mean/high/low rows for one day, keyed by row name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighLow(Vec<(&'static str, Fields)>);

impl HighLow {
    fn from_day(rows: &[RowSpec], day: Option<&Map<String, Value>>) -> Self {
        match day {
            Some(day) => Self(
                rows.iter()
                    .map(|row| (row.name, Fields::from_table(row.columns, Some(day))))
                    .collect(),
            ),
            None => Self::default(),
        }
    }

    pub fn row(&self, name: &str) -> Option<&Fields> {
        self.0.iter().find(|(n, _)| *n == name).map(|(_, f)| f)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Fields)> {
        self.0.iter().map(|(n, f)| (*n, f))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for HighLow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, fields) in &self.0 {
            map.serialize_entry(name, fields)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayView {
    pub date: String,
    pub high_low: HighLow,
    pub hourly: Vec<Fields>,
}

/// Everything a detail view shows for one payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    pub valid: bool,
    pub error: Option<String>,
    pub resolved_address: Option<String>,
    pub current_conditions: Fields,
    pub high_low: HighLow,
    pub hourly: Vec<Fields>,
    pub days: Vec<DayView>,
    pub index_summary: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Presenter<'a> {
    payload: &'a WeatherPayload,
    tables: ViewTables,
}

impl<'a> Presenter<'a> {
    pub fn new(payload: &'a WeatherPayload) -> Self {
        Self::with_tables(payload, VISUAL_CROSSING)
    }

    pub fn with_tables(payload: &'a WeatherPayload, tables: ViewTables) -> Self {
        Self { payload, tables }
    }

    pub fn valid(&self) -> bool {
        !self.payload.is_bad_request()
    }

    pub fn current_conditions(&self) -> Fields {
        if !self.valid() {
            return Fields::not_available(self.tables.current_conditions);
        }
        Fields::from_table(self.tables.current_conditions, self.payload.current_conditions())
    }

    /// High/low rows of the first day; empty when there is no day data.
    pub fn high_low(&self) -> HighLow {
        HighLow::from_day(self.tables.high_low, self.payload.first_day())
    }

    /// Hourly rows of the first day; empty when there is no hourly data.
    pub fn hourly(&self) -> Vec<Fields> {
        self.payload
            .first_day()
            .map(|day| self.hours(day))
            .unwrap_or_default()
    }

    pub fn days(&self) -> Vec<DayView> {
        self.payload
            .days()
            .map(|day| DayView {
                date: render(day.get(self.tables.day_date)),
                high_low: HighLow::from_day(self.tables.high_low, Some(day)),
                hourly: self.hours(day),
            })
            .collect()
    }

    /// Condensed values for list views. Reads only the payload given.
    pub fn index_summary(&self) -> Vec<String> {
        let current = self.current_conditions();
        self.tables
            .index_summary
            .iter()
            .map(|name| current.get(name).unwrap_or(NOT_AVAILABLE).to_string())
            .collect()
    }

    pub fn view(&self) -> ViewModel {
        ViewModel {
            valid: self.valid(),
            error: self.payload.bad_request_detail().map(str::to_string),
            resolved_address: self.payload.resolved_address().map(str::to_string),
            current_conditions: self.current_conditions(),
            high_low: self.high_low(),
            hourly: self.hourly(),
            days: self.days(),
            index_summary: self.index_summary(),
        }
    }

    fn hours(&self, day: &Map<String, Value>) -> Vec<Fields> {
        day.get(self.tables.day_hours)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
            .map(|hour| Fields::from_table(self.tables.hourly, Some(hour)))
            .collect()
    }
}

/// Present `payload` with the Visual Crossing tables.
pub fn present(payload: &WeatherPayload) -> ViewModel {
    Presenter::new(payload).view()
}

fn render(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => NOT_AVAILABLE.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
