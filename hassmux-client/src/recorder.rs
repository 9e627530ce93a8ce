//! Recorder statistics queries.
//!
//! Builds the `recorder/statistics_during_period` request, which returns
//! long-term statistics (hourly means, meter states, ...) for a set of
//! statistic ids.

use crate::error::ClientError;
use chrono::{DateTime, SecondsFormat, Utc};
use hassmux_core::Envelope;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request kind for statistics queries.
pub const STATISTICS_DURING_PERIOD: &str = "recorder/statistics_during_period";

/// Aggregation period of a statistics query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatisticsPeriod {
    /// Five-minute short-term statistics.
    #[serde(rename = "5minute")]
    FiveMinute,
    /// Hourly statistics.
    #[default]
    Hour,
    /// Daily statistics.
    Day,
    /// Weekly statistics.
    Week,
    /// Monthly statistics.
    Month,
}

/// Statistic column to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatisticType {
    /// Mean value over the period.
    Mean,
    /// Minimum value over the period.
    Min,
    /// Maximum value over the period.
    Max,
    /// Running sum.
    Sum,
    /// Last state in the period.
    State,
    /// Change over the period.
    Change,
}

/// A `recorder/statistics_during_period` query.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsQuery {
    /// Statistic ids, usually entity ids such as `sensor.outside_temperature`.
    pub statistic_ids: Vec<String>,
    /// Start of the queried range.
    pub start_time: DateTime<Utc>,
    /// End of the queried range; open-ended when absent.
    pub end_time: Option<DateTime<Utc>>,
    /// Aggregation period.
    pub period: StatisticsPeriod,
    /// Columns to return.
    pub types: Vec<StatisticType>,
}

impl StatisticsQuery {
    /// Creates an hourly query for mean and state from `start_time` on.
    pub fn new<I, S>(statistic_ids: I, start_time: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            statistic_ids: statistic_ids.into_iter().map(Into::into).collect(),
            start_time,
            end_time: None,
            period: StatisticsPeriod::default(),
            types: vec![StatisticType::Mean, StatisticType::State],
        }
    }

    /// Sets the end of the range.
    #[must_use]
    pub fn end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }

    /// Sets the aggregation period.
    #[must_use]
    pub fn period(mut self, period: StatisticsPeriod) -> Self {
        self.period = period;
        self
    }

    /// Sets the returned columns.
    #[must_use]
    pub fn types(mut self, types: impl IntoIterator<Item = StatisticType>) -> Self {
        self.types = types.into_iter().collect();
        self
    }

    /// Builds the request envelope.
    ///
    /// # Errors
    /// Returns `ClientError::Config` if the query has no statistic ids or an
    /// end time before its start time.
    pub fn to_envelope(&self) -> Result<Envelope, ClientError> {
        if self.statistic_ids.is_empty() {
            return Err(ClientError::config("statistics query needs at least one id"));
        }
        if self.end_time.is_some_and(|end| end < self.start_time) {
            return Err(ClientError::config("statistics query ends before it starts"));
        }

        let mut envelope = Envelope::new(STATISTICS_DURING_PERIOD)
            .with_field("start_time", rfc3339(self.start_time));
        if let Some(end_time) = self.end_time {
            envelope = envelope.with_field("end_time", rfc3339(end_time));
        }
        Ok(envelope
            .with_field("statistic_ids", self.statistic_ids.clone())
            .with_field("period", to_value(&self.period)?)
            .with_field("types", to_value(&self.types)?))
    }
}

fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, ClientError> {
    serde_json::to_value(value).map_err(|e| ClientError::Codec {
        message: e.to_string(),
    })
}
