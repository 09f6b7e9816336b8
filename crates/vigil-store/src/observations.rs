//! Bounded observation history per (organization, patient, metric).
//!
//! Trend and missing-data conditions need recent history; the log
//! keeps a bounded window per series, ordered oldest first even when
//! values arrive out of order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use vigil_core::{MetricId, Observation, ObservationPoint, OrgId, PatientId};

/// Default number of points retained per series.
pub const DEFAULT_SERIES_CAPACITY: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SeriesKey {
    org_id: OrgId,
    patient_id: PatientId,
    metric: MetricId,
}

/// In-memory observation history.
#[derive(Debug)]
pub struct ObservationLog {
    capacity: usize,
    inner: RwLock<HashMap<SeriesKey, Vec<ObservationPoint>>>,
}

impl Default for ObservationLog {
    fn default() -> Self {
        Self::new(DEFAULT_SERIES_CAPACITY)
    }
}

impl ObservationLog {
    /// Creates a log retaining at most `capacity` points per series.
    /// A zero capacity is treated as one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Records an observation, keeping the series ordered by recording
    /// time and trimming the oldest points past capacity.
    pub fn record(&self, observation: &Observation) {
        let key = SeriesKey {
            org_id: observation.org_id,
            patient_id: observation.patient_id,
            metric: observation.metric.clone(),
        };
        let point = ObservationPoint {
            recorded_at: observation.recorded_at,
            value: observation.value,
        };

        let mut inner = self.inner.write();
        let series = inner.entry(key).or_default();

        let position = series
            .iter()
            .rposition(|p| p.recorded_at <= point.recorded_at)
            .map_or(0, |i| i + 1);
        series.insert(position, point);

        if series.len() > self.capacity {
            let excess = series.len() - self.capacity;
            series.drain(..excess);
        }
    }

    /// Returns the series for a (patient, metric), oldest first.
    #[must_use]
    pub fn history(
        &self,
        org_id: OrgId,
        patient_id: PatientId,
        metric: &MetricId,
    ) -> Vec<ObservationPoint> {
        let key = SeriesKey {
            org_id,
            patient_id,
            metric: metric.clone(),
        };
        self.inner.read().get(&key).cloned().unwrap_or_default()
    }

    /// When the metric was last recorded for the patient, if ever.
    #[must_use]
    pub fn last_recorded_at(
        &self,
        org_id: OrgId,
        patient_id: PatientId,
        metric: &MetricId,
    ) -> Option<DateTime<Utc>> {
        let key = SeriesKey {
            org_id,
            patient_id,
            metric: metric.clone(),
        };
        self.inner
            .read()
            .get(&key)
            .and_then(|series| series.last())
            .map(|point| point.recorded_at)
    }

    /// Every (patient, metric) series known for an organization.
    ///
    /// Missing-data sweeps iterate these to find patients whose
    /// reporting has gone quiet.
    #[must_use]
    pub fn tracked_series(&self, org_id: OrgId) -> Vec<(PatientId, MetricId)> {
        let inner = self.inner.read();
        let mut series: Vec<(PatientId, MetricId)> = inner
            .keys()
            .filter(|key| key.org_id == org_id)
            .map(|key| (key.patient_id, key.metric.clone()))
            .collect();
        series.sort();
        series
    }

    /// Every organization with at least one recorded series.
    #[must_use]
    pub fn organizations(&self) -> Vec<OrgId> {
        let inner = self.inner.read();
        let mut orgs: Vec<OrgId> = inner.keys().map(|key| key.org_id).collect();
        orgs.sort();
        orgs.dedup();
        orgs
    }
}
