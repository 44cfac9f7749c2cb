//! Prediction history
//!
//! The web layer keeps a log of served predictions and shows it newest
//! first, both as a short "recent" list and as numbered pages.

use crate::models::FeatureVector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

/// Default number of records per history page
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Default length of the recent-predictions list
pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// One served dual prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub timestamp: DateTime<Utc>,
    pub features: FeatureVector,
    pub linear_aqi: f64,
    pub tree_aqi: f64,
}

impl PredictionRecord {
    pub fn new(features: FeatureVector, linear_aqi: f64, tree_aqi: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            features,
            linear_aqi,
            tree_aqi,
        }
    }

    /// Absolute disagreement between the two models
    pub fn difference(&self) -> f64 {
        (self.linear_aqi - self.tree_aqi).abs()
    }
}

/// One page of history, newest record first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub items: Vec<PredictionRecord>,
    /// 1-based page number actually served
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// Storage for served predictions
pub trait PredictionHistory: Send + Sync {
    fn append(&self, record: PredictionRecord);

    /// Up to `limit` records, newest first
    fn recent(&self, limit: usize) -> Vec<PredictionRecord>;

    /// Page `number` (1-based) of `per_page` records, newest first.
    ///
    /// Numbers below 1 serve the first page and numbers past the end serve
    /// the last one.
    fn page(&self, number: usize, per_page: usize) -> Page;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local history, lost on restart.
///
/// Unbounded unless built with [`with_limit`](Self::with_limit), in which
/// case the oldest records are evicted once the limit is exceeded.
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    // Ordered by timestamp ascending; readers iterate in reverse.
    records: RwLock<Vec<PredictionRecord>>,
    limit: Option<usize>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// History retaining at most `limit` records (at least one)
    pub fn with_limit(limit: usize) -> Self {
        Self {
            records: RwLock::default(),
            limit: Some(limit.max(1)),
        }
    }
}

impl PredictionHistory for InMemoryHistory {
    fn append(&self, record: PredictionRecord) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        // Keep timestamp order even if a caller supplies an older record.
        let at = records.partition_point(|r| r.timestamp <= record.timestamp);
        records.insert(at, record);
        if let Some(limit) = self.limit {
            let excess = records.len().saturating_sub(limit);
            records.drain(..excess);
        }
    }

    fn recent(&self, limit: usize) -> Vec<PredictionRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.iter().rev().take(limit).cloned().collect()
    }

    fn page(&self, number: usize, per_page: usize) -> Page {
        let per_page = per_page.max(1);
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let total = records.len();
        let total_pages = total.div_ceil(per_page).max(1);
        let page = number.clamp(1, total_pages);

        let items = records
            .iter()
            .rev()
            .skip((page - 1) * per_page)
            .take(per_page)
            .cloned()
            .collect();

        Page {
            items,
            page,
            per_page,
            total,
            total_pages,
        }
    }

    fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(minutes: i64, linear: f64, tree: f64) -> PredictionRecord {
        let features =
            FeatureVector::new(50.0, 70.0, 40.0, 20.0, 1.2, 45.0, 25.0, 65.0).unwrap();
        PredictionRecord {
            timestamp: DateTime::from_timestamp(minutes * 60, 0).unwrap(),
            features,
            linear_aqi: linear,
            tree_aqi: tree,
        }
    }

    fn filled(n: i64) -> InMemoryHistory {
        let history = InMemoryHistory::new();
        for i in 0..n {
            history.append(record(i, i as f64, 0.0));
        }
        history
    }

    #[test]
    fn test_difference() {
        assert_eq!(record(0, 80.0, 95.5).difference(), 15.5);
        assert_eq!(record(0, 95.5, 80.0).difference(), 15.5);
    }

    #[test]
    fn test_recent_newest_first() {
        let history = filled(15);
        let recent = history.recent(DEFAULT_RECENT_LIMIT);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].linear_aqi, 14.0);
        assert_eq!(recent[9].linear_aqi, 5.0);
        assert_eq!(history.recent(100).len(), 15);
    }

    #[test]
    fn test_out_of_order_append() {
        let history = InMemoryHistory::new();
        history.append(record(10, 1.0, 0.0));
        history.append(record(5, 2.0, 0.0));
        history.append(record(20, 3.0, 0.0));
        let order: Vec<f64> = history.recent(3).iter().map(|r| r.linear_aqi).collect();
        assert_eq!(order, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_pagination() {
        let history = filled(45);
        let first = history.page(1, DEFAULT_PAGE_SIZE);
        assert_eq!(first.total, 45);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.items.len(), 20);
        assert_eq!(first.items[0].linear_aqi, 44.0);

        let last = history.page(3, DEFAULT_PAGE_SIZE);
        assert_eq!(last.items.len(), 5);
        assert_eq!(last.items[4].linear_aqi, 0.0);
    }

    #[test]
    fn test_out_of_range_page_clamps() {
        let history = filled(45);
        let past_end = history.page(99, DEFAULT_PAGE_SIZE);
        assert_eq!(past_end.page, 3);
        assert_eq!(past_end, history.page(3, DEFAULT_PAGE_SIZE));
        assert_eq!(history.page(0, DEFAULT_PAGE_SIZE).page, 1);
    }

    #[test]
    fn test_empty_history_has_one_empty_page() {
        let history = InMemoryHistory::new();
        assert!(history.is_empty());
        let page = history.page(4, DEFAULT_PAGE_SIZE);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 1);
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_limit_evicts_oldest() {
        let history = InMemoryHistory::with_limit(5);
        for i in 0..12 {
            history.append(record(i, i as f64, 0.0));
        }
        assert_eq!(history.len(), 5);
        let kept: Vec<f64> = history.recent(10).iter().map(|r| r.linear_aqi).collect();
        assert_eq!(kept, vec![11.0, 10.0, 9.0, 8.0, 7.0]);

        // Older than everything retained, so it is evicted immediately.
        history.append(record(0, 99.0, 0.0));
        assert_eq!(history.len(), 5);
        assert_eq!(history.page(1, DEFAULT_PAGE_SIZE).items[4].linear_aqi, 7.0);
    }
}
