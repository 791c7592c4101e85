use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use super::{Element, PlanSource, parse_document};
use crate::error::{AppError, Result};

/// Serves documents held in memory. Dates without a document answer like an
/// upstream 404.
#[derive(Default)]
pub struct StaticPlanSource {
    documents: Mutex<HashMap<NaiveDate, String>>,
    fetches: AtomicUsize,
}

impl StaticPlanSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, date: NaiveDate, xml: impl Into<String>) {
        self.documents.lock().await.insert(date, xml.into());
    }

    pub async fn remove(&self, date: NaiveDate) {
        self.documents.lock().await.remove(&date);
    }

    /// Number of fetches attempted so far, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlanSource for StaticPlanSource {
    async fn fetch(&self, date: NaiveDate) -> Result<Element> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let documents = self.documents.lock().await;
        let xml = documents.get(&date).ok_or(AppError::UpstreamStatus(404))?;
        parse_document(xml)
    }
}
