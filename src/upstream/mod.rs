pub mod document;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;

pub use document::{Element, parse_document};
pub use http::{HttpPlanSource, UpstreamConfig};
pub use memory::StaticPlanSource;

/// Where plan documents come from.
///
/// `fetch` returns the parsed root element for one reference date, or an
/// error when the document could not be retrieved or parsed. Implementations
/// must not cache; freshness is decided by the caller.
#[async_trait]
pub trait PlanSource: Send + Sync {
    async fn fetch(&self, date: NaiveDate) -> Result<Element>;
}
