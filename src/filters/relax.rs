//! Progressive relaxation of a zero-result filter set.
//!
//! Dimensions are removed from least to most important and the count is
//! re-probed after every removal. The first non-zero count wins.

use async_trait::async_trait;
use serde::Serialize;

use super::schema::SearchFilters;
use crate::platform::PlatformError;

/// One relaxation step, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelaxStep {
    /// Keyword, news, funding, technologies, job listing and lookalike domain.
    Extras,
    EmployeeCount,
    Revenue,
    JobTitles,
    Level,
    Industries,
    Department,
}

impl RelaxStep {
    pub const ORDER: [RelaxStep; 7] = [
        RelaxStep::Extras,
        RelaxStep::EmployeeCount,
        RelaxStep::Revenue,
        RelaxStep::JobTitles,
        RelaxStep::Level,
        RelaxStep::Industries,
        RelaxStep::Department,
    ];

    /// Remove this step's dimensions. Returns `false` when there was nothing
    /// to remove.
    pub fn apply(&self, filters: &mut SearchFilters) -> bool {
        match self {
            RelaxStep::Extras => {
                let had = filters.keyword_filter.is_some()
                    || filters.news.is_some()
                    || !filters.funding_type.is_empty()
                    || !filters.technologies.is_empty()
                    || filters.job_listing.is_some()
                    || filters.lookalike_domain.is_some();
                filters.keyword_filter = None;
                filters.news = None;
                filters.funding_type.clear();
                filters.technologies.clear();
                filters.job_listing = None;
                filters.lookalike_domain = None;
                had
            }
            RelaxStep::EmployeeCount => take_vec(&mut filters.employee_count),
            RelaxStep::Revenue => take_vec(&mut filters.revenue),
            RelaxStep::JobTitles => take_vec(&mut filters.job_titles),
            RelaxStep::Level => take_vec(&mut filters.level),
            RelaxStep::Industries => take_vec(&mut filters.industries),
            RelaxStep::Department => take_vec(&mut filters.department),
        }
    }
}

fn take_vec<T>(values: &mut Vec<T>) -> bool {
    let had = !values.is_empty();
    values.clear();
    had
}

/// The count probe used by [`broaden`].
#[async_trait]
pub trait LeadCounter: Send + Sync {
    async fn count(&self, filters: &SearchFilters) -> Result<u64, PlatformError>;
}

/// Result of a relaxation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Broadened {
    pub count: u64,
    pub filters: SearchFilters,
    /// Steps that actually removed something, in order.
    pub relaxed: Vec<RelaxStep>,
    /// `true` when every step ran and the count is still zero.
    pub exhausted: bool,
}

/// Relax `filters` until `counter` reports a non-zero count.
///
/// Assumes the caller already saw a zero count for `filters` as given.
/// Steps with nothing to remove are skipped without a probe. Probe errors
/// abort the run.
pub async fn broaden(filters: &SearchFilters, counter: &dyn LeadCounter) -> Result<Broadened, PlatformError> {
    let mut current = filters.clone();
    let mut relaxed = Vec::new();

    for step in RelaxStep::ORDER {
        if !step.apply(&mut current) {
            continue;
        }
        relaxed.push(step);
        let count = counter.count(&current).await?;
        tracing::info!(step = ?step, count, "relaxation probe");
        if count > 0 {
            return Ok(Broadened {
                count,
                filters: current,
                relaxed,
                exhausted: false,
            });
        }
    }

    tracing::info!(steps = relaxed.len(), "relaxation exhausted with zero results");
    Ok(Broadened {
        count: 0,
        filters: current,
        relaxed,
        exhausted: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::schema::{Department, EmployeeCount, Industry, Level, Locations, Revenue};
    use crate::testing::ScriptedCounter;

    fn full() -> SearchFilters {
        SearchFilters {
            job_titles: vec!["VP Sales".into()],
            level: vec![Level::VpLevel],
            department: vec![Department::Sales],
            industries: vec![Industry::SoftwareInternet],
            employee_count: vec![EmployeeCount::From25To100],
            revenue: vec![Revenue::From1MTo10M],
            keyword_filter: Some("crm".into()),
            technologies: vec!["HubSpot".into()],
            locations: Some(Locations::Names(vec!["France".into()])),
            ..SearchFilters::default()
        }
    }

    #[tokio::test]
    async fn test_extras_removed_first() {
        let counter = ScriptedCounter::new([12]);
        let out = broaden(&full(), &counter).await.unwrap();
        assert_eq!(out.count, 12);
        assert_eq!(out.relaxed, vec![RelaxStep::Extras]);
        assert!(out.filters.keyword_filter.is_none());
        assert!(out.filters.technologies.is_empty());
        assert_eq!(out.filters.employee_count, vec![EmployeeCount::From25To100]);
        assert!(!out.exhausted);
        assert_eq!(counter.calls(), 1);
    }

    #[tokio::test]
    async fn test_stops_at_first_non_zero_step() {
        let counter = ScriptedCounter::new([0, 7, 99]);
        let out = broaden(&full(), &counter).await.unwrap();
        assert_eq!(out.count, 7);
        assert_eq!(out.relaxed, vec![RelaxStep::Extras, RelaxStep::EmployeeCount]);
        assert_eq!(out.filters.revenue, vec![Revenue::From1MTo10M]);
        assert_eq!(counter.calls(), 2);
    }

    #[tokio::test]
    async fn test_probes_are_monotonic() {
        let counter = ScriptedCounter::new([0; 7]);
        let out = broaden(&full(), &counter).await.unwrap();

        let probes = counter.seen();
        assert_eq!(probes.len(), 7);
        for pair in probes.windows(2) {
            let before = pair[0].active_dimensions();
            let after = pair[1].active_dimensions();
            assert!(after.iter().all(|d| before.contains(d)));
            assert!(after.len() < before.len());
        }
        assert!(out.exhausted);
        assert_eq!(out.count, 0);
        assert_eq!(out.relaxed, RelaxStep::ORDER.to_vec());
        // Locations are never relaxed.
        assert_eq!(out.filters.active_dimensions(), vec!["locations"]);
    }

    #[tokio::test]
    async fn test_empty_steps_skipped_without_probe() {
        let filters = SearchFilters {
            industries: vec![Industry::Retail],
            department: vec![Department::Marketing],
            ..SearchFilters::default()
        };
        let counter = ScriptedCounter::new([0, 3]);
        let out = broaden(&filters, &counter).await.unwrap();
        assert_eq!(out.relaxed, vec![RelaxStep::Industries, RelaxStep::Department]);
        assert_eq!(out.count, 3);
        assert!(out.filters.is_trivial());
    }

    #[tokio::test]
    async fn test_nothing_to_relax_is_exhausted() {
        let counter = ScriptedCounter::new([]);
        let out = broaden(&SearchFilters::default(), &counter).await.unwrap();
        assert!(out.exhausted);
        assert!(out.relaxed.is_empty());
        assert_eq!(counter.calls(), 0);
    }

    #[tokio::test]
    async fn test_probe_error_propagates() {
        let counter = ScriptedCounter::failing();
        let result = broaden(&full(), &counter).await;
        assert!(result.is_err());
    }
}
