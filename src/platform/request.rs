//! Request body shaping.
//!
//! The internal filter schema and the platform's v2 wire format disagree on
//! several names and shapes:
//!
//! | internal                 | wire                       |
//! |--------------------------|----------------------------|
//! | `job_titles`             | `title.include`            |
//! | `industries`             | `industry.include`         |
//! | `employee_count`         | `employeeCount`            |
//! | `keyword_filter`         | `keyword_filter.include`   |
//! | `company_names`          | `company_name`             |
//! | `names.include`          | `name`                     |
//! | `lookalike_domain`       | `look_alike`               |
//! | `location_filter_type`   | `location_mode`            |
//! | `news`                   | `news` (list)              |
//!
//! Revenue buckets drop the first `M` (`$1M - 10M` → `$1 - 10M`), and plain
//! location names are resolved to place ids.

use serde_json::{json, Map, Value};

use super::types::{NewCampaign, SourceRequest};
use crate::filters::schema::{FilterEnum, LocationFilterType, Revenue, SearchFilters};
use crate::filters::resolve_locations;

fn revenue_to_api(revenue: Revenue) -> &'static str {
    match revenue {
        Revenue::From1MTo10M => "$1 - 10M",
        Revenue::From10MTo50M => "$10 - 50M",
        Revenue::From50MTo100M => "$50 - 100M",
        Revenue::From100MTo250M => "$100 - 250M",
        Revenue::From250MTo500M => "$250 - 500M",
        other => other.as_str(),
    }
}

fn enum_values<E: FilterEnum>(values: &[E]) -> Value {
    Value::Array(values.iter().map(|v| Value::from(v.as_str())).collect())
}

/// Map a validated filter set to the platform's `search_filters` object.
pub fn prepare_filters_for_api(filters: &SearchFilters) -> Map<String, Value> {
    let mut api = Map::new();

    // Person
    if !filters.job_titles.is_empty() {
        api.insert("title".into(), json!({ "include": filters.job_titles }));
    }
    if !filters.department.is_empty() {
        api.insert("department".into(), enum_values(&filters.department));
    }
    if !filters.level.is_empty() {
        api.insert("level".into(), enum_values(&filters.level));
    }
    if let Some(names) = filters.names.as_ref().filter(|n| !n.include.is_empty()) {
        api.insert("name".into(), json!(names.include));
    }

    // Company
    if !filters.industries.is_empty() {
        api.insert("industry".into(), json!({ "include": enum_values(&filters.industries) }));
    }
    if !filters.employee_count.is_empty() {
        api.insert("employeeCount".into(), enum_values(&filters.employee_count));
    }
    if !filters.revenue.is_empty() {
        let revenue: Vec<&str> = filters.revenue.iter().copied().map(revenue_to_api).collect();
        api.insert("revenue".into(), json!(revenue));
    }
    if !filters.funding_type.is_empty() {
        api.insert("funding_type".into(), json!(filters.funding_type));
    }
    if let Some(companies) = filters.company_names.as_ref().filter(|c| !c.is_empty()) {
        api.insert("company_name".into(), json!(companies));
    }
    if !filters.domains.is_empty() {
        api.insert("domains".into(), json!(filters.domains));
    }

    // Location
    if let Some(locations) = &filters.locations {
        let resolved = resolve_locations(locations);
        if !resolved.unresolved.is_empty() {
            tracing::warn!(
                unresolved = ?resolved.unresolved,
                "could not resolve locations, skipped"
            );
        }
        if let Some(places) = resolved.locations {
            api.insert("locations".into(), json!(places));
        }
    }
    if let Some(mode) = filters.location_filter_type {
        let mode = match mode {
            LocationFilterType::Contact => "contact",
            LocationFilterType::CompanyHq => "company",
        };
        api.insert("location_mode".into(), json!(mode));
    }

    // Advanced
    if let Some(keyword) = &filters.keyword_filter {
        api.insert("keyword_filter".into(), json!({ "include": keyword }));
    }
    if !filters.technologies.is_empty() {
        api.insert("technologies".into(), json!(filters.technologies));
    }
    if let Some(domain) = &filters.lookalike_domain {
        api.insert("look_alike".into(), json!(domain));
    }
    if let Some(news) = &filters.news {
        api.insert("news".into(), json!([news]));
    }
    if let Some(listing) = &filters.job_listing {
        api.insert("job_listing".into(), json!(listing));
    }

    // Dedup
    api.insert("skip_owned_leads".into(), json!(filters.skip_owned_leads));
    api.insert(
        "show_one_lead_per_company".into(),
        json!(filters.show_one_lead_per_company),
    );

    api
}

/// `{"search_filters": {...}}`.
pub fn search_body(filters: &SearchFilters) -> Value {
    json!({ "search_filters": prepare_filters_for_api(filters) })
}

/// Body of the enrich-from-search call. Enrichment options are top-level.
pub fn source_body(filters: &SearchFilters, request: &SourceRequest) -> Value {
    json!({
        "search_filters": prepare_filters_for_api(filters),
        "limit": request.limit,
        "search_name": request.search_name,
        "list_name": request.list_name,
        "work_email_enrichment": request.work_email_enrichment,
    })
}

/// Campaign with one sequence and a weekday business-hours schedule. The
/// first step goes out immediately, later ones three days apart unless a
/// delay is given.
pub fn campaign_body(campaign: &NewCampaign) -> Value {
    let steps: Vec<Value> = campaign
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            json!({
                "type": "email",
                "delay": step.delay.unwrap_or(if i == 0 { 0 } else { 3 }),
                "variants": [{
                    "subject": step.subject.clone().unwrap_or_default(),
                    "body": step.body,
                }],
            })
        })
        .collect();

    let mut body = json!({
        "name": campaign.name,
        "campaign_schedule": {
            "schedules": [{
                "name": "Business Hours",
                "timing": { "from": "09:00", "to": "17:00" },
                "days": { "0": false, "1": true, "2": true, "3": true, "4": true, "5": true, "6": false },
                "timezone": campaign.timezone,
            }],
            "start_date": null,
            "end_date": null,
        },
        "sequences": [{ "steps": steps }],
    });
    if let Some(limit) = campaign.daily_limit {
        body["daily_limit"] = json!(limit);
    }
    if !campaign.email_list.is_empty() {
        body["email_list"] = json!(campaign.email_list);
    }
    body
}
