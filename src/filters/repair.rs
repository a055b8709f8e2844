//! Enum repair, title expansion, intent consistency and inference.
//!
//! Input is a [`NormalizedFilters`] object whose enum fields are lists of
//! arbitrary strings. Output is a [`RepairedFilters`] whose enum fields are
//! typed, so no unvalidated value can reach a later stage.
//!
//! Per value, repair tries in order:
//!
//! 1. exact match against the enum,
//! 2. exact key in the field's synonym table (may expand to several values),
//! 3. case/whitespace-insensitive match against synonyms and enum values, plus
//!    numeric range parsing for headcounts,
//! 4. fuzzy substring containment, accepted only when it is unambiguous,
//! 5. drop (logged).

use serde_json::{Map, Value};

use super::normalize::NormalizedFilters;
use super::schema::{Department, EmployeeCount, FilterEnum, Industry, Level, Revenue};
use super::tables::{
    SynonymTable, DEPARTMENT_SYNONYMS, EMPLOYEE_COUNT_SYNONYMS, EXECUTIVE_INTENT_TERMS,
    GENERIC_LEADERSHIP_TITLES, INDUSTRY_SYNONYMS, LEADERSHIP_LEVELS, LEVEL_SYNONYMS,
    NARROWER_ROLE_PHRASES, REVENUE_SYNONYMS, TITLE_DEPARTMENT_KEYWORDS, TITLE_LEVEL_KEYWORDS,
    TITLE_VARIANTS,
};

/// Shortest candidate allowed to match as a substring of a valid value.
const MIN_FUZZY_LEN: usize = 4;

// ─── Text helpers ────────────────────────────────────────────────────────────

/// Lowercase, trim, collapse internal whitespace.
pub(crate) fn fold(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Whole-word term matcher over a piece of text.
///
/// Punctuation other than `-` and `&` separates words, so `"VP, Sales"`
/// contains the term `"vp"` but `"MVP"` does not.
pub(crate) struct Terms(String);

impl Terms {
    pub fn new(text: &str) -> Self {
        Self(Self::pad(text))
    }

    pub fn contains(&self, term: &str) -> bool {
        self.0.contains(&Self::pad(term))
    }

    /// Blank out every occurrence of a phrase.
    pub fn without(self, phrase: &str) -> Self {
        Self(self.0.replace(&Self::pad(phrase), " | "))
    }

    fn pad(text: &str) -> String {
        let mapped: String = text
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '&' {
                    c
                } else {
                    ' '
                }
            })
            .collect();
        format!(" {} ", mapped.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

pub(crate) fn has_executive_intent(free_text: &str) -> bool {
    let terms = NARROWER_ROLE_PHRASES
        .iter()
        .fold(Terms::new(free_text), |terms, phrase| terms.without(phrase));
    EXECUTIVE_INTENT_TERMS.iter().any(|term| terms.contains(term))
}

// ─── Headcount ranges ────────────────────────────────────────────────────────

fn scan_numbers(text: &str) -> Vec<(u64, usize, usize)> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
            i += 1;
        }
        let Ok(mut value) = text[start..i].trim_end_matches('.').parse::<f64>() else {
            continue;
        };
        if i < bytes.len() && bytes[i] == b'k' {
            value *= 1_000.0;
            i += 1;
        }
        out.push((value as u64, start, i));
    }
    out
}

/// Parse a headcount expression such as `"50-200"`, `"1k to 5k employees"`,
/// `"500+"`, `"< 50"` or `"200"` into inclusive-ish bounds.
pub(crate) fn parse_headcount_range(text: &str) -> Option<(u64, Option<u64>)> {
    let lower = text
        .to_lowercase()
        .replace(',', "")
        .replace(['–', '—'], "-");
    let numbers = scan_numbers(&lower);

    if let [(a, _, a_end), (b, b_start, _), ..] = numbers.as_slice() {
        let between = lower[*a_end..*b_start].trim();
        if matches!(between, "-" | "to" | "and" | "à" | "a") {
            return Some(((*a).min(*b), Some((*a).max(*b))));
        }
    }

    let (n, start, end) = *numbers.first()?;
    let before = lower[..start].trim_end();
    let after = lower[end..].trim_start();
    let open_above = ["over", "more than", "plus de", "above", "at least", ">"]
        .iter()
        .any(|p| before.ends_with(p) || before.ends_with(&format!("{p}=")))
        || after.starts_with('+');
    if open_above {
        return Some((n, None));
    }
    let open_below = ["under", "less than", "fewer than", "moins de", "up to", "<"]
        .iter()
        .any(|p| before.ends_with(p) || before.ends_with(&format!("{p}=")));
    if open_below {
        return Some((0, Some(n)));
    }
    Some((n, Some(n)))
}

/// Every bucket intersecting the given bounds.
pub(crate) fn headcount_buckets(lo: u64, hi: Option<u64>) -> Vec<EmployeeCount> {
    EmployeeCount::ALL
        .iter()
        .copied()
        .filter(|bucket| {
            let (b_lo, b_hi) = bucket.bounds();
            match hi {
                // A point value belongs to the bucket whose range starts at or below it.
                Some(h) if h == lo => b_lo <= lo && b_hi.map_or(true, |bh| lo < bh),
                Some(h) => b_lo < h && b_hi.map_or(true, |bh| bh > lo),
                None => b_hi.map_or(true, |bh| bh > lo),
            }
        })
        .collect()
}

// ─── Per-value repair ────────────────────────────────────────────────────────

/// An enum whose values can be recovered from loose text.
pub(crate) trait Repairable: FilterEnum {
    const SYNONYMS: SynonymTable;

    fn from_range(_text: &str) -> Option<Vec<Self>> {
        None
    }
}

impl Repairable for Level {
    const SYNONYMS: SynonymTable = LEVEL_SYNONYMS;
}

impl Repairable for Department {
    const SYNONYMS: SynonymTable = DEPARTMENT_SYNONYMS;
}

impl Repairable for Industry {
    const SYNONYMS: SynonymTable = INDUSTRY_SYNONYMS;
}

impl Repairable for Revenue {
    const SYNONYMS: SynonymTable = REVENUE_SYNONYMS;
}

impl Repairable for EmployeeCount {
    const SYNONYMS: SynonymTable = EMPLOYEE_COUNT_SYNONYMS;

    fn from_range(text: &str) -> Option<Vec<Self>> {
        if !text.bytes().any(|b| b.is_ascii_digit()) {
            return None;
        }
        let (lo, hi) = parse_headcount_range(text)?;
        let buckets = headcount_buckets(lo, hi);
        (!buckets.is_empty()).then_some(buckets)
    }
}

fn parse_targets<E: FilterEnum>(targets: &[&str]) -> Vec<E> {
    targets.iter().filter_map(|t| E::parse(t)).collect()
}

/// Repair one raw value. `None` means the value could not be recovered.
pub(crate) fn repair_value<E: Repairable>(raw: &str) -> Option<Vec<E>> {
    let candidate = raw.trim();
    if candidate.is_empty() {
        return None;
    }

    if let Some(value) = E::parse(candidate) {
        return Some(vec![value]);
    }

    if let Some((_, targets)) = E::SYNONYMS.iter().find(|(key, _)| *key == candidate) {
        return Some(parse_targets(targets));
    }

    let folded = fold(candidate);
    if let Some((_, targets)) = E::SYNONYMS.iter().find(|(key, _)| fold(key) == folded) {
        return Some(parse_targets(targets));
    }
    if let Some(value) = E::ALL.iter().find(|v| fold(v.as_str()) == folded) {
        return Some(vec![*value]);
    }
    if let Some(values) = E::from_range(candidate) {
        return Some(values);
    }

    let fuzzy: Vec<E> = E::ALL
        .iter()
        .copied()
        .filter(|v| {
            let valid = fold(v.as_str());
            (valid.contains(&folded) && folded.len() >= MIN_FUZZY_LEN)
                || (folded.contains(&valid) && valid.len() * 2 >= folded.len())
        })
        .collect();
    match fuzzy.as_slice() {
        [single] => Some(vec![*single]),
        [] => None,
        _ => {
            tracing::debug!(field = E::FIELD, value = %candidate, matches = fuzzy.len(), "ambiguous fuzzy match");
            None
        }
    }
}

/// A value removed during repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedValue {
    pub field: &'static str,
    pub value: String,
}

/// Repair a list of raw values, keeping order and removing duplicates.
pub(crate) fn repair_values<E: Repairable>(raw: &[String], dropped: &mut Vec<DroppedValue>) -> Vec<E> {
    let mut out: Vec<E> = Vec::new();
    for value in raw {
        match repair_value::<E>(value) {
            Some(values) => {
                for v in values {
                    if !out.contains(&v) {
                        out.push(v);
                    }
                }
            }
            None => {
                tracing::warn!(field = E::FIELD, value = %value, "dropping invalid filter value");
                dropped.push(DroppedValue {
                    field: E::FIELD,
                    value: value.clone(),
                });
            }
        }
    }
    out
}

// ─── Repaired stage ──────────────────────────────────────────────────────────

/// Filters whose enumerated fields are typed. Everything else is carried in
/// `rest` unchanged for validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepairedFilters {
    pub job_titles: Vec<String>,
    pub level: Vec<Level>,
    pub department: Vec<Department>,
    pub industries: Vec<Industry>,
    pub employee_count: Vec<EmployeeCount>,
    pub revenue: Vec<Revenue>,
    pub rest: Map<String, Value>,
    pub dropped: Vec<DroppedValue>,
}

fn take_strings(map: &mut Map<String, Value>, key: &str) -> Vec<String> {
    match map.remove(key) {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn push_unique_title(titles: &mut Vec<String>, title: &str) {
    let folded = fold(title);
    if !titles.iter().any(|t| fold(t) == folded) {
        titles.push(title.to_string());
    }
}

/// Levels implied by a set of job titles.
pub(crate) fn infer_levels(titles: &[String]) -> Vec<Level> {
    let mut out = Vec::new();
    for title in titles {
        let terms = Terms::new(title);
        for (keyword, level) in TITLE_LEVEL_KEYWORDS {
            if terms.contains(keyword) && !out.contains(level) {
                out.push(*level);
            }
        }
    }
    out
}

/// Departments implied by a set of job titles.
pub(crate) fn infer_departments(titles: &[String]) -> Vec<Department> {
    let mut out = Vec::new();
    for title in titles {
        let terms = Terms::new(title);
        for (keyword, department) in TITLE_DEPARTMENT_KEYWORDS {
            if terms.contains(keyword) && !out.contains(department) {
                out.push(*department);
            }
        }
    }
    out
}

/// Repair every enumerated field of a normalized object.
pub fn repair(normalized: NormalizedFilters) -> RepairedFilters {
    let mut map = normalized.into_inner();
    let mut dropped = Vec::new();

    let mut job_titles = Vec::new();
    for title in take_strings(&mut map, "job_titles") {
        push_unique_title(&mut job_titles, title.trim());
    }

    let level = repair_values::<Level>(&take_strings(&mut map, Level::FIELD), &mut dropped);
    let department = repair_values::<Department>(&take_strings(&mut map, Department::FIELD), &mut dropped);
    let industries = repair_values::<Industry>(&take_strings(&mut map, Industry::FIELD), &mut dropped);
    let employee_count =
        repair_values::<EmployeeCount>(&take_strings(&mut map, EmployeeCount::FIELD), &mut dropped);
    let revenue = repair_values::<Revenue>(&take_strings(&mut map, Revenue::FIELD), &mut dropped);

    RepairedFilters {
        job_titles,
        level,
        department,
        industries,
        employee_count,
        revenue,
        rest: map,
        dropped,
    }
}

impl RepairedFilters {
    /// Replace short-form titles with their equivalent title set.
    pub fn expand_title_variants(&mut self) {
        let mut expanded = Vec::new();
        for title in &self.job_titles {
            let folded = fold(title);
            match TITLE_VARIANTS.iter().find(|(key, _)| fold(key) == folded) {
                Some((_, variants)) => {
                    for variant in *variants {
                        push_unique_title(&mut expanded, variant);
                    }
                }
                None => push_unique_title(&mut expanded, title),
            }
        }
        self.job_titles = expanded;
    }

    /// Strip generic leadership titles the user never asked for.
    ///
    /// Levels that only those titles justified go with them.
    pub fn apply_intent_rule(&mut self, free_text: &str) {
        if has_executive_intent(free_text) {
            return;
        }
        let before = self.job_titles.len();
        self.job_titles
            .retain(|t| !GENERIC_LEADERSHIP_TITLES.contains(&fold(t).as_str()));
        let stripped = before - self.job_titles.len();
        if stripped == 0 {
            return;
        }
        let justified = infer_levels(&self.job_titles);
        self.level
            .retain(|l| !LEADERSHIP_LEVELS.contains(l) || justified.contains(l));
        tracing::debug!(stripped, "removed generic leadership titles without executive intent");
    }

    /// Fill an empty level or department from the surviving titles.
    pub fn infer_missing(&mut self) {
        if self.level.is_empty() {
            self.level = infer_levels(&self.job_titles);
        }
        if self.department.is_empty() {
            self.department = infer_departments(&self.job_titles);
        }
    }

    /// Re-assemble a flat JSON object for schema validation.
    pub fn into_map(self) -> Map<String, Value> {
        fn put<T: serde::Serialize>(map: &mut Map<String, Value>, key: &str, values: &[T]) {
            if values.is_empty() {
                return;
            }
            if let Ok(value) = serde_json::to_value(values) {
                map.insert(key.to_string(), value);
            }
        }

        let mut map = self.rest;
        put(&mut map, "job_titles", &self.job_titles);
        put(&mut map, Level::FIELD, &self.level);
        put(&mut map, Department::FIELD, &self.department);
        put(&mut map, Industry::FIELD, &self.industries);
        put(&mut map, EmployeeCount::FIELD, &self.employee_count);
        put(&mut map, Revenue::FIELD, &self.revenue);
        map
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::normalize::{normalize, RawFilters};
    use serde_json::json;

    fn repaired(value: Value) -> RepairedFilters {
        repair(normalize(RawFilters::new(value)))
    }

    #[test]
    fn test_exact_value_kept() {
        assert_eq!(repair_value::<Level>("VP-Level"), Some(vec![Level::VpLevel]));
    }

    #[test]
    fn test_synonym_maps_to_multiple_values() {
        assert_eq!(
            repair_value::<Industry>("Fintech"),
            Some(vec![Industry::FinancialServices, Industry::SoftwareInternet])
        );
    }

    #[test]
    fn test_case_insensitive_synonym_and_value() {
        assert_eq!(repair_value::<Industry>("saas"), Some(vec![Industry::SoftwareInternet]));
        assert_eq!(repair_value::<Department>("  human   resources "), Some(vec![Department::HumanResources]));
    }

    #[test]
    fn test_headcount_range_spans_buckets() {
        assert_eq!(
            repair_value::<EmployeeCount>("50-200"),
            Some(vec![EmployeeCount::From25To100, EmployeeCount::From100To250])
        );
        assert_eq!(
            repair_value::<EmployeeCount>("500+ employees"),
            Some(vec![
                EmployeeCount::From250To1000,
                EmployeeCount::From1KTo10K,
                EmployeeCount::From10KTo50K,
                EmployeeCount::From50KTo100K,
                EmployeeCount::Over100K,
            ])
        );
        assert_eq!(repair_value::<EmployeeCount>("100"), Some(vec![EmployeeCount::From100To250]));
        assert_eq!(
            repair_value::<EmployeeCount>("less than 50"),
            Some(vec![EmployeeCount::UpTo25, EmployeeCount::From25To100])
        );
    }

    #[test]
    fn test_parse_headcount_variants() {
        assert_eq!(parse_headcount_range("1k to 5k"), Some((1_000, Some(5_000))));
        assert_eq!(parse_headcount_range("between 200 and 50"), Some((50, Some(200))));
        assert_eq!(parse_headcount_range("> 1,000"), Some((1_000, None)));
        assert_eq!(parse_headcount_range("none"), None);
    }

    #[test]
    fn test_fuzzy_unique_match_accepted() {
        assert_eq!(repair_value::<Department>("Engineer"), Some(vec![Department::Engineering]));
        assert_eq!(
            repair_value::<Industry>("Pharmaceuticals"),
            Some(vec![Industry::HealthcarePharmaBiotech])
        );
        assert_eq!(repair_value::<Industry>("retail shop"), Some(vec![Industry::Retail]));
    }

    #[test]
    fn test_fuzzy_ambiguous_or_short_dropped() {
        assert_eq!(repair_value::<Industry>("services"), None);
        assert_eq!(repair_value::<Industry>("ret"), None);
    }

    #[test]
    fn test_invalid_values_dropped_individually() {
        let r = repaired(json!({"industries": ["SaaS", "Underwater Basket Weaving"]}));
        assert_eq!(r.industries, vec![Industry::SoftwareInternet]);
        assert_eq!(
            r.dropped,
            vec![DroppedValue {
                field: "industries",
                value: "Underwater Basket Weaving".into()
            }]
        );
    }

    #[test]
    fn test_duplicates_removed_after_mapping() {
        let r = repaired(json!({"industries": ["SaaS", "Software", "Software & Internet"]}));
        assert_eq!(r.industries, vec![Industry::SoftwareInternet]);
    }

    #[test]
    fn test_title_variants_expand() {
        let mut r = repaired(json!({"job_titles": ["vp sales", "Account Executive"]}));
        r.expand_title_variants();
        assert_eq!(
            r.job_titles,
            vec!["VP Sales", "Vice President Sales", "VP of Sales", "Account Executive"]
        );
    }

    #[test]
    fn test_intent_rule_strips_generic_titles_and_levels() {
        let mut r = repaired(json!({
            "job_titles": ["VP Sales", "CEO", "Founder"],
            "level": ["VP-Level", "C-Level", "Owner"]
        }));
        r.apply_intent_rule("VP Sales in SaaS companies");
        assert_eq!(r.job_titles, vec!["VP Sales"]);
        assert_eq!(r.level, vec![Level::VpLevel]);
    }

    #[test]
    fn test_intent_rule_keeps_levels_still_justified() {
        let mut r = repaired(json!({
            "job_titles": ["CTO", "CEO"],
            "level": ["C-Level"]
        }));
        r.apply_intent_rule("technical leaders");
        assert_eq!(r.job_titles, vec!["CTO"]);
        assert_eq!(r.level, vec![Level::CLevel]);
    }

    #[test]
    fn test_intent_rule_respects_executive_text() {
        let mut r = repaired(json!({"job_titles": ["CEO", "Founder"]}));
        r.apply_intent_rule("Founders of seed-stage startups");
        assert_eq!(r.job_titles, vec!["CEO", "Founder"]);
    }

    #[test]
    fn test_intent_rule_ignores_narrower_role_names() {
        for text in [
            "Vice President of Sales in SaaS",
            "Account Executives in SaaS",
            "Executive Assistant to the board",
        ] {
            let mut r = repaired(json!({
                "job_titles": ["VP Sales", "CEO", "Founder"],
                "level": ["VP-Level", "C-Level"]
            }));
            r.apply_intent_rule(text);
            assert!(!r.job_titles.contains(&"CEO".to_string()), "{text}");
            assert!(!r.job_titles.contains(&"Founder".to_string()), "{text}");
            assert_eq!(r.level, vec![Level::VpLevel], "{text}");
        }
    }

    #[test]
    fn test_executive_intent_survives_next_to_narrower_roles() {
        assert!(has_executive_intent("President of mid-market SaaS companies"));
        assert!(has_executive_intent("Founders and account executives"));
        assert!(!has_executive_intent("Vice-President Marketing"));
        assert!(!has_executive_intent("account executive"));
    }

    #[test]
    fn test_inference_fills_only_empty_fields() {
        let mut r = repaired(json!({
            "job_titles": ["Head of Marketing", "Growth Manager"],
            "department": ["Sales"]
        }));
        r.infer_missing();
        assert_eq!(r.level, vec![Level::DirectorLevel, Level::ManagerLevel]);
        assert_eq!(r.department, vec![Department::Sales]);
    }

    #[test]
    fn test_terms_match_whole_words() {
        let terms = Terms::new("Our MVP, for the VP-level crowd");
        assert!(terms.contains("vp-level"));
        assert!(!terms.contains("vp"));
        assert!(Terms::new("VP, Sales").contains("vp"));
    }

    #[test]
    fn test_into_map_round_trips_typed_fields() {
        let r = repaired(json!({"level": ["VP"], "news": "raised"}));
        let map = r.into_map();
        assert_eq!(map["level"], json!(["VP-Level"]));
        assert_eq!(map["news"], json!("raised"));
    }
}
