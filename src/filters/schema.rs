//! Strict filter schema accepted by the lead search platform.
//!
//! Every enumerated dimension is a closed Rust enum, so a `SearchFilters`
//! value can only ever carry platform-valid values. The compiler stages in
//! [`super::normalize`] and [`super::repair`] exist to get loosely-shaped
//! model output into this type.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── Enumerated values ───────────────────────────────────────────────────────

/// Common behaviour of the closed value sets used by filter dimensions.
pub trait FilterEnum: Copy + Eq + Sized + 'static {
    /// Wire name of the field this enum populates.
    const FIELD: &'static str;
    /// Every valid value, in the order the platform documents them.
    const ALL: &'static [Self];

    /// The exact platform string for this value.
    fn as_str(&self) -> &'static str;

    /// Exact (case-sensitive) lookup.
    fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.as_str() == value)
    }
}

macro_rules! filter_enum {
    (
        $(#[$meta:meta])*
        $name:ident, field = $field:literal {
            $($variant:ident => $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl FilterEnum for $name {
            const FIELD: &'static str = $field;
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

filter_enum! {
    /// Seniority level.
    Level, field = "level" {
        CLevel => "C-Level",
        VpLevel => "VP-Level",
        DirectorLevel => "Director-Level",
        ManagerLevel => "Manager-Level",
        Staff => "Staff",
        EntryLevel => "Entry level",
        MidSeniorLevel => "Mid-Senior level",
        Director => "Director",
        Associate => "Associate",
        Owner => "Owner",
    }
}

filter_enum! {
    /// Functional department.
    Department, field = "department" {
        Engineering => "Engineering",
        FinanceAdministration => "Finance & Administration",
        HumanResources => "Human Resources",
        ItIs => "IT & IS",
        Marketing => "Marketing",
        Operations => "Operations",
        Sales => "Sales",
        Support => "Support",
        Other => "Other",
    }
}

filter_enum! {
    /// Company industry.
    Industry, field = "industries" {
        AgricultureMining => "Agriculture & Mining",
        BusinessServices => "Business Services",
        ComputersElectronics => "Computers & Electronics",
        ConsumerServices => "Consumer Services",
        Education => "Education",
        EnergyUtilities => "Energy & Utilities",
        FinancialServices => "Financial Services",
        Government => "Government",
        HealthcarePharmaBiotech => "Healthcare, Pharmaceuticals, & Biotech",
        Manufacturing => "Manufacturing",
        MediaEntertainment => "Media & Entertainment",
        NonProfit => "Non-Profit",
        Other => "Other",
        RealEstateConstruction => "Real Estate & Construction",
        Retail => "Retail",
        SoftwareInternet => "Software & Internet",
        Telecommunications => "Telecommunications",
        TransportationStorage => "Transportation & Storage",
        TravelRecreationLeisure => "Travel, Recreation, and Leisure",
        WholesaleDistribution => "Wholesale & Distribution",
    }
}

filter_enum! {
    /// Company headcount bucket.
    EmployeeCount, field = "employee_count" {
        UpTo25 => "0 - 25",
        From25To100 => "25 - 100",
        From100To250 => "100 - 250",
        From250To1000 => "250 - 1000",
        From1KTo10K => "1K - 10K",
        From10KTo50K => "10K - 50K",
        From50KTo100K => "50K - 100K",
        Over100K => "> 100K",
    }
}

filter_enum! {
    /// Annual revenue bucket (USD).
    Revenue, field = "revenue" {
        UpTo1M => "$0 - 1M",
        From1MTo10M => "$1M - 10M",
        From10MTo50M => "$10M - 50M",
        From50MTo100M => "$50M - 100M",
        From100MTo250M => "$100M - 250M",
        From250MTo500M => "$250M - 500M",
        From500MTo1B => "$500M - 1B",
        Over1B => "> $1B",
    }
}

impl EmployeeCount {
    /// Inclusive headcount bounds of the bucket. `None` upper bound = open.
    pub fn bounds(&self) -> (u64, Option<u64>) {
        match self {
            EmployeeCount::UpTo25 => (0, Some(25)),
            EmployeeCount::From25To100 => (25, Some(100)),
            EmployeeCount::From100To250 => (100, Some(250)),
            EmployeeCount::From250To1000 => (250, Some(1_000)),
            EmployeeCount::From1KTo10K => (1_000, Some(10_000)),
            EmployeeCount::From10KTo50K => (10_000, Some(50_000)),
            EmployeeCount::From50KTo100K => (50_000, Some(100_000)),
            EmployeeCount::Over100K => (100_000, None),
        }
    }
}

/// Whether locations apply to the contact or to the company headquarters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationFilterType {
    Contact,
    CompanyHq,
}

// ─── Compound values ─────────────────────────────────────────────────────────

/// Include/exclude lists for free-text name filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IncludeExclude {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl IncludeExclude {
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// A location already resolved to a place id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub place_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Resolved places split into include and exclude sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedPlaces {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<Place>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<Place>,
}

/// The three accepted location shapes.
///
/// Plain names are what the model produces; they are resolved to places
/// right before a platform call (see [`super::locations`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Locations {
    Names(Vec<String>),
    Places(Vec<Place>),
    Scoped(ScopedPlaces),
}

impl Locations {
    pub fn is_empty(&self) -> bool {
        match self {
            Locations::Names(names) => names.is_empty(),
            Locations::Places(places) => places.is_empty(),
            Locations::Scoped(scoped) => scoped.include.is_empty() && scoped.exclude.is_empty(),
        }
    }
}

// ─── SearchFilters ───────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

/// A validated lead search filter set.
///
/// Unknown keys are rejected on deserialization; this is the "strict schema"
/// the compiler validates against. The two dedup flags default to `true` and
/// are forced back to `true` by every constructor in the compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchFilters {
    // Person
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub job_titles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub level: Vec<Level>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub department: Vec<Department>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names: Option<IncludeExclude>,

    // Company
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub industries: Vec<Industry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub employee_count: Vec<EmployeeCount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub revenue: Vec<Revenue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub funding_type: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_names: Option<IncludeExclude>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<String>,

    // Location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Locations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_filter_type: Option<LocationFilterType>,

    // Advanced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub technologies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookalike_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_listing: Option<String>,

    // Dedup
    #[serde(default = "default_true")]
    pub skip_owned_leads: bool,
    #[serde(default = "default_true")]
    pub show_one_lead_per_company: bool,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            job_titles: Vec::new(),
            level: Vec::new(),
            department: Vec::new(),
            names: None,
            industries: Vec::new(),
            employee_count: Vec::new(),
            revenue: Vec::new(),
            funding_type: Vec::new(),
            company_names: None,
            domains: Vec::new(),
            locations: None,
            location_filter_type: None,
            keyword_filter: None,
            technologies: Vec::new(),
            lookalike_domain: None,
            news: None,
            job_listing: None,
            skip_owned_leads: true,
            show_one_lead_per_company: true,
        }
    }
}

impl SearchFilters {
    /// Force both dedup flags on.
    pub fn force_dedup(&mut self) {
        self.skip_owned_leads = true;
        self.show_one_lead_per_company = true;
    }

    /// Names of the dimensions that currently constrain the search.
    ///
    /// The dedup flags and `location_filter_type` are modifiers, not
    /// dimensions, and are never listed.
    pub fn active_dimensions(&self) -> Vec<&'static str> {
        let mut dims = Vec::new();
        let mut push = |set: bool, name: &'static str| {
            if set {
                dims.push(name);
            }
        };
        push(!self.job_titles.is_empty(), "job_titles");
        push(!self.level.is_empty(), "level");
        push(!self.department.is_empty(), "department");
        push(self.names.as_ref().is_some_and(|n| !n.is_empty()), "names");
        push(!self.industries.is_empty(), "industries");
        push(!self.employee_count.is_empty(), "employee_count");
        push(!self.revenue.is_empty(), "revenue");
        push(!self.funding_type.is_empty(), "funding_type");
        push(self.company_names.as_ref().is_some_and(|n| !n.is_empty()), "company_names");
        push(!self.domains.is_empty(), "domains");
        push(self.locations.as_ref().is_some_and(|l| !l.is_empty()), "locations");
        push(self.keyword_filter.as_deref().is_some_and(|s| !s.is_empty()), "keyword_filter");
        push(!self.technologies.is_empty(), "technologies");
        push(self.lookalike_domain.as_deref().is_some_and(|s| !s.is_empty()), "lookalike_domain");
        push(self.news.as_deref().is_some_and(|s| !s.is_empty()), "news");
        push(self.job_listing.as_deref().is_some_and(|s| !s.is_empty()), "job_listing");
        dims
    }

    /// `true` when nothing but the dedup flags is set.
    pub fn is_trivial(&self) -> bool {
        self.active_dimensions().is_empty()
    }
}

// ─── Field catalogue ─────────────────────────────────────────────────────────

/// Fields holding a list of enumerated values.
pub const ENUM_FIELDS: &[&str] = &["level", "department", "industries", "employee_count", "revenue"];

/// Fields holding a list of free strings.
pub const STRING_LIST_FIELDS: &[&str] = &["job_titles", "funding_type", "domains", "technologies"];

/// Fields holding a single free string.
pub const TEXT_FIELDS: &[&str] = &["keyword_filter", "lookalike_domain", "news", "job_listing"];

/// Every top-level field of [`SearchFilters`].
pub const KNOWN_FIELDS: &[&str] = &[
    "job_titles",
    "level",
    "department",
    "names",
    "industries",
    "employee_count",
    "revenue",
    "funding_type",
    "company_names",
    "domains",
    "locations",
    "location_filter_type",
    "keyword_filter",
    "technologies",
    "lookalike_domain",
    "news",
    "job_listing",
    "skip_owned_leads",
    "show_one_lead_per_company",
];

/// Fields whose value is legitimately an object (never a wrapper section).
pub const OBJECT_FIELDS: &[&str] = &["names", "company_names", "locations"];

// ─── Tests ───────────────────────────────────────────────────────────────────
