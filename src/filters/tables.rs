//! Lookup tables used by the filter compiler.
//!
//! Everything here is immutable data. Synonym tables map a term the model
//! (or a user) tends to produce onto one or more exact enum strings; a term
//! may legitimately expand to several values ("fintech" is both finance and
//! software). Keys are written in their natural casing because the exact
//! match pass runs before the case-insensitive one.

use super::schema::{Department, Level};

/// `term → valid enum strings`.
pub type SynonymTable = &'static [(&'static str, &'static [&'static str])];

// ─── Enum synonyms ───────────────────────────────────────────────────────────

pub const LEVEL_SYNONYMS: SynonymTable = &[
    ("C-Suite", &["C-Level"]),
    ("C-suite", &["C-Level"]),
    ("C Level", &["C-Level"]),
    ("CXO", &["C-Level"]),
    ("Executive", &["C-Level"]),
    ("Direction", &["C-Level"]),
    ("Board Member", &["C-Level"]),
    ("VP", &["VP-Level"]),
    ("Vice President", &["VP-Level"]),
    ("VP Level", &["VP-Level"]),
    ("Directeur", &["Director-Level", "Director"]),
    ("Director Level", &["Director-Level"]),
    ("Head", &["Director-Level"]),
    ("Manager", &["Manager-Level"]),
    ("Manager Level", &["Manager-Level"]),
    ("Responsable", &["Manager-Level"]),
    ("Senior", &["Mid-Senior level", "Director-Level", "VP-Level", "C-Level"]),
    ("Mid-Senior", &["Mid-Senior level"]),
    ("Mid Senior", &["Mid-Senior level"]),
    ("Junior", &["Entry level"]),
    ("Débutant", &["Entry level"]),
    ("Entry", &["Entry level"]),
    ("Entry-level", &["Entry level"]),
    ("Intern", &["Entry level"]),
    ("Training", &["Entry level"]),
    ("Founder", &["Owner"]),
    ("Partner", &["Owner"]),
    ("Individual Contributor", &["Staff"]),
];

pub const DEPARTMENT_SYNONYMS: SynonymTable = &[
    ("Tech", &["Engineering"]),
    ("R&D", &["Engineering"]),
    ("Product", &["Engineering"]),
    ("Développement", &["Engineering"]),
    ("Finance", &["Finance & Administration"]),
    ("Administration", &["Finance & Administration"]),
    ("Accounting", &["Finance & Administration"]),
    ("Comptabilité", &["Finance & Administration"]),
    ("HR", &["Human Resources"]),
    ("RH", &["Human Resources"]),
    ("People", &["Human Resources"]),
    ("Ressources Humaines", &["Human Resources"]),
    ("IT", &["IT & IS"]),
    ("IS", &["IT & IS"]),
    ("Information Technology", &["IT & IS"]),
    ("Informatique", &["IT & IS"]),
    ("Growth", &["Marketing"]),
    ("Communication", &["Marketing"]),
    ("Ops", &["Operations"]),
    ("Opérations", &["Operations"]),
    ("Business Development", &["Sales"]),
    ("Commercial", &["Sales"]),
    ("Ventes", &["Sales"]),
    ("Revenue", &["Sales"]),
    ("Customer Success", &["Support"]),
    ("Customer Service", &["Support"]),
    ("Service Client", &["Support"]),
];

pub const INDUSTRY_SYNONYMS: SynonymTable = &[
    // Values the platform used to accept and the model still emits.
    ("Software", &["Software & Internet"]),
    ("Internet", &["Software & Internet"]),
    ("Real Estate", &["Real Estate & Construction"]),
    ("Transportation", &["Transportation & Storage"]),
    ("Healthcare", &["Healthcare, Pharmaceuticals, & Biotech"]),
    ("Travel", &["Travel, Recreation, and Leisure"]),
    ("Wholesale", &["Wholesale & Distribution"]),
    // Common shorthand, English and French.
    ("SaaS", &["Software & Internet"]),
    ("SaaS B2B", &["Software & Internet"]),
    ("B2B SaaS", &["Software & Internet"]),
    ("Logiciel", &["Software & Internet"]),
    ("Tech", &["Software & Internet"]),
    ("IT", &["Software & Internet"]),
    ("Cybersecurity", &["Software & Internet"]),
    ("Cybersécurité", &["Software & Internet"]),
    ("AI", &["Software & Internet"]),
    ("IA", &["Software & Internet"]),
    ("Machine Learning", &["Software & Internet"]),
    ("MarTech", &["Software & Internet"]),
    ("HRTech", &["Software & Internet"]),
    ("Fintech", &["Financial Services", "Software & Internet"]),
    ("E-commerce", &["Retail", "Software & Internet"]),
    ("Ecommerce", &["Retail", "Software & Internet"]),
    ("PropTech", &["Real Estate & Construction", "Software & Internet"]),
    ("Santé", &["Healthcare, Pharmaceuticals, & Biotech"]),
    ("Pharma", &["Healthcare, Pharmaceuticals, & Biotech"]),
    ("Biotech", &["Healthcare, Pharmaceuticals, & Biotech"]),
    ("Medtech", &["Healthcare, Pharmaceuticals, & Biotech"]),
    ("Consulting", &["Business Services"]),
    ("Conseil", &["Business Services"]),
    ("Agence", &["Business Services"]),
    ("Agency", &["Business Services"]),
    ("Legal", &["Business Services"]),
    ("Juridique", &["Business Services"]),
    ("Logistics", &["Transportation & Storage"]),
    ("Logistique", &["Transportation & Storage"]),
    ("Transport", &["Transportation & Storage"]),
    ("Construction", &["Real Estate & Construction"]),
    ("BTP", &["Real Estate & Construction"]),
    ("Immobilier", &["Real Estate & Construction"]),
    ("Food", &["Consumer Services"]),
    ("Restaurant", &["Consumer Services"]),
    ("Hospitality", &["Travel, Recreation, and Leisure"]),
    ("Hôtellerie", &["Travel, Recreation, and Leisure"]),
    ("Tourism", &["Travel, Recreation, and Leisure"]),
    ("Banking", &["Financial Services"]),
    ("Banque", &["Financial Services"]),
    ("Insurance", &["Financial Services"]),
    ("Assurance", &["Financial Services"]),
    ("Media", &["Media & Entertainment"]),
    ("Presse", &["Media & Entertainment"]),
    ("Advertising", &["Media & Entertainment"]),
    ("Publicité", &["Media & Entertainment"]),
    ("Telecom", &["Telecommunications"]),
    ("Télécoms", &["Telecommunications"]),
    ("EdTech", &["Education"]),
    ("Formation", &["Education"]),
    ("Energy", &["Energy & Utilities"]),
    ("Énergie", &["Energy & Utilities"]),
    ("Cleantech", &["Energy & Utilities"]),
    ("Mining", &["Agriculture & Mining"]),
    ("Agriculture", &["Agriculture & Mining"]),
    ("Secteur Public", &["Government"]),
    ("Public Sector", &["Government"]),
    ("Nonprofit", &["Non-Profit"]),
    ("NGO", &["Non-Profit"]),
    ("ONG", &["Non-Profit"]),
    ("Association", &["Non-Profit"]),
    ("Hardware", &["Computers & Electronics"]),
    ("Electronics", &["Computers & Electronics"]),
    ("Distribution", &["Wholesale & Distribution"]),
];

pub const EMPLOYEE_COUNT_SYNONYMS: SynonymTable = &[
    ("Startup", &["0 - 25", "25 - 100"]),
    ("Petite boite", &["0 - 25", "25 - 100"]),
    ("< 50", &["0 - 25", "25 - 100"]),
    ("PME", &["25 - 100", "100 - 250"]),
    ("SMB", &["25 - 100", "100 - 250"]),
    ("Small business", &["25 - 100", "100 - 250"]),
    ("ETI", &["250 - 1000", "1K - 10K"]),
    ("Mid-market", &["250 - 1000", "1K - 10K"]),
    ("Enterprise", &["10K - 50K", "50K - 100K", "> 100K"]),
    ("Grande entreprise", &["10K - 50K", "50K - 100K", "> 100K"]),
    ("> 5000", &["1K - 10K", "10K - 50K", "50K - 100K", "> 100K"]),
    ("1000 - 10000", &["1K - 10K"]),
    ("100K+", &["> 100K"]),
];

pub const REVENUE_SYNONYMS: SynonymTable = &[
    // Platform wire values, which drop the first "M".
    ("$1 - 10M", &["$1M - 10M"]),
    ("$10 - 50M", &["$10M - 50M"]),
    ("$50 - 100M", &["$50M - 100M"]),
    ("$100 - 250M", &["$100M - 250M"]),
    ("$250 - 500M", &["$250M - 500M"]),
    ("< $1M", &["$0 - 1M"]),
    ("$1B+", &["> $1B"]),
    ("> 1B", &["> $1B"]),
    ("CA > 10M", &["$10M - 50M", "$50M - 100M", "$100M - 250M", "$250M - 500M", "$500M - 1B", "> $1B"]),
    ("> $10M", &["$10M - 50M", "$50M - 100M", "$100M - 250M", "$250M - 500M", "$500M - 1B", "> $1B"]),
];

// ─── Job titles ──────────────────────────────────────────────────────────────

/// Short-form titles and the equivalent set the search should include.
pub const TITLE_VARIANTS: SynonymTable = &[
    ("CEO", &["CEO", "Chief Executive Officer", "Founder", "Co-founder"]),
    ("CTO", &["CTO", "Chief Technology Officer", "Chief Technical Officer"]),
    ("CFO", &["CFO", "Chief Financial Officer"]),
    ("COO", &["COO", "Chief Operating Officer"]),
    ("CMO", &["CMO", "Chief Marketing Officer"]),
    ("CRO", &["CRO", "Chief Revenue Officer"]),
    ("VP Sales", &["VP Sales", "Vice President Sales", "VP of Sales"]),
    ("VP Marketing", &["VP Marketing", "Vice President Marketing", "VP of Marketing"]),
    ("VP Engineering", &["VP Engineering", "Vice President Engineering", "VP of Engineering"]),
    ("Head of Sales", &["Head of Sales", "Sales Director", "Director of Sales"]),
    ("Head of Marketing", &["Head of Marketing", "Marketing Director", "Director of Marketing"]),
];

/// Terms in the user's own words that signal executive or founder intent.
pub const EXECUTIVE_INTENT_TERMS: &[&str] = &[
    "ceo",
    "chief executive",
    "founder",
    "founders",
    "co-founder",
    "cofounder",
    "fondateur",
    "fondateurs",
    "president",
    "président",
    "pdg",
    "dirigeant",
    "dirigeants",
    "owner",
    "owners",
    "c-level",
    "c-suite",
    "executive",
    "executives",
    "gérant",
];

/// Narrower roles whose names contain an executive term. Removed from the
/// user's text before [`EXECUTIVE_INTENT_TERMS`] are matched.
pub const NARROWER_ROLE_PHRASES: &[&str] = &[
    "vice president",
    "vice-president",
    "vice président",
    "vice-président",
    "account executive",
    "account executives",
    "sales executive",
    "sales executives",
    "executive assistant",
    "executive assistants",
];

/// Generic leadership titles the model over-includes. Compared lowercased.
pub const GENERIC_LEADERSHIP_TITLES: &[&str] = &[
    "ceo",
    "chief executive officer",
    "founder",
    "co-founder",
    "cofounder",
    "co founder",
    "founder & ceo",
    "founder and ceo",
    "president",
    "président",
    "pdg",
];

/// Levels whose only justification can be a generic leadership title.
pub const LEADERSHIP_LEVELS: &[Level] = &[Level::CLevel, Level::Owner];

// ─── Inference keywords ──────────────────────────────────────────────────────

/// Title keyword → seniority level. First match per keyword, all keywords scanned.
pub const TITLE_LEVEL_KEYWORDS: &[(&str, Level)] = &[
    ("chief", Level::CLevel),
    ("ceo", Level::CLevel),
    ("cto", Level::CLevel),
    ("cfo", Level::CLevel),
    ("coo", Level::CLevel),
    ("cmo", Level::CLevel),
    ("cro", Level::CLevel),
    ("cio", Level::CLevel),
    ("vp", Level::VpLevel),
    ("vice president", Level::VpLevel),
    ("head of", Level::DirectorLevel),
    ("director", Level::DirectorLevel),
    ("directeur", Level::DirectorLevel),
    ("directrice", Level::DirectorLevel),
    ("manager", Level::ManagerLevel),
    ("responsable", Level::ManagerLevel),
    ("founder", Level::Owner),
    ("co-founder", Level::Owner),
    ("owner", Level::Owner),
    ("intern", Level::EntryLevel),
    ("junior", Level::EntryLevel),
];

/// Title keyword → department.
pub const TITLE_DEPARTMENT_KEYWORDS: &[(&str, Department)] = &[
    ("sales", Department::Sales),
    ("revenue", Department::Sales),
    ("business development", Department::Sales),
    ("account executive", Department::Sales),
    ("commercial", Department::Sales),
    ("cro", Department::Sales),
    ("marketing", Department::Marketing),
    ("growth", Department::Marketing),
    ("brand", Department::Marketing),
    ("cmo", Department::Marketing),
    ("engineering", Department::Engineering),
    ("engineer", Department::Engineering),
    ("developer", Department::Engineering),
    ("technology", Department::Engineering),
    ("technical", Department::Engineering),
    ("cto", Department::Engineering),
    ("it", Department::ItIs),
    ("information", Department::ItIs),
    ("infrastructure", Department::ItIs),
    ("security", Department::ItIs),
    ("cio", Department::ItIs),
    ("finance", Department::FinanceAdministration),
    ("financial", Department::FinanceAdministration),
    ("accounting", Department::FinanceAdministration),
    ("cfo", Department::FinanceAdministration),
    ("hr", Department::HumanResources),
    ("human resources", Department::HumanResources),
    ("people", Department::HumanResources),
    ("talent", Department::HumanResources),
    ("recruiting", Department::HumanResources),
    ("operations", Department::Operations),
    ("operating", Department::Operations),
    ("coo", Department::Operations),
    ("supply chain", Department::Operations),
    ("support", Department::Support),
    ("customer success", Department::Support),
    ("customer service", Department::Support),
];

// ─── Structural aliases ──────────────────────────────────────────────────────

/// Old or platform-side field names → internal field names.
pub const FIELD_ALIASES: &[(&str, &str)] = &[
    ("title", "job_titles"),
    ("titles", "job_titles"),
    ("job_title", "job_titles"),
    ("jobTitles", "job_titles"),
    ("levels", "level"),
    ("seniority", "level"),
    ("departments", "department"),
    ("name", "names"),
    ("industry", "industries"),
    ("employeeCount", "employee_count"),
    ("employee_counts", "employee_count"),
    ("company_size", "employee_count"),
    ("companySize", "employee_count"),
    ("funding", "funding_type"),
    ("company_name", "company_names"),
    ("companyNames", "company_names"),
    ("location", "locations"),
    ("countries", "locations"),
    ("location_mode", "location_filter_type"),
    ("keyword", "keyword_filter"),
    ("keywords", "keyword_filter"),
    ("technology", "technologies"),
    ("tech_stack", "technologies"),
    ("look_alike", "lookalike_domain"),
    ("lookalike", "lookalike_domain"),
    ("job_listings", "job_listing"),
    ("show_one_per_company", "show_one_lead_per_company"),
];

/// Envelope keys whose object value *is* the filter set.
pub const ENVELOPE_KEYS: &[&str] = &["search_filters", "searchFilters", "filters"];

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::schema::{EmployeeCount, FilterEnum, Industry, Revenue, KNOWN_FIELDS};

    fn assert_table_valid<E: FilterEnum>(table: SynonymTable) {
        for (term, values) in table {
            assert!(!values.is_empty(), "{term} maps to nothing");
            for value in *values {
                assert!(
                    E::parse(value).is_some(),
                    "{term} maps to invalid {} value {value:?}",
                    E::FIELD
                );
            }
        }
    }

    #[test]
    fn test_synonym_targets_are_valid_enum_values() {
        assert_table_valid::<Level>(LEVEL_SYNONYMS);
        assert_table_valid::<Department>(DEPARTMENT_SYNONYMS);
        assert_table_valid::<Industry>(INDUSTRY_SYNONYMS);
        assert_table_valid::<EmployeeCount>(EMPLOYEE_COUNT_SYNONYMS);
        assert_table_valid::<Revenue>(REVENUE_SYNONYMS);
    }

    #[test]
    fn test_field_aliases_target_known_fields() {
        for (alias, target) in FIELD_ALIASES {
            assert!(KNOWN_FIELDS.contains(target), "{alias} → unknown {target}");
            assert!(!KNOWN_FIELDS.contains(alias), "{alias} shadows a real field");
        }
    }

    #[test]
    fn test_title_variants_start_with_key() {
        for (key, variants) in TITLE_VARIANTS {
            assert_eq!(variants.first(), Some(key));
        }
    }
}
