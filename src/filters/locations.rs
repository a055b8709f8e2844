//! Place-name resolution for location filters.
//!
//! The search platform only accepts locations as `{place_id, label}` pairs.
//! Common B2B prospecting geographies are resolved from a built-in table;
//! anything else is reported as unresolved and left to the caller.

use super::schema::{Locations, Place, ScopedPlaces};

/// `lowercase name → place id`.
const PLACE_IDS: &[(&str, &str)] = &[
    // Europe
    ("france", "ChIJMVd4MymgVA0R99lHx5Y__Ws"),
    ("germany", "ChIJa76xwh5ymkcRW-e3tIrhADA"),
    ("allemagne", "ChIJa76xwh5ymkcRW-e3tIrhADA"),
    ("united kingdom", "ChIJqZHHQhE7WgIReiWIMkOg-MQ"),
    ("uk", "ChIJqZHHQhE7WgIReiWIMkOg-MQ"),
    ("royaume-uni", "ChIJqZHHQhE7WgIReiWIMkOg-MQ"),
    ("spain", "ChIJi7xhMnjjQgwR7KNoB5Qs7KY"),
    ("espagne", "ChIJi7xhMnjjQgwR7KNoB5Qs7KY"),
    ("italy", "ChIJA9KNRIL-1BIRb15jJFxPAQ0"),
    ("italie", "ChIJA9KNRIL-1BIRb15jJFxPAQ0"),
    ("netherlands", "ChIJu-SH28MJxkcRnwq9_851obM"),
    ("belgium", "ChIJl5fz7WR9wUcR4fvh6log5dc"),
    ("belgique", "ChIJl5fz7WR9wUcR4fvh6log5dc"),
    ("switzerland", "ChIJYW1Zb-9kjEcRFXvLDxG1Vlw"),
    ("suisse", "ChIJYW1Zb-9kjEcRFXvLDxG1Vlw"),
    ("sweden", "ChIJ8fA1bTmyXEYRYm-tjaLruCI"),
    ("norway", "ChIJv-VNj0VoEkYRK9BxxkR3JEY"),
    ("denmark", "ChIJ-1-e7-1lS0YRzE5CH7fGJgQ"),
    ("finland", "ChIJ3fYyS9_KgUYREKh1PNZGAQA"),
    ("austria", "ChIJfyqdJZsHbUcRr19nl14GhtA"),
    ("ireland", "ChIJj4MfVq-JYEgR5UdeZUQhGWk"),
    ("portugal", "ChIJ1SZCvy0kMgsRQfBOHAlLuB0"),
    ("poland", "ChIJuwtkpGSZAEcR6lXMScpzdQk"),
    // North America
    ("united states", "ChIJCzYy5IS16lQRQrfeQ5K5Oxw"),
    ("usa", "ChIJCzYy5IS16lQRQrfeQ5K5Oxw"),
    ("us", "ChIJCzYy5IS16lQRQrfeQ5K5Oxw"),
    ("états-unis", "ChIJCzYy5IS16lQRQrfeQ5K5Oxw"),
    ("canada", "ChIJ2WrMN9MDDUsRpY9Dll18Wo4"),
    ("mexico", "ChIJU1NoiDs6BIQREZgJa760ZO0"),
    // Rest of world
    ("australia", "ChIJ38WHZwf9KysRUhNblaFnglM"),
    ("brazil", "ChIJzyjM68dCnAAR_gKgVYIhKQM"),
    ("india", "ChIJkbeSa_BfYzARphNChaFPjNc"),
    ("japan", "ChIJLxl_1w9OZzQRRFJmfNR1QvU"),
    ("singapore", "ChIJdZOLiiMR2jERxPWrUs9peIg"),
    ("israel", "ChIJi8mnMiRJABURuiw1EyBCa2o"),
    ("uae", "ChIJvRKrsd9IXj4RpwoIwFYv0zM"),
    ("south africa", "ChIJGbV4-al-lR4RNIuFKk6RcOc"),
];

/// Resolve a single human-readable location name.
///
/// The returned label keeps the caller's spelling.
pub fn resolve_location(name: &str) -> Option<Place> {
    let key = name.trim().to_lowercase();
    PLACE_IDS
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, place_id)| Place {
            place_id: (*place_id).to_string(),
            label: Some(name.trim().to_string()),
        })
}

/// Every name in the table, for scanning free text.
pub fn known_location_names() -> impl Iterator<Item = &'static str> {
    PLACE_IDS.iter().map(|(name, _)| *name)
}

/// Outcome of resolving a location filter for a platform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocations {
    /// Resolved places. `None` when nothing could be resolved.
    pub locations: Option<Locations>,
    /// Names that were dropped.
    pub unresolved: Vec<String>,
}

/// Turn any accepted location shape into the place-id shape.
///
/// Already-resolved shapes pass through untouched.
pub fn resolve_locations(locations: &Locations) -> ResolvedLocations {
    match locations {
        Locations::Names(names) => {
            let mut places = Vec::new();
            let mut unresolved = Vec::new();
            for name in names {
                match resolve_location(name) {
                    Some(place) => {
                        if !places.iter().any(|p: &Place| p.place_id == place.place_id) {
                            places.push(place);
                        }
                    }
                    None => unresolved.push(name.clone()),
                }
            }
            ResolvedLocations {
                locations: (!places.is_empty()).then_some(Locations::Places(places)),
                unresolved,
            }
        }
        Locations::Places(places) => ResolvedLocations {
            locations: (!places.is_empty()).then(|| Locations::Places(places.clone())),
            unresolved: Vec::new(),
        },
        Locations::Scoped(ScopedPlaces { include, exclude }) => ResolvedLocations {
            locations: (!include.is_empty() || !exclude.is_empty()).then(|| {
                Locations::Scoped(ScopedPlaces {
                    include: include.clone(),
                    exclude: exclude.clone(),
                })
            }),
            unresolved: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_case_insensitive_and_keeps_label() {
        let place = resolve_location("  France ").unwrap();
        assert_eq!(place.place_id, "ChIJMVd4MymgVA0R99lHx5Y__Ws");
        assert_eq!(place.label.as_deref(), Some("France"));
    }

    #[test]
    fn test_unknown_location() {
        assert!(resolve_location("Atlantis").is_none());
    }

    #[test]
    fn test_resolve_names_drops_unknown_and_dedups_aliases() {
        let input = Locations::Names(vec!["USA".into(), "United States".into(), "Narnia".into()]);
        let resolved = resolve_locations(&input);
        match resolved.locations {
            Some(Locations::Places(places)) => {
                assert_eq!(places.len(), 1);
                assert_eq!(places[0].label.as_deref(), Some("USA"));
            }
            other => panic!("expected places, got {other:?}"),
        }
        assert_eq!(resolved.unresolved, vec!["Narnia".to_string()]);
    }

    #[test]
    fn test_resolve_all_unknown_yields_none() {
        let resolved = resolve_locations(&Locations::Names(vec!["Narnia".into()]));
        assert!(resolved.locations.is_none());
    }

    #[test]
    fn test_places_pass_through() {
        let places = Locations::Places(vec![Place {
            place_id: "x".into(),
            label: None,
        }]);
        assert_eq!(resolve_locations(&places).locations, Some(places));
    }
}
