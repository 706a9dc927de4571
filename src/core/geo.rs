use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::participant::Country;

/// Country/state/city reference data compiled into the binary.
const BUNDLED_DATASET: &str = include_str!("../../data/geo.json");

static BUNDLED: OnceLock<GeoData> = OnceLock::new();

/// A single city with its coordinates
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct City {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// A first-level subdivision of a country
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub iso_code: String,
    pub name: String,

    #[serde(default, skip_serializing)]
    pub cities: Vec<City>,
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GeoCountry {
    /// ISO 3166-1 alpha-2 code
    pub iso_code: String,
    pub name: String,
    pub flag: String,

    /// International dialing prefix including the leading `+`
    pub calling_code: Option<String>,

    #[serde(default, skip_serializing)]
    pub states: Vec<State>,
}

impl GeoCountry {
    pub fn as_country(&self) -> Country {
        Country {
            name: self.name.clone(),
            code: self.iso_code.clone(),
            flag: self.flag.clone(),
        }
    }
}

/// Read-only geographic reference tables.
///
/// Lookups with an unknown code return an empty slice, never an error.
#[derive(Deserialize, Debug)]
pub struct GeoData {
    countries: Vec<GeoCountry>,

    /// Selectable origins that are not ISO countries (e.g. Scotland)
    #[serde(default)]
    nationalities: Vec<Country>,
}

impl GeoData {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The bundled dataset, parsed on first use and shared afterwards.
    pub fn bundled() -> &'static GeoData {
        BUNDLED.get_or_init(|| {
            log::debug!("Loading bundled geo dataset");
            GeoData::from_json(BUNDLED_DATASET).expect("Bundled geo dataset is malformed")
        })
    }

    pub fn countries(&self) -> &[GeoCountry] {
        &self.countries
    }

    pub fn nationalities(&self) -> &[Country] {
        &self.nationalities
    }

    pub fn country(&self, iso_code: &str) -> Option<&GeoCountry> {
        let iso_code = iso_code.trim();
        self.countries
            .iter()
            .find(|c| c.iso_code.eq_ignore_ascii_case(iso_code))
    }

    pub fn states_of(&self, country_code: &str) -> &[State] {
        self.country(country_code)
            .map(|c| c.states.as_slice())
            .unwrap_or(&[])
    }

    pub fn state(&self, country_code: &str, state_code: &str) -> Option<&State> {
        self.states_of(country_code)
            .iter()
            .find(|s| s.iso_code.eq_ignore_ascii_case(state_code.trim()))
    }

    pub fn cities_of(&self, country_code: &str, state_code: &str) -> &[City] {
        self.state(country_code, state_code)
            .map(|s| s.cities.as_slice())
            .unwrap_or(&[])
    }

    pub fn state_name(&self, country_code: &str, state_code: &str) -> Option<&str> {
        self.state(country_code, state_code).map(|s| s.name.as_str())
    }

    /// Case-insensitive search for a city in any subdivision of a country.
    pub fn find_city(&self, country_code: &str, city: &str) -> Option<&City> {
        let city = city.trim().to_lowercase();
        self.states_of(country_code)
            .iter()
            .flat_map(|s| s.cities.iter())
            .find(|c| c.name.to_lowercase() == city)
    }

    pub fn calling_code(&self, iso_code: &str) -> Option<&str> {
        self.country(iso_code)
            .and_then(|c| c.calling_code.as_deref())
    }

    /// Returns the ISO code whose calling code is exactly the typed prefix.
    ///
    /// Only inputs starting with `+` are considered.
    pub fn detect_calling_code(&self, input: &str) -> Option<&str> {
        if !input.starts_with('+') {
            return None;
        }

        let input = input.trim();
        self.countries
            .iter()
            .find(|c| c.calling_code.as_deref() == Some(input))
            .map(|c| c.iso_code.as_str())
    }

    /// Countries whose name or calling code contains the query.
    pub fn search_calling_codes(&self, query: &str) -> Vec<&GeoCountry> {
        let query = query.replace('+', "").to_lowercase();
        self.countries
            .iter()
            .filter(|c| {
                let code = c.calling_code.as_deref().unwrap_or("");
                query.is_empty() || c.name.to_lowercase().contains(&query) || code.contains(&query)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::GeoData;

    #[test]
    fn test_bundled_dataset() {
        let geo = GeoData::bundled();
        assert!(geo.countries().len() > 20);
        assert!(std::ptr::eq(geo, GeoData::bundled()));

        for country in geo.countries() {
            assert_eq!(country.iso_code.len(), 2, "{}", country.name);
            assert!(country.calling_code.as_deref().unwrap_or("+").starts_with('+'));
        }
    }

    #[test]
    fn test_unknown_codes_are_empty() {
        let geo = GeoData::bundled();

        assert!(geo.states_of("XX").is_empty());
        assert!(geo.states_of("").is_empty());
        assert!(geo.cities_of("DE", "XX").is_empty());
        assert!(geo.cities_of("XX", "BY").is_empty());

        // Monaco carries no subdivisions
        assert!(geo.country("MC").is_some());
        assert!(geo.states_of("MC").is_empty());
        assert!(geo.cities_of("MC", "").is_empty());

        for country in geo.countries() {
            for state in geo.states_of(&country.iso_code) {
                let _ = geo.cities_of(&country.iso_code, &state.iso_code);
            }
            assert!(geo.cities_of(&country.iso_code, "nowhere").is_empty());
        }
    }

    #[test]
    fn test_cascading_lookups() {
        let geo = GeoData::bundled();

        let states = geo.states_of("de");
        assert_eq!(states.len(), 16);
        assert_eq!(geo.state_name("DE", "BY"), Some("Bayern"));

        let cities = geo.cities_of("DE", "BY");
        assert_eq!(cities[0].name, "München");
        assert!(cities.iter().any(|c| c.name == "Nürnberg"));

        let koeln = geo.find_city("DE", "köln").unwrap();
        assert!((koeln.lat - 50.9375).abs() < 0.01);
        assert!(geo.find_city("FR", "Köln").is_none());
    }

    #[test]
    fn test_calling_codes() {
        let geo = GeoData::bundled();

        assert_eq!(geo.calling_code("DE"), Some("+49"));
        assert_eq!(geo.calling_code("ZZ"), None);

        assert_eq!(geo.detect_calling_code("+49"), Some("DE"));
        assert_eq!(geo.detect_calling_code("+49 "), Some("DE"));
        assert_eq!(geo.detect_calling_code("+4"), None);
        assert_eq!(geo.detect_calling_code("49"), None);

        let found = geo.search_calling_codes("+351");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].iso_code, "PT");

        let by_name = geo.search_calling_codes("germ");
        assert_eq!(by_name[0].iso_code, "DE");

        assert_eq!(geo.search_calling_codes("").len(), geo.countries().len());
    }
}
