use std::collections::{BTreeMap, HashMap};

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;

use super::{geo::GeoData, normalize::search_key, participant::Participant};

const BRAND_GOLD: &str = "#BB9446";
const BRAND_GOLD_DARK: &str = "#9C7B3A";

/// Up to two uppercase initials, "LS" when the name has none
pub fn initials(name: &str) -> String {
    let initials: String = name
        .split(' ')
        .filter_map(|word| word.chars().next())
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_uppercase()
        .chars()
        .take(2)
        .collect();

    if initials.is_empty() {
        "LS".to_string()
    } else {
        initials
    }
}

/// Monogram image shown for participants without a photo, as a data URI.
pub fn identity_placeholder(name: &str) -> String {
    let svg = format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 100"><defs><linearGradient id="goldGradient" x1="0%" y1="0%" x2="100%" y2="100%"><stop offset="0%" style="stop-color:{gold};stop-opacity:1" /><stop offset="100%" style="stop-color:{dark};stop-opacity:1" /></linearGradient></defs><rect width="100" height="100" fill="#0A0A0A"/><circle cx="50" cy="50" r="38" fill="none" stroke="url(#goldGradient)" stroke-width="1.5" /><text x="50%" y="50%" fill="url(#goldGradient)" font-family="'Bodoni Moda', serif" font-size="32" text-anchor="middle" dominant-baseline="central" font-style="italic">{initials}</text></svg>"##,
        gold = BRAND_GOLD,
        dark = BRAND_GOLD_DARK,
        initials = initials(name),
    );
    format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg))
}

pub fn display_photo(p: &Participant) -> String {
    if p.photo_url.trim().is_empty() {
        identity_placeholder(&p.name)
    } else {
        p.photo_url.clone()
    }
}

fn sort_key(p: &Participant) -> String {
    if p.search_name.is_empty() {
        search_key(&p.name)
    } else {
        p.search_name.clone()
    }
}

/// Participants bucketed by the first letter of their search name
pub fn letter_groups(participants: &[Participant]) -> BTreeMap<String, Vec<&Participant>> {
    let mut groups: BTreeMap<String, Vec<&Participant>> = BTreeMap::new();
    for p in participants {
        let letter = sort_key(p)
            .chars()
            .next()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "#".to_string());
        groups.entry(letter).or_default().push(p);
    }
    groups
}

pub fn search<'a>(
    participants: impl IntoIterator<Item = &'a Participant>,
    query: &str,
) -> Vec<&'a Participant> {
    let query = search_key(query);
    if query.is_empty() {
        return participants.into_iter().collect();
    }

    participants
        .into_iter()
        .filter(|p| {
            let city = p.city.as_deref().map(search_key).unwrap_or_default();
            let country = p
                .country
                .as_ref()
                .map(|c| search_key(&c.name))
                .unwrap_or_default();

            sort_key(p).contains(&query)
                || p.search_org.contains(&query)
                || city.contains(&query)
                || country.contains(&query)
        })
        .collect()
}

pub fn filter_city<'a>(
    participants: impl IntoIterator<Item = &'a Participant>,
    city: &str,
) -> Vec<&'a Participant> {
    let city = city.trim().to_lowercase();
    participants
        .into_iter()
        .filter(|p| {
            p.city
                .as_deref()
                .map(|c| c.trim().to_lowercase() == city)
                .unwrap_or(false)
        })
        .collect()
}

/// All participants of one city on the map
#[derive(Serialize, Debug)]
pub struct MapMarker<'a> {
    pub city: String,
    pub lat: f64,
    pub lon: f64,
    pub participants: Vec<&'a Participant>,
}

/// Groups participants whose city can be located into one marker per city.
/// Markers are ordered by first appearance.
pub fn map_markers<'a>(participants: &'a [Participant], geo: &GeoData) -> Vec<MapMarker<'a>> {
    let mut markers: Vec<MapMarker<'a>> = vec![];
    let mut by_city: HashMap<String, usize> = HashMap::new();

    for p in participants {
        let (Some(city), Some(country)) = (p.city.as_deref(), p.country.as_ref()) else {
            continue;
        };
        let key = city.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }

        if let Some(&index) = by_city.get(&key) {
            markers[index].participants.push(p);
            continue;
        }

        match geo.find_city(&country.code, city) {
            Some(location) => {
                by_city.insert(key, markers.len());
                markers.push(MapMarker {
                    city: city.trim().to_string(),
                    lat: location.lat,
                    lon: location.lon,
                    participants: vec![p],
                });
            }
            None => log::debug!("No coordinates for {} in {}", city, country.code),
        }
    }

    markers
}
