//! Mapping CMS codes and free-text place names onto Agenda ids.
//!
//! Two kinds of data live here:
//! - small static maps that never change between deployments (categories,
//!   regions, coverage roles and statuses), expressed as `match` functions;
//! - the three reference tables (`agenda_city_map`, `agenda_country_map`,
//!   `agenda_iptc_map`) behind the [`LookupTables`] trait, with an in-memory
//!   [`LookupTableSet`] loaded from JSON.
//!
//! The resolver functions at the bottom implement the fallback chains; a miss
//! never fails, it falls back to the Agenda defaults.

use std::fs;
use std::path::Path;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::{Address, Subject};
use crate::payload::{DEFAULT_CITY, DEFAULT_COUNTRY, DEFAULT_REGION};

/// Agenda category for a CMS calendar code (lower case).
pub fn category_id(calendar: &str) -> Option<i64> {
    Some(match calendar {
        "courts" => 1,
        "entertainment" => 2,
        "finance" => 3,
        "national" => 4,
        "sport" => 5,
        "world" => 6,
        "politics" => 9,
        "holidays" => 10,
        "ann" => 11,
        _ => return None,
    })
}

/// Agenda region for a state or country name or abbreviation (lower case).
pub fn region_id(name: &str) -> Option<i64> {
    Some(match name {
        "aus" | "australia" => 1,
        "act" | "australian capital territory" => 2,
        "nsw" | "new south wales" => 3,
        "vic" | "victoria" => 4,
        "sa" | "south australia" => 5,
        "wa" | "western australia" => 6,
        "nt" | "northern territory" => 7,
        "qld" | "queensland" => 8,
        "tas" | "tasmania" => 9,
        "nz" | "new zealand" => 10,
        "oth" | "world" => 11,
        _ => return None,
    })
}

/// Agenda region for a CMS place code (upper case).
pub fn place_region_id(place: &str) -> Option<i64> {
    Some(match place {
        "FED" => 1,
        "ACT" => 2,
        "NSW" => 3,
        "VIC" => 4,
        "SA" => 5,
        "WA" => 6,
        "NT" => 7,
        "QLD" => 8,
        "TAS" => 9,
        "NZ" => 10,
        "AFR" | "ASIA" | "CAN" | "CHN" | "CIS" | "EUR" | "IRE" | "JPN" | "MID" | "PAC" | "SAM"
        | "UK" | "US" => 11,
        _ => return None,
    })
}

/// Capital city for a CMS place code (upper case); used when an item has a
/// place but no location.
pub fn place_city_id(place: &str) -> Option<i64> {
    Some(match place {
        "QLD" => 50,
        "SA" => 41,
        "ACT" => 59,
        "NT" => 62,
        "TAS" => 76,
        "VIC" => 87,
        "WA" => 95,
        "NSW" => 106,
        _ => return None,
    })
}

/// Agenda role for a coverage content type.
pub fn coverage_role_id(content_type: &str) -> Option<i64> {
    Some(match content_type {
        "text" => 1,
        "picture" => 2,
        "video" | "live_video" => 3,
        "graphic" => 5,
        _ => return None,
    })
}

/// Agenda coverage status for a news coverage status qcode.
pub fn coverage_status_id(status: &str) -> Option<i64> {
    Some(match status {
        "ncostat:int" => 1,
        "ncostat:notdec" | "ncostat:onreq" => 2,
        "ncostat:notint" => 3,
        _ => return None,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityMapEntry {
    pub agenda_id: i64,
    pub country_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryMapEntry {
    pub agenda_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IptcMapEntry {
    pub agenda_id: i64,
    pub iptc_code: String,
}

/// Read-only reference tables mapping names and codes to Agenda ids.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait LookupTables: Send + Sync {
    /// City within the given Agenda country whose name matches.
    fn city(&self, country_id: i64, name: &str) -> Option<i64>;

    /// Country by (lower case) name.
    fn country(&self, name: &str) -> Option<i64>;

    /// Agenda topic for an IPTC media topic code.
    fn iptc(&self, code: &str) -> Option<i64>;
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("failed to read lookup tables from {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse lookup tables: {0}")]
    Parse(#[from] serde_json::Error),
}

/// In-memory lookup tables, as exported from the three CMS resources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookupTableSet {
    #[serde(default)]
    pub cities: Vec<CityMapEntry>,
    #[serde(default)]
    pub countries: Vec<CountryMapEntry>,
    #[serde(default)]
    pub iptc: Vec<IptcMapEntry>,
}

impl LookupTableSet {
    pub fn from_json(raw: &str) -> Result<Self, LookupError> {
        let tables: Self = serde_json::from_str(raw)?;
        info!(
            cities = tables.cities.len(),
            countries = tables.countries.len(),
            iptc = tables.iptc.len(),
            "Loaded lookup tables"
        );
        Ok(tables)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LookupError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| LookupError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }
}

impl LookupTables for LookupTableSet {
    fn city(&self, country_id: i64, name: &str) -> Option<i64> {
        self.cities
            .iter()
            .find(|c| c.country_id == country_id && c.name.eq_ignore_ascii_case(name))
            .map(|c| c.agenda_id)
    }

    fn country(&self, name: &str) -> Option<i64> {
        self.countries
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .map(|c| c.agenda_id)
    }

    fn iptc(&self, code: &str) -> Option<i64> {
        self.iptc
            .iter()
            .find(|e| e.iptc_code == code)
            .map(|e| e.agenda_id)
    }
}

/// Agenda country for a CMS country name, defaulting to Australia.
pub fn resolve_country<L: LookupTables + ?Sized>(tables: &L, country: &str) -> i64 {
    tables
        .country(&country.to_lowercase())
        .unwrap_or(DEFAULT_COUNTRY)
}

/// Agenda city for an address: tried by locality, then area, then the address
/// name, all within `country_id`; defaults to Sydney.
pub fn resolve_city<L: LookupTables + ?Sized>(
    tables: &L,
    address: &Address,
    country_id: i64,
) -> i64 {
    let candidates = [&address.locality, &address.area, &address.name];
    for name in candidates.into_iter().map(|n| n.as_deref().unwrap_or("")) {
        if let Some(id) = tables.city(country_id, name) {
            debug!(country_id, city_name = name, city_id = id, "Matched city");
            return id;
        }
    }
    DEFAULT_CITY
}

/// Australian region for an address: locality first (seeded locations carry
/// the state there), then the geocoded state; defaults to NSW.
pub fn resolve_region(address: &Address) -> i64 {
    address
        .locality
        .as_deref()
        .and_then(|l| region_id(&l.to_lowercase()))
        .or_else(|| {
            address
                .nominatim_state()
                .and_then(|s| region_id(&s.to_lowercase()))
        })
        .unwrap_or(DEFAULT_REGION)
}

/// Agenda's IPTC table has no leading zeros.
pub fn strip_leading_zero(code: &str) -> &str {
    code.strip_prefix('0').unwrap_or(code)
}

/// Agenda topic for a subject, falling back to its parent topic.
pub fn resolve_topic<L: LookupTables + ?Sized>(tables: &L, subject: &Subject) -> Option<i64> {
    tables
        .iptc(strip_leading_zero(&subject.qcode))
        .or_else(|| {
            subject
                .parent
                .as_deref()
                .filter(|p| !p.is_empty())
                .and_then(|p| tables.iptc(strip_leading_zero(p)))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExternalGeo, NominatimAddress, NominatimResult};

    fn tables() -> LookupTableSet {
        LookupTableSet::from_json(
            r#"{
                "cities": [
                    {"agenda_id": 87, "country_id": 16, "name": "Melbourne"},
                    {"agenda_id": 300, "country_id": 40, "name": "Auckland"},
                    {"agenda_id": 301, "country_id": 40, "name": "Parnell"}
                ],
                "countries": [{"agenda_id": 40, "name": "new zealand"}],
                "iptc": [
                    {"agenda_id": 7, "iptc_code": "1000000"},
                    {"agenda_id": 8, "iptc_code": "15000000"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn static_maps() {
        assert_eq!(category_id("sport"), Some(5));
        assert_eq!(category_id("gardening"), None);
        assert_eq!(region_id("queensland"), Some(8));
        assert_eq!(place_region_id("UK"), Some(11));
        assert_eq!(place_city_id("UK"), None);
        assert_eq!(coverage_role_id("live_video"), Some(3));
        assert_eq!(coverage_status_id("ncostat:onreq"), Some(2));
    }

    #[test]
    fn country_falls_back_to_australia() {
        let t = tables();
        assert_eq!(resolve_country(&t, "New Zealand"), 40);
        assert_eq!(resolve_country(&t, "Atlantis"), DEFAULT_COUNTRY);
    }

    #[test]
    fn city_chain_locality_area_name() {
        let t = tables();
        let by_area = Address {
            locality: Some("Nowhere".into()),
            area: Some("Parnell".into()),
            ..Default::default()
        };
        assert_eq!(resolve_city(&t, &by_area, 40), 301);

        let by_name = Address {
            name: Some("Auckland".into()),
            ..Default::default()
        };
        assert_eq!(resolve_city(&t, &by_name, 40), 300);

        // Melbourne exists, but not in New Zealand.
        let wrong_country = Address {
            locality: Some("Melbourne".into()),
            ..Default::default()
        };
        assert_eq!(resolve_city(&t, &wrong_country, 40), DEFAULT_CITY);
    }

    #[test]
    fn region_from_locality_then_geocoder() {
        let seeded = Address {
            locality: Some("VIC".into()),
            ..Default::default()
        };
        assert_eq!(resolve_region(&seeded), 4);

        let geocoded = Address {
            locality: Some("Hobart".into()),
            external: Some(ExternalGeo {
                nominatim: Some(NominatimResult {
                    address: Some(NominatimAddress {
                        state: Some("Tasmania".into()),
                    }),
                }),
            }),
            ..Default::default()
        };
        assert_eq!(resolve_region(&geocoded), 9);
        assert_eq!(resolve_region(&Address::default()), DEFAULT_REGION);
    }

    #[test]
    fn topic_strips_zero_and_falls_back_to_parent() {
        let t = tables();
        let direct = Subject {
            qcode: "01000000".into(),
            parent: None,
        };
        assert_eq!(resolve_topic(&t, &direct), Some(7));

        let via_parent = Subject {
            qcode: "15000001".into(),
            parent: Some("15000000".into()),
        };
        assert_eq!(resolve_topic(&t, &via_parent), Some(8));

        let unknown = Subject {
            qcode: "99".into(),
            parent: Some("98".into()),
        };
        assert_eq!(resolve_topic(&t, &unknown), None);
    }
}
