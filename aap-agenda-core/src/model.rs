//! Source records as the CMS stores them.
//!
//! Only the fields the Agenda formatter reads are modelled; everything else in
//! the stored document is ignored on deserialisation. Records are owned by the
//! CMS and treated as read-only here, except for the `unique_id` write-back
//! performed through [`crate::contract::RecordStore::set_unique_id`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A publishable item. Anything that is not an event or a planning item
/// deserialises to [`Item::Other`] and is rejected by the formatter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Item {
    Event(Event),
    Planning(Planning),
    #[serde(other)]
    Other,
}

impl Item {
    /// The CMS `type` discriminator.
    pub fn kind(&self) -> &'static str {
        match self {
            Item::Event(_) => "event",
            Item::Planning(_) => "planning",
            Item::Other => "other",
        }
    }
}

/// A qualified code (`qcode`) with an optional display name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Qcode {
    #[serde(default)]
    pub qcode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Subject codes are IPTC media topics; `parent` is the broader topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(default)]
    pub qcode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDates {
    #[serde(default, with = "cms_datetime")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, with = "cms_datetime")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tz: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub definition_short: Option<String>,
    #[serde(default)]
    pub definition_long: Option<String>,
    #[serde(default)]
    pub internal_note: Option<String>,
    #[serde(default)]
    pub dates: Option<EventDates>,
    #[serde(default)]
    pub location: Vec<Qcode>,
    #[serde(default)]
    pub place: Vec<Qcode>,
    #[serde(default)]
    pub calendars: Vec<Qcode>,
    #[serde(default)]
    pub subject: Vec<Subject>,
    #[serde(default)]
    pub pubstatus: Option<String>,
    #[serde(default)]
    pub occur_status: Option<Qcode>,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub version_creator: Option<String>,
    #[serde(default)]
    pub original_creator: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoveragePlanning {
    #[serde(default)]
    pub g2_content_type: Option<String>,
    #[serde(default, with = "cms_datetime")]
    pub scheduled: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    #[serde(default)]
    pub planning: Option<CoveragePlanning>,
    #[serde(default)]
    pub news_coverage_status: Option<Qcode>,
}

impl Coverage {
    pub fn content_type(&self) -> &str {
        self.planning
            .as_ref()
            .and_then(|p| p.g2_content_type.as_deref())
            .unwrap_or("text")
    }

    pub fn scheduled(&self) -> Option<DateTime<Utc>> {
        self.planning.as_ref().and_then(|p| p.scheduled)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Planning {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub slugline: Option<String>,
    #[serde(default)]
    pub description_text: Option<String>,
    #[serde(default)]
    pub internal_note: Option<String>,
    #[serde(default, with = "cms_datetime")]
    pub planning_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub coverages: Vec<Coverage>,
    #[serde(default)]
    pub place: Vec<Qcode>,
    #[serde(default)]
    pub event_item: Option<String>,
    #[serde(default)]
    pub pubstatus: Option<String>,
    #[serde(default)]
    pub occur_status: Option<Qcode>,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub version_creator: Option<String>,
    #[serde(default)]
    pub original_creator: Option<String>,
}

/// Nominatim geocoder response attached to a location, when available.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalGeo {
    #[serde(default)]
    pub nominatim: Option<NominatimResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NominatimResult {
    #[serde(default)]
    pub address: Option<NominatimAddress>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NominatimAddress {
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub external: Option<ExternalGeo>,
}

impl Address {
    /// State reported by the geocoder, if the location was geocoded.
    pub fn nominatim_state(&self) -> Option<&str> {
        self.external
            .as_ref()?
            .nominatim
            .as_ref()?
            .address
            .as_ref()?
            .state
            .as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub guid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Address,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// The CMS writes datetimes either as RFC 3339 or with a colon-less offset
/// (`2016-10-31T13:00:00+0000`). Both are accepted; output is RFC 3339.
pub mod cms_datetime {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z"))
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    }

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) => parse(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid datetime: {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn item_dispatches_on_type() {
        let event: Item = serde_json::from_value(json!({"type": "event", "_id": "e1"})).unwrap();
        assert_eq!(event.kind(), "event");

        let text: Item = serde_json::from_value(json!({"type": "text", "_id": "t1"})).unwrap();
        assert!(matches!(text, Item::Other));
    }

    #[test]
    fn accepts_colonless_utc_offset() {
        let dates: EventDates = serde_json::from_value(json!({
            "start": "2016-10-31T13:00:00+0000",
            "end": "2016-10-31T14:00:00Z",
            "tz": "Australia/Sydney"
        }))
        .unwrap();
        assert_eq!(dates.start.unwrap().to_rfc3339(), "2016-10-31T13:00:00+00:00");
        assert!(dates.end.is_some());
    }

    #[test]
    fn nominatim_state_is_optional() {
        let loc: Location = serde_json::from_value(json!({
            "guid": "l1",
            "address": {"external": {"nominatim": {"address": {"state": "Victoria"}}}}
        }))
        .unwrap();
        assert_eq!(loc.address.nominatim_state(), Some("Victoria"));
        assert_eq!(Address::default().nominatim_state(), None);
    }
}
