//! Schema mapper: CMS events and planning items to Agenda entries.
//!
//! # Flow
//! - [`can_format`] gates on format type and item type.
//! - [`AgendaFormatter::format`] picks the record to map (a planning item
//!   linked to an event is published as that event), wraps the resulting
//!   [`AgendaEntry`] in a [`PublishEnvelope`] and allocates the subscriber's
//!   publish sequence number.
//!
//! Lookup misses never fail, they fall back to the Agenda defaults. Structurally
//! broken records (no `dates` on an event, an empty subject code, a coverage
//! without a status) are reported as [`FormatError`] and abort the publish.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::contract::{RecordStore, Resource};
use crate::dates::{parse_timezone, set_dates, DEFAULT_TIMEZONE};
use crate::errors::FormatError;
use crate::lookup::{
    self, category_id, coverage_role_id, coverage_status_id, place_city_id, place_region_id,
    LookupTables,
};
use crate::model::{Coverage, Event, Item, Planning, Qcode};
use crate::payload::{
    AgendaCoverage, AgendaEntry, DisplayAddress, IdRef, PublishEnvelope, Selection, TopicRef,
    DEFAULT_CITY, DEFAULT_COUNTRY, DEFAULT_REGION, WORLD_REGION,
};
use crate::workflow::WorkflowState;

/// Format type under which subscribers select this formatter.
pub const FORMAT_TYPE: &str = "agenda_planning";

/// Agenda caps special instructions at this many characters.
const MAX_SPECIAL_INSTRUCTIONS: usize = 1000;

/// Pubstatus of a planning item whose coverages may be shown.
const PUBSTATUS_USABLE: &str = "usable";

/// One formatted item, ready for a transmitter.
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedItem {
    pub sequence_number: i64,
    pub envelope: PublishEnvelope,
}

impl FormattedItem {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.envelope)
    }
}

/// Only events and planning items, and only for the Agenda format type.
pub fn can_format(format_type: &str, item: &Item) -> bool {
    format_type == FORMAT_TYPE && matches!(item, Item::Event(_) | Item::Planning(_))
}

pub struct AgendaFormatter<'a, S: ?Sized, L: ?Sized> {
    store: &'a S,
    lookups: &'a L,
}

impl<'a, S, L> AgendaFormatter<'a, S, L>
where
    S: RecordStore + ?Sized,
    L: LookupTables + ?Sized,
{
    pub fn new(store: &'a S, lookups: &'a L) -> Self {
        Self { store, lookups }
    }

    pub async fn format(
        &self,
        item: &Item,
        subscriber: &str,
    ) -> Result<FormattedItem, FormatError> {
        let envelope = match item {
            Item::Event(event) => {
                let entry = self.format_event(event).await?;
                envelope_for_event(entry, event)
            }
            Item::Planning(planning) => match planning.event_item.as_deref() {
                Some(event_id) => {
                    let mut event = self.linked_event(planning, event_id).await?;
                    let inherited = match event.unique_id {
                        None => planning.unique_id.clone(),
                        Some(_) => None,
                    };
                    if inherited.is_some() {
                        event.unique_id = inherited.clone();
                    }
                    let entry = self.format_event(&event).await?;
                    if let Some(agenda_id) = inherited {
                        self.inherit_unique_id(event_id, &agenda_id).await?;
                    }
                    envelope_for_event(entry, &event)
                }
                None => {
                    let entry = self.format_planning(planning)?;
                    PublishEnvelope {
                        entry,
                        item_type: "planning".to_string(),
                        external_identifier: planning.id.clone(),
                        publishing_user: planning
                            .version_creator
                            .clone()
                            .or_else(|| planning.original_creator.clone()),
                    }
                }
            },
            Item::Other => return Err(FormatError::Unsupported(item.kind().to_string())),
        };

        let sequence_number = self
            .store
            .next_sequence_number(subscriber)
            .await
            .map_err(FormatError::Store)?;

        info!(
            sequence_number,
            item_type = %envelope.item_type,
            external_identifier = %envelope.external_identifier,
            workflow_state = envelope.entry.workflow_state.id(),
            "[FORMAT] Formatted item for Agenda"
        );
        Ok(FormattedItem {
            sequence_number,
            envelope,
        })
    }

    /// Fetch the event a planning item belongs to.
    async fn linked_event(
        &self,
        planning: &Planning,
        event_id: &str,
    ) -> Result<Event, FormatError> {
        self.store
            .find_event(event_id)
            .await
            .map_err(FormatError::Store)?
            .ok_or_else(|| FormatError::MissingEvent {
                planning: planning.id.clone(),
                event: event_id.to_string(),
            })
    }

    /// The event only takes the planning item's Agenda id once it has been
    /// formatted successfully.
    async fn inherit_unique_id(&self, event_id: &str, agenda_id: &str) -> Result<(), FormatError> {
        info!(event_id, agenda_id, "[FORMAT] Copying Agenda id from planning item to event");
        self.store
            .set_unique_id(Resource::Events, event_id, agenda_id)
            .await
            .map_err(FormatError::Store)
    }

    pub async fn format_event(&self, event: &Event) -> Result<AgendaEntry, FormatError> {
        let mut entry = AgendaEntry::new(
            event.name.clone(),
            event_description(event),
            WorkflowState::classify(event.pubstatus.as_deref(), event.occur_status.as_ref()),
        );
        entry.special_instructions = special_instructions(event.internal_note.as_deref());

        let dates = event.dates.as_ref().ok_or_else(|| FormatError::MissingField {
            item: event.id.clone(),
            field: "dates",
        })?;
        let tz = parse_timezone(dates.tz.as_deref().unwrap_or(DEFAULT_TIMEZONE))?;
        set_dates(&mut entry, tz, dates.start, dates.end);

        self.set_event_location(&mut entry, event).await?;
        if let Some(place) = event.place.first() {
            let place = place.qcode.to_uppercase();
            entry.region = IdRef::new(place_region_id(&place).unwrap_or(DEFAULT_REGION));
            if event.location.is_empty() {
                entry.city = IdRef::new(place_city_id(&place).unwrap_or(DEFAULT_CITY));
            }
        }

        entry.categories = categories(&event.calendars);
        entry.topics = Some(self.topics(event)?);

        let mut coverages = Vec::new();
        let plannings = self
            .store
            .plannings_for_event(&event.id)
            .await
            .map_err(FormatError::Store)?;
        for planning in plannings
            .iter()
            .filter(|p| p.pubstatus.as_deref() == Some(PUBSTATUS_USABLE))
        {
            for coverage in &planning.coverages {
                if let Some(mapped) = map_coverage(&planning.id, coverage)? {
                    coverages.push(mapped);
                }
            }
        }
        entry.coverages = Some(coverages);

        Ok(entry)
    }

    /// Region, country, city and address from the event's first location.
    /// Anything outside Australia is filed under the World region.
    async fn set_event_location(
        &self,
        entry: &mut AgendaEntry,
        event: &Event,
    ) -> Result<(), FormatError> {
        let Some(location_ref) = event.location.first() else {
            return Ok(());
        };
        let Some(location) = self
            .store
            .find_location(&location_ref.qcode)
            .await
            .map_err(FormatError::Store)?
        else {
            warn!(
                guid = %location_ref.qcode,
                "[FORMAT] Location not found, keeping default location"
            );
            return Ok(());
        };

        let address = &location.address;
        match address.country.as_deref().filter(|c| !c.is_empty()) {
            Some(country) if country != "Australia" => {
                let country_id = lookup::resolve_country(self.lookups, country);
                entry.region = IdRef::new(WORLD_REGION);
                entry.country = IdRef::new(country_id);
                entry.city = IdRef::new(lookup::resolve_city(self.lookups, address, country_id));
            }
            _ => {
                entry.country = IdRef::new(DEFAULT_COUNTRY);
                entry.region = IdRef::new(lookup::resolve_region(address));
                let city = lookup::resolve_city(self.lookups, address, DEFAULT_COUNTRY);
                entry.city = IdRef::new(city);
            }
        }
        entry.address = Some(DisplayAddress {
            display_string: location_ref.name.clone().unwrap_or_default(),
        });
        debug!(
            region = ?entry.region.id,
            country = ?entry.country.id,
            city = ?entry.city.id,
            "[FORMAT] Derived location"
        );
        Ok(())
    }

    fn topics(&self, event: &Event) -> Result<Vec<TopicRef>, FormatError> {
        let mut topics = Vec::new();
        for subject in &event.subject {
            if subject.qcode.is_empty() {
                return Err(FormatError::MissingField {
                    item: event.id.clone(),
                    field: "subject.qcode",
                });
            }
            if let Some(id) = lookup::resolve_topic(self.lookups, subject) {
                topics.push(TopicRef { topic: IdRef::new(id) });
            }
        }
        Ok(topics)
    }

    /// Planning items carry no location, so only the place code refines the
    /// defaults. Dates span the scheduled coverages, or fall back to the
    /// planning date when there are none.
    pub fn format_planning(&self, planning: &Planning) -> Result<AgendaEntry, FormatError> {
        let mut entry = AgendaEntry::new(
            planning.slugline.clone(),
            format!("<p>{}</p>", planning.description_text.as_deref().unwrap_or("")),
            WorkflowState::classify(planning.pubstatus.as_deref(), planning.occur_status.as_ref()),
        );
        entry.special_instructions = special_instructions(planning.internal_note.as_deref());

        let mut coverages = Vec::new();
        for coverage in &planning.coverages {
            if let Some(mapped) = map_coverage(&planning.id, coverage)? {
                coverages.push(mapped);
            }
        }

        let (start, end) = if planning.coverages.is_empty() {
            (planning.planning_date, planning.planning_date)
        } else {
            scheduled_range(&planning.coverages)
        };
        if !coverages.is_empty() {
            entry.coverages = Some(coverages);
        }

        set_dates(&mut entry, parse_timezone(DEFAULT_TIMEZONE)?, start, end);

        if let Some(place) = planning.place.first() {
            let place = place.qcode.to_uppercase();
            entry.region = IdRef::new(place_region_id(&place).unwrap_or(DEFAULT_REGION));
            entry.city = IdRef::new(place_city_id(&place).unwrap_or(DEFAULT_CITY));
        }

        Ok(entry)
    }
}

fn envelope_for_event(entry: AgendaEntry, event: &Event) -> PublishEnvelope {
    PublishEnvelope {
        entry,
        item_type: "event".to_string(),
        external_identifier: event.id.clone(),
        publishing_user: event
            .version_creator
            .clone()
            .or_else(|| event.original_creator.clone()),
    }
}

fn event_description(event: &Event) -> String {
    let short = event.definition_short.as_deref().unwrap_or("");
    let mut description = format!("<p>{}</p>", short.replace('\n', "<br>"));
    if let Some(long) = event.definition_long.as_deref().filter(|l| !l.is_empty()) {
        description.push_str(&format!("<p>{}</p>", long.replace('\n', "<br>")));
    }
    description
}

fn special_instructions(note: Option<&str>) -> Option<String> {
    note.map(|n| n.chars().take(MAX_SPECIAL_INSTRUCTIONS).collect())
}

fn categories(calendars: &[Qcode]) -> Vec<Selection> {
    let mapped: Vec<Selection> = calendars
        .iter()
        .filter_map(|c| category_id(&c.qcode.to_lowercase()))
        .map(Selection::selected)
        .collect();
    if mapped.is_empty() {
        vec![Selection::selected(crate::payload::DEFAULT_CATEGORY)]
    } else {
        mapped
    }
}

/// Coverages with a role or status Agenda does not know are dropped.
fn map_coverage(owner: &str, coverage: &Coverage) -> Result<Option<AgendaCoverage>, FormatError> {
    let status = coverage
        .news_coverage_status
        .as_ref()
        .ok_or_else(|| FormatError::MissingField {
            item: owner.to_string(),
            field: "news_coverage_status",
        })?;
    let role = coverage_role_id(coverage.content_type());
    let coverage_status = coverage_status_id(&status.qcode);
    match (role, coverage_status) {
        (Some(role), Some(coverage_status)) => Ok(Some(AgendaCoverage {
            role: IdRef::new(role),
            coverage_status: IdRef::new(coverage_status),
        })),
        _ => {
            debug!(
                content_type = coverage.content_type(),
                status = %status.qcode,
                "[FORMAT] Skipping unmapped coverage"
            );
            Ok(None)
        }
    }
}

fn scheduled_range(coverages: &[Coverage]) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let scheduled = coverages.iter().filter_map(Coverage::scheduled);
    (scheduled.clone().min(), scheduled.max())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MockRecordStore;
    use crate::lookup::LookupTableSet;
    use crate::model::{CoveragePlanning, EventDates};

    fn event(id: &str) -> Event {
        Event {
            id: id.to_string(),
            name: Some("Press conference".into()),
            dates: Some(EventDates {
                start: Some("2016-10-30T23:00:00Z".parse().unwrap()),
                end: Some("2016-10-31T00:00:00Z".parse().unwrap()),
                tz: Some("Australia/Sydney".into()),
            }),
            ..Default::default()
        }
    }

    fn coverage(content_type: &str, status: &str) -> Coverage {
        Coverage {
            planning: Some(CoveragePlanning {
                g2_content_type: Some(content_type.into()),
                scheduled: None,
            }),
            news_coverage_status: Some(Qcode {
                qcode: status.into(),
                name: None,
            }),
        }
    }

    #[test]
    fn can_format_only_events_and_planning() {
        let e = Item::Event(event("e1"));
        assert!(can_format(FORMAT_TYPE, &e));
        assert!(!can_format("ninjs", &e));
        assert!(!can_format(FORMAT_TYPE, &Item::Other));
    }

    #[test]
    fn description_joins_short_and_long() {
        let mut e = event("e1");
        e.definition_short = Some("line one\nline two".into());
        assert_eq!(event_description(&e), "<p>line one<br>line two</p>");
        e.definition_long = Some("more".into());
        assert_eq!(event_description(&e), "<p>line one<br>line two</p><p>more</p>");
    }

    #[test]
    fn special_instructions_are_truncated() {
        let long = "x".repeat(1500);
        assert_eq!(special_instructions(Some(&long)).unwrap().len(), 1000);
        assert_eq!(special_instructions(Some("short")).as_deref(), Some("short"));
        assert_eq!(special_instructions(None), None);
    }

    #[test]
    fn categories_default_to_national() {
        assert_eq!(categories(&[]), vec![Selection::selected(4)]);
        let calendars = vec![
            Qcode { qcode: "Sport".into(), name: None },
            Qcode { qcode: "unknown".into(), name: None },
        ];
        assert_eq!(categories(&calendars), vec![Selection::selected(5)]);
    }

    #[test]
    fn unmapped_coverages_are_dropped() {
        assert_eq!(
            map_coverage("p1", &coverage("picture", "ncostat:int")).unwrap(),
            Some(AgendaCoverage {
                role: IdRef::new(2),
                coverage_status: IdRef::new(1)
            })
        );
        assert_eq!(map_coverage("p1", &coverage("audio", "ncostat:int")).unwrap(), None);
        assert_eq!(map_coverage("p1", &coverage("text", "ncostat:maybe")).unwrap(), None);

        let no_status = Coverage {
            planning: None,
            news_coverage_status: None,
        };
        assert!(matches!(
            map_coverage("p1", &no_status),
            Err(FormatError::MissingField { field: "news_coverage_status", .. })
        ));
    }

    #[test]
    fn planning_without_coverages_uses_planning_date() {
        let store = MockRecordStore::new();
        let lookups = LookupTableSet::default();
        let formatter = AgendaFormatter::new(&store, &lookups);
        let planning = Planning {
            id: "p1".into(),
            slugline: Some("Budget".into()),
            description_text: Some("Budget day".into()),
            planning_date: Some("2017-05-09T00:00:00Z".parse().unwrap()),
            place: vec![Qcode { qcode: "vic".into(), name: None }],
            pubstatus: Some("postponed".into()),
            ..Default::default()
        };

        let entry = formatter.format_planning(&planning).unwrap();
        assert_eq!(entry.title.as_deref(), Some("Budget"));
        assert_eq!(entry.description, "<p>Budget day</p>");
        assert_eq!(entry.date_from.as_deref(), Some("2017-05-09"));
        assert_eq!(entry.time_from.as_deref(), Some("10:00"));
        assert_eq!(entry.region, IdRef::new(4));
        assert_eq!(entry.city, IdRef::new(87));
        assert_eq!(entry.country, IdRef::new(16));
        assert_eq!(entry.coverages, None);
        assert_eq!(entry.workflow_state, WorkflowState::Postponed);
    }

    #[test]
    fn planning_dates_span_scheduled_coverages() {
        let store = MockRecordStore::new();
        let lookups = LookupTableSet::default();
        let formatter = AgendaFormatter::new(&store, &lookups);
        let scheduled = |raw: &str, content_type: &str| {
            let mut c = coverage(content_type, "ncostat:int");
            c.planning.as_mut().unwrap().scheduled = Some(raw.parse().unwrap());
            c
        };
        let planning = Planning {
            id: "p1".into(),
            coverages: vec![
                scheduled("2017-05-10T02:00:00Z", "text"),
                scheduled("2017-05-09T23:00:00Z", "picture"),
                scheduled("2017-05-10T05:30:00Z", "video"),
            ],
            ..Default::default()
        };

        let entry = formatter.format_planning(&planning).unwrap();
        assert_eq!(entry.date_from.as_deref(), Some("2017-05-10"));
        assert_eq!(entry.time_from.as_deref(), Some("09:00"));
        assert_eq!(entry.time_to.as_deref(), Some("15:30"));
        assert_eq!(entry.coverages.as_ref().map(Vec::len), Some(3));
        assert_eq!(entry.categories, vec![Selection::selected(4)]);
    }
}
