use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::model::Qcode;
use crate::payload::IdRef;

/// Publication lifecycle states known to Agenda, with their Agenda ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowState {
    ForApproval = 1,
    Published = 2,
    Spiked = 3,
    Draft = 4,
    Postponed = 5,
    Rescheduled = 6,
    Cancelled = 7,
}

/// Event occurrence status meaning "cancelled".
pub const OCCUR_STATUS_CANCELLED: &str = "eocstat:eos6";

impl WorkflowState {
    pub fn id(self) -> i64 {
        self as i64
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Some(match id {
            1 => Self::ForApproval,
            2 => Self::Published,
            3 => Self::Spiked,
            4 => Self::Draft,
            5 => Self::Postponed,
            6 => Self::Rescheduled,
            7 => Self::Cancelled,
            _ => return None,
        })
    }

    /// Cancelled wins over rescheduled, which wins over postponed; anything
    /// else counts as published.
    pub fn classify(pubstatus: Option<&str>, occur_status: Option<&Qcode>) -> Self {
        let occur_cancelled = occur_status.is_some_and(|s| s.qcode == OCCUR_STATUS_CANCELLED);
        match pubstatus {
            _ if occur_cancelled => Self::Cancelled,
            Some("cancelled") => Self::Cancelled,
            Some("rescheduled") => Self::Rescheduled,
            Some("postponed") => Self::Postponed,
            _ => Self::Published,
        }
    }
}

impl Serialize for WorkflowState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        IdRef::new(self.id()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WorkflowState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = IdRef::deserialize(deserializer)?;
        raw.id
            .and_then(Self::from_id)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown workflow state {:?}", raw.id)))
    }
}
