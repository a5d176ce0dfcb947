#![doc = "aap-agenda-core: mapping and delivery of CMS events and planning items to Agenda."]

//! This crate holds everything needed to publish a CMS event or planning item
//! to the Agenda scheduling system, with no CLI or config-file concerns.
//!
//! - [`formatter`]: maps a record to an Agenda entry (the schema mapper).
//! - [`lookup`]: static code maps and the city/country/IPTC lookup tables.
//! - [`transmitter`]: pushes a formatted entry over HTTP and writes the Agenda
//!   id back onto the record.
//! - [`contract`]: the [`contract::RecordStore`] and [`contract::AgendaApi`]
//!   seams, with `mockall` mocks behind the `test-export-mocks` feature.
//! - [`errors`]: error types and the error-code registry.

pub mod config;
pub mod contract;
pub mod dates;
pub mod errors;
pub mod formatter;
pub mod http;
pub mod lookup;
pub mod model;
pub mod payload;
pub mod store;
pub mod transmitter;
pub mod workflow;
