//! Data models representing database entities.
//!
//! This module contains the row types that map to database tables and the
//! request/response types of the HTTP API.

/// API key authentication model
pub mod api_key;
pub mod catalog;
pub mod customer;
pub mod edi;
/// Domain events published on the event bus
pub mod event;
pub mod integration;
pub mod invoice;
pub mod ledger;
pub mod matching;
pub mod punchout;
pub mod risk;
pub mod webhook;
