//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, query string)
//! 2. Calls the matching service with the authenticated business id
//! 3. Returns HTTP response (JSON, status code)

pub mod catalog;
pub mod customers;
pub mod edi;
pub mod health;
pub mod integrations;
pub mod invoices;
pub mod ledger;
pub mod procurement;
pub mod punchout;
pub mod risk;
pub mod webhooks;
