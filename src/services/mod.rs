//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle database transactions, validation, and complex operations.
//! Pure engines (EDI codec, three-way match, guided buying, risk scoring)
//! never touch the database and are tested without one.

pub mod catalog_service;
pub mod customer_service;
pub mod edi;
pub mod edi_service;
pub mod event_bus;
pub mod guided_buying;
pub mod integration_service;
pub mod invoice_service;
pub mod ledger_service;
pub mod matching_service;
pub mod punchout_service;
pub mod risk_service;
pub mod sync_job_service;
pub mod webhook_service;
