//! Thin client for the CRM's webservice API: session handshake, SOQL-like
//! queries, duplicate lookup, and record create/update. The allocator core
//! consumes it through the `DuplicateLookup`/`LeadWriter` trait seams.

pub mod client;
pub mod collaborators;
pub mod rows;

pub use client::{CrmError, CrmSession, LookupKind, VtigerClient};
pub use rows::{active_advisors, assigned_today_counts, AdvisorRow, OwnerCountRow};
