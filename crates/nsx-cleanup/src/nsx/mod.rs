//! NSX manager collaborators: object model, client seam and error classification

pub mod client;
pub mod error;
pub mod policy;

pub use client::{NsxClient, paging_update};
pub use error::{NsxApiError, classify_anyhow_error, classify_status, ignore_not_found};
pub use policy::PolicyObject;
