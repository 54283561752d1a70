//! Thin adapters around the engine's collaborator traits: the paginated
//! submissions feed, the remote spreadsheet store, and the local xlsx export.

pub mod excel_write;
pub mod kobo;
pub mod sheets;
