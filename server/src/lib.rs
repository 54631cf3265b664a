//! Metadata search gateway — HTTP layer over `rmmgate-core`'s query engine.

pub mod routes;
pub mod types;

pub use routes::build_router;
pub use types::{error_response, AppContext, ID_FIELDS, RESOURCE_COLLECTIONS};
