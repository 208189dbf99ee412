//! Row structs and insert DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity matching the
//! table row and a `Serialize` + `Deserialize` create DTO. The create DTOs
//! double as event payloads, so they round-trip through JSON.

pub mod api_request;
pub mod prediction;
