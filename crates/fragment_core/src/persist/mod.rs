//! Session persistence.
//!
//! A [`ContextHistory`](crate::ContextHistory) is stored as a
//! [`SessionDocument`]: fragment records in three pools keyed by id, and
//! contexts that refer to them by id. [`SessionStore`] writes documents as
//! zstd-compressed JSON.

mod dto;
mod mapper;
mod store;

pub use dto::{
    ChatMessageRecord, CodeUnitRecord, CompactContextRecord, FragmentPools, FrozenRecord, ProjectFileRecord,
    ReferencedRecord, SessionDocument, TaskEntryRecord, TaskRecord, VirtualRecord, SESSION_DOCUMENT_VERSION,
};
pub use mapper::{from_document, to_document};
pub use store::SessionStore;
