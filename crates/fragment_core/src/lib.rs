//! Fragment Core Library
//!
//! The context model of a coding assistant:
//! - A closed taxonomy of context fragments (files, analysis results, pastes, conversations)
//! - Stable ids: allocated for live views, content hashes for fixed content
//! - Frozen snapshots, interned per session
//! - Reconstruction of live fragments from snapshots
//! - Identity-preserving session persistence
//!
//! # Quick Start
//!
//! ```
//! use fragment_core::{freeze, ContextFragment, ContextServices, Fragment, ProjectFile, ProjectPathFragment};
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! std::fs::write(tmp.path().join("main.rs"), "fn main() {}").unwrap();
//! let services = ContextServices::for_directory(tmp.path());
//!
//! // A live view of a file
//! let file = ProjectFile::new(tmp.path(), "main.rs");
//! let live = ContextFragment::from(ProjectPathFragment::new(file, &services));
//!
//! // Capture its content now
//! let snapshot = freeze(&live, &services).unwrap();
//! assert_eq!(snapshot.text().unwrap(), "fn main() {}");
//! ```
//!
//! # Features
//!
//! ## Interning
//!
//! Freezing equal content twice yields the same snapshot:
//!
//! ```
//! use fragment_core::{freeze, ContextFragment, ContextServices, ProjectFile, ProjectPathFragment};
//! use std::sync::Arc;
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! std::fs::write(tmp.path().join("lib.rs"), "pub fn f() {}").unwrap();
//! let services = ContextServices::for_directory(tmp.path());
//! let file = ProjectFile::new(tmp.path(), "lib.rs");
//!
//! let a = ContextFragment::from(ProjectPathFragment::new(file.clone(), &services));
//! let b = ContextFragment::from(ProjectPathFragment::new(file, &services));
//! assert!(Arc::ptr_eq(&freeze(&a, &services).unwrap(), &freeze(&b, &services).unwrap()));
//! ```
//!
//! ## Sessions
//!
//! Histories are saved as compressed documents and reload with shared
//! fragments still shared:
//!
//! ```
//! use fragment_core::{Context, ContextFragment, ContextHistory, ContextServices, ProjectFile,
//!                     ProjectPathFragment, SessionStore};
//! use std::sync::Arc;
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! std::fs::write(tmp.path().join("a.rs"), "struct A;").unwrap();
//! let services = ContextServices::for_directory(tmp.path());
//! let file = ContextFragment::from(ProjectPathFragment::new(ProjectFile::new(tmp.path(), "a.rs"), &services)).shared();
//!
//! let mut history = ContextHistory::new();
//! history.push(Context::new("added a.rs").with_editable(file.clone()).with_readonly(file));
//!
//! let store = SessionStore::new(services.config());
//! let path = tmp.path().join("session.ctx");
//! store.save(&path, &history, &services).unwrap();
//!
//! let loaded = store.load(&path, &services).unwrap();
//! let ctx = &loaded.contexts()[0];
//! assert!(Arc::ptr_eq(&ctx.editable[0], &ctx.readonly[0]));
//! ```

mod config;
mod context;
mod deferred;
mod error;
mod files;
pub mod fragment;
mod frozen;
mod hasher;
mod ids;
pub mod persist;
mod services;
mod symbols;

pub use config::{FragmentConfig, FreezeConfig, StorageConfig};
pub use context::{Context, ContextHistory};
pub use deferred::{Completer, Deferred, DeferredError};
pub use error::{FragmentError, Result};
pub use files::{image_media_type, looks_like_image, syntax, ExternalFile, FileRef, ProjectFile};
pub use fragment::{
    format_messages, unfreeze, CallGraphFragment, ChatMessage, ChatRole, ContextFragment, ExternalPathFragment,
    Fragment, FragmentKind, FragmentRef, GitFileFragment, HistoryFragment, ImageFileFragment, PasteImageFragment,
    PasteTextFragment, ProjectPathFragment, SearchFragment, SkeletonFragment, StacktraceFragment, StringFragment,
    SummaryType, TaskEntry, TaskEntryContent, TaskFragment, UsageFragment, IMAGE_OUT_OF_BAND, PASTE_DESCRIPTION_ERROR,
    PASTE_DESCRIPTION_TIMED_OUT, PASTE_SUMMARIZING, PASTE_SUMMARY_FAILED,
};
pub use frozen::{freeze, meta, FrozenFragment, FrozenParts, FrozenPayload, InternPool, FROZEN_IMAGE_TEXT};
pub use hasher::{ContentHasher, HashFields, PayloadRef};
pub use ids::{ContentHash, FragmentId, IdAllocator};
pub use persist::{SessionDocument, SessionStore};
pub use services::{
    Analysis, CancelFlag, CodeIntelligence, ContextServices, FileSystem, LocalFileSystem, LocalProject,
    NotReadyAnalyzer, Project, VersionControl,
};
pub use symbols::{CallDirection, CallSite, CodeUnit, CodeUnitKind, UsageHit};
