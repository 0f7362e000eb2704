//! DSvn Core Library
//!
//! Core functionality for DSvn including:
//! - Object model (Blob, Tree, Commit)
//! - Storage abstraction (hot/warm/cold tiers)
//! - Repository operations
//! - In-memory repository for MVP
//! - Persistent repository using Fjall LSM-tree
//! - Path-based authorization (SVN-style authz rules)

pub mod authz;
pub mod object;
pub mod storage;
pub mod repository;
pub mod persistent;


pub use authz::{Authz, AuthzError, Rights};
pub use object::{Blob, Commit, Object, ObjectId, ObjectKind, Tree, TreeEntry};
pub use repository::Repository;
pub use persistent::{PersistentRepository, RepositoryMetadata};
pub use storage::{HotStore, ObjectStore, Result, StorageError, TieredStore, WarmStore};
