//! Core module - fundamental types and infrastructure

pub mod clock;
pub mod config;
pub mod entity;
pub mod error;
pub mod identity;
pub mod notify;
pub mod project;
pub mod rag;
pub mod store;
pub mod team;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, ConfigError, Settings};
pub use entity::{Entity, Priority, Severity};
pub use error::{CapaError, CapaResult, ErrorKind};
pub use identity::{EntityId, EntityPrefix, IdParseError};
pub use notify::{LogSink, Notification, NotificationSink, NullSink};
pub use project::{Project, ProjectError};
pub use rag::{Rag, RagSubject, RagSummary, RagThresholds};
pub use store::{MemoryStore, SqliteStore, Store};
pub use team::{Role, TeamMember, TeamRoster};
