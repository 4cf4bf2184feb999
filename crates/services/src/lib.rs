#![forbid(unsafe_code)]

pub mod admin_service;
pub mod app_services;
pub mod config;
pub mod course_service;
pub mod error;
pub mod identity;
pub mod progress;

pub use reskill_core::Clock;

pub use admin_service::{AdminProgressReport, AdminProgressService};
pub use app_services::AppServices;
pub use config::{BackendConfig, SyncConfig};
pub use course_service::CourseProgressService;
pub use error::{AdminServiceError, AppServicesError, CourseProgressError, ReconcileError};
pub use identity::IdentityProvider;
pub use progress::{DEFAULT_SLOT_KEY, ProgressStore, ReconcileOutcome};
