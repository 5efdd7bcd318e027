//! Core domain logic for the rubric progress tracker.
//! This crate owns the objective tree, the roster and every derived percentage.

pub mod config;
pub mod db;
pub mod import;
pub mod logging;
pub mod model;
pub mod progress;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig, ImportConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::cohort::{AggregationMode, CohortGroup, Domain, DomainId, GroupId};
pub use model::objective::{LearningObjective, ObjectiveId, ParentRef};
pub use model::progress::{CompletionPercentage, ProgressRecord, ProgressStatus, ProgressSubject};
pub use model::student::{CustomProperty, Session, Student, StudentId};
pub use model::ModelValidationError;
pub use progress::{
    CohortReport, DomainReport, GroupReport, LeafLookup, LeafValues, ObjectiveIndex, ObjectiveRow,
    StudentProgress, StudentReport, StudentSummary, SubjectProgress,
};
pub use repo::cohort_repo::{CohortRepository, SqliteCohortRepository};
pub use repo::objective_repo::{ObjectiveRepository, SqliteObjectiveRepository};
pub use repo::progress_repo::{ProgressRepository, SqliteProgressRepository};
pub use repo::student_repo::{SqliteStudentRepository, StudentRepository};
pub use repo::{RepoError, RepoResult};
pub use service::import_service::{ImportError, ImportService, ImportSummary};
pub use service::objective_service::{
    ArchiveMode, NewObjective, ObjectiveService, ObjectiveServiceError,
};
pub use service::progress_service::{CohortSnapshot, ProgressService, ProgressServiceError};
pub use service::roster_service::{RosterService, RosterServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
