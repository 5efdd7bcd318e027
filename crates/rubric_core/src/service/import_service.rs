//! CSV roster import.
//!
//! # Responsibility
//! - Map CSV columns to student fields by header name.
//! - Create students (and missing domains) through the roster service.
//!
//! # Invariants
//! - Header matching ignores case and surrounding/repeated whitespace.
//! - The name column is required; domain and session columns are optional.
//! - Names already on the active roster, or repeated in the file, are skipped.
//! - The whole file is parsed before the first write.

use crate::config::ImportConfig;
use crate::import::csv::{parse_csv, CsvError};
use crate::model::cohort::DomainId;
use crate::model::name_key;
use crate::model::student::Session;
use crate::repo::cohort_repo::CohortRepository;
use crate::repo::student_repo::StudentRepository;
use crate::service::roster_service::{RosterService, RosterServiceError};
use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ImportError {
    Io { path: PathBuf, source: std::io::Error },
    Csv(CsvError),
    /// File has no header row.
    Empty,
    /// Required column header is absent.
    MissingColumn(String),
    Roster(RosterServiceError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "failed to read `{}`: {source}", path.display()),
            Self::Csv(err) => write!(f, "{err}"),
            Self::Empty => write!(f, "csv file has no header row"),
            Self::MissingColumn(header) => write!(f, "csv is missing required column `{header}`"),
            Self::Roster(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv(err) => Some(err),
            Self::Roster(err) => Some(err),
            Self::Empty | Self::MissingColumn(_) => None,
        }
    }
}

impl From<CsvError> for ImportError {
    fn from(value: CsvError) -> Self {
        Self::Csv(value)
    }
}

impl From<RosterServiceError> for ImportError {
    fn from(value: RosterServiceError) -> Self {
        Self::Roster(value)
    }
}

/// Counts produced by one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    pub skipped_blank: usize,
    pub skipped_duplicates: usize,
    pub domains_created: usize,
    /// Rows naming a domain that neither existed nor was created.
    pub unknown_domains: usize,
    /// Rows whose session label was not recognized; imported as unassigned.
    pub unknown_sessions: usize,
}

#[derive(Debug)]
struct PlannedRow {
    name: String,
    domain: Option<String>,
    session: Session,
}

#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    name: usize,
    domain: Option<usize>,
    session: Option<usize>,
}

pub struct ImportService<S: StudentRepository, C: CohortRepository> {
    roster: RosterService<S, C>,
    config: ImportConfig,
}

impl<S: StudentRepository, C: CohortRepository> ImportService<S, C> {
    pub fn new(roster: RosterService<S, C>, config: ImportConfig) -> Self {
        Self { roster, config }
    }

    pub fn import_file(&self, path: impl AsRef<Path>) -> Result<ImportSummary, ImportError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.import_str(&text)
    }

    pub fn import_str(&self, text: &str) -> Result<ImportSummary, ImportError> {
        let rows = parse_csv(text)?;
        let mut rows = rows.into_iter();
        let header = rows.next().ok_or(ImportError::Empty)?;
        let columns = self.map_columns(&header)?;

        let mut summary = ImportSummary::default();
        let mut seen: HashSet<String> = self
            .roster
            .list_students()?
            .iter()
            .map(|student| name_key(&student.name))
            .collect();

        let mut planned = Vec::new();
        for row in rows {
            let name = cell(&row, Some(columns.name)).unwrap_or_default();
            if name.is_empty() {
                summary.skipped_blank += 1;
                continue;
            }
            if !seen.insert(name_key(&name)) {
                summary.skipped_duplicates += 1;
                continue;
            }

            let session_label = cell(&row, columns.session).unwrap_or_default();
            let session = Session::parse_label(&session_label).unwrap_or_else(|| {
                summary.unknown_sessions += 1;
                Session::Unassigned
            });
            planned.push(PlannedRow {
                name,
                domain: cell(&row, columns.domain).filter(|value| !value.is_empty()),
                session,
            });
        }

        let mut domain_ids: HashMap<String, Option<DomainId>> = HashMap::new();
        for row in planned {
            let domain_id = match &row.domain {
                Some(domain_name) => {
                    self.resolve_domain(domain_name, &mut domain_ids, &mut summary)?
                }
                None => None,
            };
            self.roster.enroll(row.name, domain_id, row.session)?;
            summary.created += 1;
        }

        info!(
            "event=csv_import module=import status=ok created={} skipped_blank={} skipped_duplicates={} domains_created={}",
            summary.created, summary.skipped_blank, summary.skipped_duplicates, summary.domains_created
        );
        Ok(summary)
    }

    fn map_columns(&self, header: &[String]) -> Result<ColumnMap, ImportError> {
        let position = |wanted: &str| {
            let wanted = name_key(wanted);
            header.iter().position(|column| name_key(column) == wanted)
        };
        let name = position(&self.config.name_header)
            .ok_or_else(|| ImportError::MissingColumn(self.config.name_header.clone()))?;
        Ok(ColumnMap {
            name,
            domain: position(&self.config.domain_header),
            session: position(&self.config.session_header),
        })
    }

    fn resolve_domain(
        &self,
        domain_name: &str,
        cache: &mut HashMap<String, Option<DomainId>>,
        summary: &mut ImportSummary,
    ) -> Result<Option<DomainId>, ImportError> {
        let key = name_key(domain_name);
        if let Some(cached) = cache.get(&key) {
            if cached.is_none() {
                summary.unknown_domains += 1;
            }
            return Ok(*cached);
        }

        let resolved = match self.roster.find_domain_by_name(domain_name)? {
            Some(domain) => Some(domain.id),
            None if self.config.create_missing_domains => {
                let domain = self.roster.create_domain(domain_name, None)?;
                summary.domains_created += 1;
                Some(domain.id)
            }
            None => {
                warn!("event=csv_import module=import status=warn reason=unknown_domain");
                summary.unknown_domains += 1;
                None
            }
        };
        cache.insert(key, resolved);
        Ok(resolved)
    }
}

fn cell(row: &[String], index: Option<usize>) -> Option<String> {
    index
        .and_then(|index| row.get(index))
        .map(|value| value.trim().to_string())
}
