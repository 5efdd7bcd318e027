//! Command-line front end for the rubric progress tracker.
//!
//! ## Commands
//!
//! - `import`: Load students from a roster CSV
//! - `objective`: Add or list rubric objectives
//! - `set`: Record a student's completion of a leaf objective
//! - `report`: Print cohort, group, domain or student progress
//! - `status`: Show database and schema information

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use rubric_core::db::migrations::current_user_version;
use rubric_core::db::open_db;
use rubric_core::{
    CoreConfig, ImportService, NewObjective, ObjectiveRow, ObjectiveService, ParentRef,
    ProgressService, RosterService, SqliteCohortRepository, SqliteObjectiveRepository,
    SqliteProgressRepository, SqliteStudentRepository, StudentSummary,
};
use rusqlite::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rubric")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Track learning-objective progress for a cohort", long_about = None)]
struct Cli {
    /// Config file (missing file means defaults)
    #[arg(long, env = "RUBRIC_CONFIG", default_value = "rubric.toml", global = true)]
    config: PathBuf,

    /// Database path, overriding the config file
    #[arg(long, env = "RUBRIC_DB", global = true)]
    db: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import students from a roster CSV
    Import {
        /// Path to the CSV file
        csv: PathBuf,
    },

    /// Manage rubric objectives
    Objective {
        #[command(subcommand)]
        action: ObjectiveAction,
    },

    /// Record a student's completion percentage for a leaf objective
    Set {
        /// Student name
        student: String,
        /// Leaf objective code
        code: String,
        /// Completion percentage, 0-100
        percentage: i64,
    },

    /// Print a progress report (whole cohort by default)
    Report {
        /// Report on one cohort group
        #[arg(long, conflicts_with_all = ["domain", "student"])]
        group: Option<String>,

        /// Report on one domain's expertise check
        #[arg(long, conflicts_with = "student")]
        domain: Option<String>,

        /// Report on one student
        #[arg(long)]
        student: Option<String>,
    },

    /// Show database and schema information
    Status,
}

#[derive(Subcommand)]
enum ObjectiveAction {
    /// Add an objective, optionally under a parent code
    Add {
        code: String,
        title: String,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        quantitative: bool,
    },
    /// List active objectives in display order
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CoreConfig::load_or_default(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;
    if let Some(db) = cli.db.clone() {
        config.db_path = db;
    }
    if let Some(log_dir) = &config.log_dir {
        rubric_core::init_logging(&config.log_level, log_dir)
            .context("failed to initialize logging")?;
    }

    let conn = open_db(&config.db_path)
        .with_context(|| format!("failed to open database {}", config.db_path.display()))?;
    info!("event=cli_command module=cli status=start");

    match cli.command {
        Commands::Import { csv } => run_import(&conn, &config, &csv),
        Commands::Objective { action } => run_objective(&conn, action),
        Commands::Set {
            student,
            code,
            percentage,
        } => run_set(&conn, &student, &code, percentage),
        Commands::Report {
            group,
            domain,
            student,
        } => run_report(&conn, cli.json, group, domain, student),
        Commands::Status => run_status(&conn, &config),
    }
}

type SqliteRosterService<'conn> =
    RosterService<SqliteStudentRepository<'conn>, SqliteCohortRepository<'conn>>;

fn roster(conn: &Connection) -> Result<SqliteRosterService<'_>> {
    Ok(RosterService::new(
        SqliteStudentRepository::try_new(conn)?,
        SqliteCohortRepository::try_new(conn)?,
    ))
}

type SqliteProgressService<'conn> = ProgressService<
    SqliteObjectiveRepository<'conn>,
    SqliteStudentRepository<'conn>,
    SqliteCohortRepository<'conn>,
    SqliteProgressRepository<'conn>,
>;

fn progress(conn: &Connection) -> Result<SqliteProgressService<'_>> {
    Ok(ProgressService::new(
        SqliteObjectiveRepository::try_new(conn)?,
        SqliteStudentRepository::try_new(conn)?,
        SqliteCohortRepository::try_new(conn)?,
        SqliteProgressRepository::try_new(conn)?,
    ))
}

fn run_import(conn: &Connection, config: &CoreConfig, csv: &Path) -> Result<()> {
    let service = ImportService::new(roster(conn)?, config.import.clone());
    let summary = service
        .import_file(csv)
        .with_context(|| format!("failed to import {}", csv.display()))?;
    println!("created: {}", summary.created);
    println!("skipped (blank name): {}", summary.skipped_blank);
    println!("skipped (duplicate): {}", summary.skipped_duplicates);
    println!("domains created: {}", summary.domains_created);
    if summary.unknown_domains > 0 {
        println!("rows with unknown domain: {}", summary.unknown_domains);
    }
    if summary.unknown_sessions > 0 {
        println!("rows with unknown session: {}", summary.unknown_sessions);
    }
    Ok(())
}

fn run_objective(conn: &Connection, action: ObjectiveAction) -> Result<()> {
    let service = ObjectiveService::new(SqliteObjectiveRepository::try_new(conn)?);
    match action {
        ObjectiveAction::Add {
            code,
            title,
            parent,
            description,
            quantitative,
        } => {
            let mut input = NewObjective::new(code, title);
            input.description = description;
            input.is_quantitative = quantitative;
            if let Some(parent) = parent {
                input = input.under(ParentRef::Code(parent));
            }
            let objective = service.create(input)?;
            println!("added {} {}", objective.code, objective.title);
        }
        ObjectiveAction::List => {
            let index = service.active_index()?;
            for objective in index.depth_first() {
                let indent = "  ".repeat(index.depth(objective.id));
                println!("{indent}{} {}", objective.code, objective.title);
            }
        }
    }
    Ok(())
}

fn run_set(conn: &Connection, student: &str, code: &str, percentage: i64) -> Result<()> {
    let Some(found) = roster(conn)?.find_student_by_name(student)? else {
        bail!("no active student named `{student}`");
    };
    let stored = progress(conn)?.set_leaf_percentage(found.id, code, percentage)?;
    println!("{} {} = {}%", found.name, code.trim(), stored.value());
    Ok(())
}

fn run_report(
    conn: &Connection,
    json: bool,
    group: Option<String>,
    domain: Option<String>,
    student: Option<String>,
) -> Result<()> {
    let roster = roster(conn)?;
    let service = progress(conn)?;

    if let Some(name) = group {
        let Some(found) = roster.find_group_by_name(&name)? else {
            bail!("no active group named `{name}`");
        };
        let report = service.group_report(found.id)?;
        if json {
            return print_json(&report);
        }
        println!("group {}: {}%", report.group.name, report.overall);
        print_members(&report.members);
        print_rows(&report.rows);
    } else if let Some(name) = domain {
        let Some(found) = roster.find_domain_by_name(&name)? else {
            bail!("no active domain named `{name}`");
        };
        let report = service.domain_report(found.id)?;
        if json {
            return print_json(&report);
        }
        println!(
            "domain {} ({}, {} members): {}%",
            report.domain.name,
            report.mode.label(),
            report.member_count,
            report.overall
        );
        print_rows(&report.rows);
    } else if let Some(name) = student {
        let Some(found) = roster.find_student_by_name(&name)? else {
            bail!("no active student named `{name}`");
        };
        let report = service.student_report(found.id)?;
        if json {
            return print_json(&report);
        }
        println!(
            "student {}: {}% ({})",
            report.student.name,
            report.overall,
            report.status.label()
        );
        print_rows(&report.rows);
    } else {
        let report = service.cohort_report()?;
        if json {
            return print_json(&report);
        }
        println!("cohort: {}%", report.overall);
        print_members(&report.students);
        print_rows(&report.rows);
    }
    Ok(())
}

fn run_status(conn: &Connection, config: &CoreConfig) -> Result<()> {
    let roster = roster(conn)?;
    let objectives = ObjectiveService::new(SqliteObjectiveRepository::try_new(conn)?);
    println!("rubric_core {}", rubric_core::core_version());
    println!("database: {}", config.db_path.display());
    println!("schema version: {}", current_user_version(conn)?);
    println!("objectives: {}", objectives.active_index()?.len());
    println!("students: {}", roster.list_students()?.len());
    println!("groups: {}", roster.list_groups()?.len());
    println!("domains: {}", roster.list_domains()?.len());
    match rubric_core::logging_status() {
        Some((level, dir)) => println!("logging: {level} -> {}", dir.display()),
        None => println!("logging: off"),
    }
    Ok(())
}

fn print_members(members: &[StudentSummary]) {
    for member in members {
        println!("  {:<32} {:>3}%", member.name, member.overall);
    }
}

fn print_rows(rows: &[ObjectiveRow]) {
    for row in rows {
        let indent = "  ".repeat(row.depth);
        println!(
            "  {indent}{:<12} {:>3}%  {}",
            row.code, row.percentage, row.title
        );
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
