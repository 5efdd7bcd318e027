use rubric_core::db::open_db_in_memory;
use rubric_core::{
    AggregationMode, ArchiveMode, NewObjective, ObjectiveService, ParentRef, ProgressService,
    ProgressServiceError, ProgressStatus, RosterService, SqliteCohortRepository,
    SqliteObjectiveRepository, SqliteProgressRepository, SqliteStudentRepository,
};
use rusqlite::Connection;

type Progress<'conn> = ProgressService<
    SqliteObjectiveRepository<'conn>,
    SqliteStudentRepository<'conn>,
    SqliteCohortRepository<'conn>,
    SqliteProgressRepository<'conn>,
>;

fn progress_service(conn: &Connection) -> Progress<'_> {
    ProgressService::new(
        SqliteObjectiveRepository::try_new(conn).unwrap(),
        SqliteStudentRepository::try_new(conn).unwrap(),
        SqliteCohortRepository::try_new(conn).unwrap(),
        SqliteProgressRepository::try_new(conn).unwrap(),
    )
}

fn roster_service(
    conn: &Connection,
) -> RosterService<SqliteStudentRepository<'_>, SqliteCohortRepository<'_>> {
    RosterService::new(
        SqliteStudentRepository::try_new(conn).unwrap(),
        SqliteCohortRepository::try_new(conn).unwrap(),
    )
}

/// Rubric: A{A.1, A.2} and B{B.1}.
fn seed_rubric(conn: &Connection) {
    let objectives = ObjectiveService::new(SqliteObjectiveRepository::try_new(conn).unwrap());
    for (code, parent) in [
        ("A", None),
        ("A.1", Some("A")),
        ("A.2", Some("A")),
        ("B", None),
        ("B.1", Some("B")),
    ] {
        let mut input = NewObjective::new(code, format!("Objective {code}"));
        if let Some(parent) = parent {
            input = input.under(ParentRef::Code(parent.to_string()));
        }
        objectives.create(input).unwrap();
    }
}

#[test]
fn leaf_value_reads_back_as_written() {
    let conn = open_db_in_memory().unwrap();
    seed_rubric(&conn);
    let student = roster_service(&conn).create_student("Ada").unwrap();
    let service = progress_service(&conn);

    for value in [0, 25, 50, 75, 100] {
        service.set_leaf_percentage(student.id, "A.1", value).unwrap();
        assert_eq!(
            service.leaf_percentage(student.id, "A.1").unwrap(),
            value as u8
        );
    }
    assert_eq!(service.leaf_percentage(student.id, "A.2").unwrap(), 0);
}

#[test]
fn out_of_range_percentage_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    seed_rubric(&conn);
    let student = roster_service(&conn).create_student("Ada").unwrap();
    let service = progress_service(&conn);

    for value in [-1, 101] {
        let err = service
            .set_leaf_percentage(student.id, "A.1", value)
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::Validation(_)));
    }
}

#[test]
fn categories_do_not_accept_direct_values() {
    let conn = open_db_in_memory().unwrap();
    seed_rubric(&conn);
    let student = roster_service(&conn).create_student("Ada").unwrap();
    let service = progress_service(&conn);

    let err = service.set_leaf_percentage(student.id, "A", 50).unwrap_err();
    assert!(matches!(err, ProgressServiceError::NotALeaf(code) if code == "A"));

    let err = service.set_leaf_percentage(student.id, "Z.9", 50).unwrap_err();
    assert!(matches!(err, ProgressServiceError::UnknownObjective(_)));
}

#[test]
fn clearing_a_leaf_returns_it_to_zero() {
    let conn = open_db_in_memory().unwrap();
    seed_rubric(&conn);
    let student = roster_service(&conn).create_student("Ada").unwrap();
    let service = progress_service(&conn);

    service.set_leaf_percentage(student.id, "B.1", 80).unwrap();
    assert!(service.clear_leaf_percentage(student.id, "B.1").unwrap());
    assert!(!service.clear_leaf_percentage(student.id, "B.1").unwrap());
    assert_eq!(service.leaf_percentage(student.id, "B.1").unwrap(), 0);
}

#[test]
fn student_without_records_scores_zero() {
    let conn = open_db_in_memory().unwrap();
    seed_rubric(&conn);
    let student = roster_service(&conn).create_student("Ada").unwrap();

    let report = progress_service(&conn).student_report(student.id).unwrap();
    assert_eq!(report.overall, 0);
    assert_eq!(report.status, ProgressStatus::NotStarted);
    assert!(report.rows.iter().all(|row| row.percentage == 0));
}

#[test]
fn student_report_rolls_leaves_up_to_roots() {
    let conn = open_db_in_memory().unwrap();
    seed_rubric(&conn);
    let student = roster_service(&conn).create_student("Ada").unwrap();
    let service = progress_service(&conn);
    service.set_leaf_percentage(student.id, "A.1", 100).unwrap();
    service.set_leaf_percentage(student.id, "A.2", 35).unwrap();
    service.set_leaf_percentage(student.id, "B.1", 100).unwrap();

    let report = service.student_report(student.id).unwrap();
    let summary: Vec<(&str, usize, u8)> = report
        .rows
        .iter()
        .map(|row| (row.code.as_str(), row.depth, row.percentage))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("A", 0, 67),
            ("A.1", 1, 100),
            ("A.2", 1, 35),
            ("B", 0, 100),
            ("B.1", 1, 100),
        ]
    );
    assert_eq!(report.overall, 83);
    assert_eq!(report.status, ProgressStatus::InProgress);
}

#[test]
fn empty_cohort_reports_zero() {
    let conn = open_db_in_memory().unwrap();
    seed_rubric(&conn);

    let report = progress_service(&conn).cohort_report().unwrap();
    assert_eq!(report.overall, 0);
    assert!(report.students.is_empty());
    assert!(report.rows.iter().all(|row| row.percentage == 0));
}

#[test]
fn cohort_report_averages_active_students_only() {
    let conn = open_db_in_memory().unwrap();
    seed_rubric(&conn);
    let roster = roster_service(&conn);
    let ada = roster.create_student("Ada").unwrap();
    let ben = roster.create_student("Ben").unwrap();
    let gone = roster.create_student("Gone").unwrap();
    let service = progress_service(&conn);

    service.set_leaf_percentage(ada.id, "B.1", 100).unwrap();
    service.set_leaf_percentage(ben.id, "B.1", 51).unwrap();
    service.set_leaf_percentage(gone.id, "B.1", 100).unwrap();
    roster.archive_student(gone.id).unwrap();

    let report = service.cohort_report().unwrap();
    assert_eq!(report.students.len(), 2);
    let b1 = report.rows.iter().find(|row| row.code == "B.1").unwrap();
    assert_eq!(b1.percentage, 75);
    // Ada: (0 + 100) / 2 = 50, Ben: (0 + 51) / 2 = 25.
    assert_eq!(report.overall, 37);
}

#[test]
fn single_student_cohort_matches_the_student() {
    let conn = open_db_in_memory().unwrap();
    seed_rubric(&conn);
    let ada = roster_service(&conn).create_student("Ada").unwrap();
    let service = progress_service(&conn);
    service.set_leaf_percentage(ada.id, "A.1", 90).unwrap();

    let student = service.student_report(ada.id).unwrap();
    let cohort = service.cohort_report().unwrap();
    assert_eq!(student.rows, cohort.rows);
    assert_eq!(student.overall, cohort.overall);
}

#[test]
fn group_report_covers_members_only() {
    let conn = open_db_in_memory().unwrap();
    seed_rubric(&conn);
    let roster = roster_service(&conn);
    let group = roster.create_group("Red", Some("#FF0000".to_string())).unwrap();
    let ada = roster.create_student("Ada").unwrap();
    let ben = roster.create_student("Ben").unwrap();
    roster.set_groups(ada.id, &[group.id]).unwrap();
    let service = progress_service(&conn);
    service.set_leaf_percentage(ada.id, "A.1", 100).unwrap();
    service.set_leaf_percentage(ada.id, "A.2", 100).unwrap();
    service.set_leaf_percentage(ben.id, "B.1", 100).unwrap();

    let report = service.group_report(group.id).unwrap();
    assert_eq!(report.members.len(), 1);
    assert_eq!(report.members[0].name, "Ada");
    assert_eq!(report.overall, 50);
    let a = report.rows.iter().find(|row| row.code == "A").unwrap();
    let b = report.rows.iter().find(|row| row.code == "B").unwrap();
    assert_eq!((a.percentage, b.percentage), (100, 0));
}

#[test]
fn empty_group_reports_zero() {
    let conn = open_db_in_memory().unwrap();
    seed_rubric(&conn);
    let group = roster_service(&conn).create_group("Empty", None).unwrap();

    let report = progress_service(&conn).group_report(group.id).unwrap();
    assert_eq!(report.overall, 0);
    assert!(report.members.is_empty());
}

#[test]
fn domain_report_averages_members_in_computed_mode() {
    let conn = open_db_in_memory().unwrap();
    seed_rubric(&conn);
    let roster = roster_service(&conn);
    let domain = roster.create_domain("Data", None).unwrap();
    let ada = roster.create_student("Ada").unwrap();
    let ben = roster.create_student("Ben").unwrap();
    let other = roster.create_student("Other").unwrap();
    roster.set_domain(ada.id, Some(domain.id)).unwrap();
    roster.set_domain(ben.id, Some(domain.id)).unwrap();
    let service = progress_service(&conn);
    service.set_leaf_percentage(ada.id, "B.1", 100).unwrap();
    service.set_leaf_percentage(ben.id, "B.1", 0).unwrap();
    service.set_leaf_percentage(other.id, "B.1", 100).unwrap();

    let report = service.domain_report(domain.id).unwrap();
    assert_eq!(report.mode, AggregationMode::ComputedCohortAverage);
    assert_eq!(report.member_count, 2);
    let b = report.rows.iter().find(|row| row.code == "B").unwrap();
    assert_eq!(b.percentage, 50);
    assert_eq!(report.overall, 25);
}

#[test]
fn domain_report_uses_review_scores_in_review_mode() {
    let conn = open_db_in_memory().unwrap();
    seed_rubric(&conn);
    let roster = roster_service(&conn);
    let domain = roster.create_domain("Design", None).unwrap();
    roster
        .set_domain_mode(domain.id, AggregationMode::ExpertReviewScore)
        .unwrap();
    let ada = roster.create_student("Ada").unwrap();
    roster.set_domain(ada.id, Some(domain.id)).unwrap();
    let service = progress_service(&conn);
    service.set_leaf_percentage(ada.id, "A.1", 100).unwrap();
    service.set_review_score(domain.id, "A.2", 80).unwrap();
    service.set_review_score(domain.id, "B.1", 60).unwrap();

    let report = service.domain_report(domain.id).unwrap();
    assert_eq!(report.mode, AggregationMode::ExpertReviewScore);
    let a = report.rows.iter().find(|row| row.code == "A").unwrap();
    assert_eq!(a.percentage, 40);
    assert_eq!(report.overall, 50);
    assert_eq!(service.review_scores(domain.id).unwrap().len(), 2);
}

#[test]
fn reports_reject_unknown_or_archived_targets() {
    let conn = open_db_in_memory().unwrap();
    seed_rubric(&conn);
    let roster = roster_service(&conn);
    let group = roster.create_group("Old", None).unwrap();
    roster.archive_group(group.id).unwrap();
    let service = progress_service(&conn);

    assert!(matches!(
        service.group_report(group.id).unwrap_err(),
        ProgressServiceError::GroupNotFound(_)
    ));
    assert!(matches!(
        service.domain_report(uuid::Uuid::new_v4()).unwrap_err(),
        ProgressServiceError::DomainNotFound(_)
    ));
    assert!(matches!(
        service.student_report(uuid::Uuid::new_v4()).unwrap_err(),
        ProgressServiceError::StudentNotFound(_)
    ));
}

#[test]
fn renaming_a_leaf_code_keeps_recorded_progress() {
    let conn = open_db_in_memory().unwrap();
    seed_rubric(&conn);
    let ada = roster_service(&conn).create_student("Ada").unwrap();
    let service = progress_service(&conn);
    service.set_leaf_percentage(ada.id, "B.1", 70).unwrap();

    let objectives = ObjectiveService::new(SqliteObjectiveRepository::try_new(&conn).unwrap());
    let mut leaf = objectives.get_by_code("B.1").unwrap().unwrap();
    leaf.code = "B.01".to_string();
    objectives.update(&leaf).unwrap();

    assert_eq!(service.leaf_percentage(ada.id, "B.01").unwrap(), 70);
    assert_eq!(service.leaf_percentage(ada.id, "B.1").unwrap(), 0);
}

#[test]
fn reused_code_starts_without_the_archived_objectives_progress() {
    let conn = open_db_in_memory().unwrap();
    seed_rubric(&conn);
    let ada = roster_service(&conn).create_student("Ada").unwrap();
    let service = progress_service(&conn);
    service.set_leaf_percentage(ada.id, "A.1", 40).unwrap();
    service.set_leaf_percentage(ada.id, "A.2", 80).unwrap();

    let objectives = ObjectiveService::new(SqliteObjectiveRepository::try_new(&conn).unwrap());
    let old = objectives.get_by_code("A.2").unwrap().unwrap();
    objectives.archive(old.id, ArchiveMode::NodeOnly).unwrap();
    objectives
        .create(NewObjective::new("A.2", "Replacement").under(ParentRef::Code("A".to_string())))
        .unwrap();

    assert_eq!(service.leaf_percentage(ada.id, "A.2").unwrap(), 0);
    let report = service.student_report(ada.id).unwrap();
    let a = report.rows.iter().find(|row| row.code == "A").unwrap();
    assert_eq!(a.percentage, 20);
}

#[test]
fn renaming_onto_an_archived_code_replaces_its_leftover_progress() {
    let conn = open_db_in_memory().unwrap();
    seed_rubric(&conn);
    let ada = roster_service(&conn).create_student("Ada").unwrap();
    let service = progress_service(&conn);
    service.set_leaf_percentage(ada.id, "A.1", 40).unwrap();
    service.set_leaf_percentage(ada.id, "A.2", 80).unwrap();

    let objectives = ObjectiveService::new(SqliteObjectiveRepository::try_new(&conn).unwrap());
    let old = objectives.get_by_code("A.2").unwrap().unwrap();
    objectives.archive(old.id, ArchiveMode::NodeOnly).unwrap();
    // Row left over from a database written before archiving cleared progress.
    conn.execute(
        "INSERT INTO progress_records (subject_kind, subject_uuid, objective_code, percentage)
         VALUES ('student', ?1, 'A.2', 80);",
        [ada.id.to_string()],
    )
    .unwrap();

    let mut leaf = objectives.get_by_code("A.1").unwrap().unwrap();
    leaf.code = "A.2".to_string();
    objectives.update(&leaf).unwrap();

    assert_eq!(service.leaf_percentage(ada.id, "A.2").unwrap(), 40);
    assert_eq!(service.leaf_percentage(ada.id, "A.1").unwrap(), 0);
}
