use rubric_core::db::open_db_in_memory;
use rubric_core::progress::{percentage_by_code, LeafValues};
use rubric_core::{
    ArchiveMode, LearningObjective, NewObjective, ObjectiveService, ObjectiveServiceError,
    ParentRef, SqliteObjectiveRepository, SubjectProgress,
};

fn leaves(values: &[(&str, u8)]) -> LeafValues {
    values
        .iter()
        .map(|(code, value)| (code.to_string(), *value))
        .collect()
}

fn add(
    service: &ObjectiveService<SqliteObjectiveRepository<'_>>,
    code: &str,
    parent: Option<&str>,
) -> LearningObjective {
    let mut input = NewObjective::new(code, format!("Objective {code}"));
    if let Some(parent) = parent {
        input = input.under(ParentRef::Code(parent.to_string()));
    }
    service.create(input).unwrap()
}

#[test]
fn category_is_floor_of_child_average() {
    let conn = open_db_in_memory().unwrap();
    let service = ObjectiveService::new(SqliteObjectiveRepository::try_new(&conn).unwrap());
    add(&service, "A", None);
    add(&service, "A.1", Some("A"));
    add(&service, "A.2", Some("A"));
    add(&service, "A.3", Some("A"));

    let index = service.active_index().unwrap();
    let values = leaves(&[("A.1", 40), ("A.2", 60), ("A.3", 100)]);
    assert_eq!(percentage_by_code("A", &index, &values), 66);
    assert_eq!(percentage_by_code("A.3", &index, &values), 100);
}

#[test]
fn single_child_chain_passes_average_through() {
    let conn = open_db_in_memory().unwrap();
    let service = ObjectiveService::new(SqliteObjectiveRepository::try_new(&conn).unwrap());
    add(&service, "B", None);
    add(&service, "B.1", Some("B"));
    add(&service, "B.1.1", Some("B.1"));
    add(&service, "B.1.2", Some("B.1"));

    let index = service.active_index().unwrap();
    let progress = SubjectProgress::compute(&index, &leaves(&[("B.1.1", 0), ("B.1.2", 100)]));
    assert_eq!(progress.by_code("B.1"), 50);
    assert_eq!(progress.by_code("B"), 50);
}

#[test]
fn each_child_weighs_the_same_regardless_of_leaf_count() {
    let conn = open_db_in_memory().unwrap();
    let service = ObjectiveService::new(SqliteObjectiveRepository::try_new(&conn).unwrap());
    add(&service, "C", None);
    add(&service, "C.1", Some("C"));
    add(&service, "C.2", Some("C"));
    add(&service, "C.2.1", Some("C.2"));
    add(&service, "C.2.2", Some("C.2"));
    add(&service, "C.2.3", Some("C.2"));

    let index = service.active_index().unwrap();
    let values = leaves(&[("C.1", 100)]);
    assert_eq!(percentage_by_code("C.2", &index, &values), 0);
    assert_eq!(percentage_by_code("C", &index, &values), 50);
}

#[test]
fn leaves_without_values_count_as_zero() {
    let conn = open_db_in_memory().unwrap();
    let service = ObjectiveService::new(SqliteObjectiveRepository::try_new(&conn).unwrap());
    add(&service, "D", None);
    add(&service, "D.1", Some("D"));

    let index = service.active_index().unwrap();
    let progress = SubjectProgress::compute(&index, &LeafValues::new());
    assert_eq!(progress.by_code("D.1"), 0);
    assert_eq!(progress.by_code("D"), 0);
    assert_eq!(progress.overall(), 0);
}

#[test]
fn parent_by_id_and_by_code_build_the_same_tree() {
    let conn = open_db_in_memory().unwrap();
    let service = ObjectiveService::new(SqliteObjectiveRepository::try_new(&conn).unwrap());
    let root = add(&service, "E", None);
    service
        .create(NewObjective::new("E.1", "By id").under(ParentRef::Id(root.id)))
        .unwrap();
    add(&service, "E.2", Some("E"));

    let children = service.list_children(Some(root.id)).unwrap();
    let codes: Vec<&str> = children.iter().map(|child| child.code.as_str()).collect();
    assert_eq!(codes, vec!["E.1", "E.2"]);
    assert_eq!(children[0].sort_order, 0);
    assert_eq!(children[1].sort_order, 1);
}

#[test]
fn duplicate_active_code_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = ObjectiveService::new(SqliteObjectiveRepository::try_new(&conn).unwrap());
    add(&service, "F", None);

    let err = service.create(NewObjective::new("F", "Again")).unwrap_err();
    assert!(matches!(err, ObjectiveServiceError::DuplicateCode(code) if code == "F"));
}

#[test]
fn archived_code_can_be_reused() {
    let conn = open_db_in_memory().unwrap();
    let service = ObjectiveService::new(SqliteObjectiveRepository::try_new(&conn).unwrap());
    let old = add(&service, "G", None);
    service.archive(old.id, ArchiveMode::NodeOnly).unwrap();

    let replacement = add(&service, "G", None);
    assert_ne!(replacement.id, old.id);
}

#[test]
fn unknown_parent_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = ObjectiveService::new(SqliteObjectiveRepository::try_new(&conn).unwrap());

    let err = service
        .create(NewObjective::new("H.1", "Lost").under(ParentRef::Code("H".to_string())))
        .unwrap_err();
    assert!(matches!(err, ObjectiveServiceError::ParentNotFound(_)));
}

#[test]
fn reparent_under_own_descendant_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = ObjectiveService::new(SqliteObjectiveRepository::try_new(&conn).unwrap());
    let root = add(&service, "I", None);
    let child = add(&service, "I.1", Some("I"));
    let grandchild = add(&service, "I.1.1", Some("I.1"));

    let err = service
        .reparent(root.id, Some(ParentRef::Id(grandchild.id)))
        .unwrap_err();
    assert!(matches!(err, ObjectiveServiceError::CycleDetected { .. }));

    let err = service
        .reparent(child.id, Some(ParentRef::Id(child.id)))
        .unwrap_err();
    assert!(matches!(
        err,
        ObjectiveServiceError::Validation(_) | ObjectiveServiceError::CycleDetected { .. }
    ));
}

#[test]
fn reparent_moves_node_to_end_of_new_siblings() {
    let conn = open_db_in_memory().unwrap();
    let service = ObjectiveService::new(SqliteObjectiveRepository::try_new(&conn).unwrap());
    let j = add(&service, "J", None);
    add(&service, "J.1", Some("J"));
    let k = add(&service, "K", None);
    let k1 = add(&service, "K.1", Some("K"));

    service.reparent(k1.id, Some(ParentRef::Id(j.id))).unwrap();
    let codes: Vec<String> = service
        .list_children(Some(j.id))
        .unwrap()
        .into_iter()
        .map(|child| child.code)
        .collect();
    assert_eq!(codes, vec!["J.1", "K.1"]);
    assert!(service.list_children(Some(k.id)).unwrap().is_empty());

    service.reparent(k1.id, None).unwrap();
    let roots: Vec<String> = service
        .list_children(None)
        .unwrap()
        .into_iter()
        .map(|root| root.code)
        .collect();
    assert_eq!(roots, vec!["J", "K", "K.1"]);
}

#[test]
fn archiving_node_only_promotes_children_to_roots() {
    let conn = open_db_in_memory().unwrap();
    let service = ObjectiveService::new(SqliteObjectiveRepository::try_new(&conn).unwrap());
    let root = add(&service, "L", None);
    add(&service, "L.1", Some("L"));
    add(&service, "L.2", Some("L"));

    let archived = service.archive(root.id, ArchiveMode::NodeOnly).unwrap();
    assert_eq!(archived, vec![root.id]);

    let index = service.active_index().unwrap();
    let roots: Vec<&str> = index.roots().iter().map(|root| root.code.as_str()).collect();
    assert_eq!(roots, vec!["L.1", "L.2"]);
    let progress = SubjectProgress::compute(&index, &leaves(&[("L.1", 100), ("L.2", 51)]));
    assert_eq!(progress.overall(), 75);
}

#[test]
fn child_of_archived_parent_can_still_be_edited() {
    let conn = open_db_in_memory().unwrap();
    let service = ObjectiveService::new(SqliteObjectiveRepository::try_new(&conn).unwrap());
    let root = add(&service, "L", None);
    let mut child = add(&service, "L.1", Some("L"));
    service.archive(root.id, ArchiveMode::NodeOnly).unwrap();

    child.title = "Renamed".to_string();
    service.update(&child).unwrap();

    assert_eq!(service.get(child.id).unwrap().title, "Renamed");
    let index = service.active_index().unwrap();
    assert_eq!(index.roots()[0].code, "L.1");
}

#[test]
fn archiving_subtree_hides_descendants() {
    let conn = open_db_in_memory().unwrap();
    let service = ObjectiveService::new(SqliteObjectiveRepository::try_new(&conn).unwrap());
    let root = add(&service, "M", None);
    add(&service, "M.1", Some("M"));
    add(&service, "M.1.1", Some("M.1"));
    add(&service, "N", None);

    let archived = service.archive(root.id, ArchiveMode::Subtree).unwrap();
    assert_eq!(archived.len(), 3);

    let index = service.active_index().unwrap();
    assert_eq!(index.len(), 1);
    assert!(index.by_code("M.1.1").is_none());
}

#[test]
fn code_rename_keeps_children_attached_by_code() {
    let conn = open_db_in_memory().unwrap();
    let service = ObjectiveService::new(SqliteObjectiveRepository::try_new(&conn).unwrap());
    let mut root = add(&service, "P", None);
    add(&service, "P.1", Some("P"));

    root.code = "Q".to_string();
    service.update(&root).unwrap();

    let children = service.list_children(Some(root.id)).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].parent, Some(ParentRef::Code("Q".to_string())));
}

#[test]
fn invalid_code_is_a_validation_error() {
    let conn = open_db_in_memory().unwrap();
    let service = ObjectiveService::new(SqliteObjectiveRepository::try_new(&conn).unwrap());

    let err = service.create(NewObjective::new("bad code", "Spaces")).unwrap_err();
    assert!(matches!(err, ObjectiveServiceError::Validation(_)));
}
