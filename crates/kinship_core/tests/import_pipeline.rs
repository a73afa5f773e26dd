mod common;

use common::{write_gzip_archive, FAMILY_ARCHIVE};
use kinship_core::archive::ArchiveError;
use kinship_core::convert::ConvertError;
use kinship_core::{import, import_into, EntityType, ImportError, RepoError, Storage};

#[test]
fn import_yields_collections_in_ingestion_order_with_resolved_forward_references() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_gzip_archive(dir.path(), FAMILY_ARCHIVE);

    let entities: Vec<_> = import(&archive)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(entities.len(), 13);

    let rank = |entity_type: EntityType| {
        EntityType::ALL
            .iter()
            .position(|candidate| *candidate == entity_type)
            .unwrap()
    };
    assert!(entities
        .windows(2)
        .all(|pair| rank(pair[0].entity_type) <= rank(pair[1].entity_type)));
    assert_eq!(entities[0].id, "E0001");

    let people: Vec<&str> = entities
        .iter()
        .filter(|entity| entity.entity_type == EntityType::Person)
        .map(|entity| entity.id.as_str())
        .collect();
    assert_eq!(people, vec!["I0001", "I0002", "I0003", "I0004", "I0005", "I0006"]);

    let henry = entities.iter().find(|entity| entity.id == "I0001").unwrap();
    assert_eq!(henry.entity_type, EntityType::Person);
    assert_eq!(henry.handle, "_g1");
    let parentin = henry.record.get("parentin").unwrap().as_list().unwrap();
    assert_eq!(parentin[0].as_record().unwrap().text("id"), Some("F0001"));

    let john = entities.iter().find(|entity| entity.id == "I0003").unwrap();
    let childof = john.record.get("childof").unwrap().as_list().unwrap();
    let link = childof[0].as_record().unwrap();
    assert_eq!(link.text("id"), Some("F0001"));
    assert_eq!(link.text("hlink"), None);
    assert!(john.record.get("change").unwrap().as_timestamp().is_some());
}

#[test]
fn person_with_two_names_keeps_both_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_gzip_archive(dir.path(), FAMILY_ARCHIVE);

    let henry = import(&archive)
        .unwrap()
        .map(Result::unwrap)
        .find(|entity| entity.id == "I0001")
        .unwrap();
    let names = henry.record.get("name").unwrap().as_list().unwrap();
    assert_eq!(names.len(), 2);
    assert_eq!(names[0].as_record().unwrap().text("first"), Some("Henry"));
    assert_eq!(names[1].as_record().unwrap().text("first"), Some("Harry"));
}

#[test]
fn unresolved_handles_stay_as_links() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_gzip_archive(dir.path(), FAMILY_ARCHIVE);

    let anna = import(&archive)
        .unwrap()
        .map(Result::unwrap)
        .find(|entity| entity.id == "I0005")
        .unwrap();
    let citations = anna.record.get("citationref").unwrap().as_list().unwrap();
    assert_eq!(citations[0].as_record().unwrap().text("hlink"), Some("_missing"));
}

#[test]
fn entities_without_declared_id_get_surrogate_uuid() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_gzip_archive(dir.path(), FAMILY_ARCHIVE);

    let name_map = import(&archive)
        .unwrap()
        .map(Result::unwrap)
        .find(|entity| entity.entity_type == EntityType::NameMap)
        .unwrap();
    assert!(uuid::Uuid::parse_str(&name_map.id).is_ok());
    assert_eq!(name_map.handle, name_map.id);
    assert_eq!(name_map.record.text("key"), Some("Smyth"));
}

#[test]
fn uncompressed_archive_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("tree.xml");
    std::fs::write(&archive, FAMILY_ARCHIVE).unwrap();

    assert_eq!(import(&archive).unwrap().count(), 13);
}

#[test]
fn duplicate_handle_fails_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_gzip_archive(
        dir.path(),
        r#"<database><people>
            <person handle="_x" id="I1"><gender>M</gender><name><first>A</first></name></person>
            <person handle="_x" id="I2"><gender>F</gender><name><first>B</first></name></person>
        </people></database>"#,
    );

    let err = import(&archive).err().unwrap();
    assert!(matches!(
        err,
        ImportError::Convert(ConvertError::DuplicateHandle { ref handle, .. }) if handle == "_x"
    ));
}

#[test]
fn iteration_stops_after_first_error() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_gzip_archive(
        dir.path(),
        r#"<database><people>
            <person handle="_a" id="I1"><gender>M</gender><name><first>A</first></name></person>
            <person handle="_b" id="I2"><gender>F</gender><name><middle>Q</middle></name></person>
            <person handle="_c" id="I3"><gender>F</gender><name><first>C</first></name></person>
        </people></database>"#,
    );

    let results: Vec<_> = import(&archive).unwrap().collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(
        results[1],
        Err(ImportError::Convert(ConvertError::UnknownNestedField { .. }))
    ));
}

#[test]
fn schema_violation_names_the_entity() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_gzip_archive(
        dir.path(),
        r#"<database><people>
            <person handle="_a" id="I1"><name><first>A</first></name></person>
        </people></database>"#,
    );

    let err = import(&archive).unwrap().next().unwrap().unwrap_err();
    match err {
        ImportError::Schema(schema) => {
            assert_eq!(schema.entity_type, EntityType::Person);
            assert_eq!(schema.entity_id, "I1");
            assert_eq!(schema.path, "gender");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn malformed_archive_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_gzip_archive(dir.path(), "<database><people>");

    let err = import(&archive).err().unwrap();
    assert!(matches!(
        err,
        ImportError::Archive(ArchiveError::MalformedArchive(_))
    ));
}

#[test]
fn import_into_commits_every_collection() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_gzip_archive(dir.path(), FAMILY_ARCHIVE);
    let root = dir.path().join("store");

    let mut storage = Storage::open(&root);
    let summary = import_into(&mut storage, &archive).unwrap();
    assert_eq!(summary.total(), 13);
    assert_eq!(summary.written, 13);
    assert_eq!(summary.counts[&EntityType::Person], 6);
    assert_eq!(summary.counts[&EntityType::Place], 2);

    assert!(root.join("people").join("I0003.yaml").exists());
    assert!(root.join("families").join("F0002.yaml").exists());

    let reopened = Storage::open(&root);
    assert_eq!(reopened.all(EntityType::Person).unwrap().len(), 6);
    assert_eq!(reopened.all(EntityType::Event).unwrap().len(), 2);
}

#[test]
fn conflicting_node_shape_commits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_gzip_archive(dir.path(), FAMILY_ARCHIVE);
    let root = dir.path().join("store");
    let mut storage = Storage::open(&root);
    import_into(&mut storage, &good).unwrap();

    let bad = dir.path().join("bad.xml");
    std::fs::write(
        &bad,
        r#"<database><people>
            <person handle="_n" id="I0100"><gender>M</gender><name><first>New</first></name></person>
            <person handle="_z" id="I0101"><gender type="x">M</gender><name><first>Z</first></name></person>
        </people></database>"#,
    )
    .unwrap();

    let err = import_into(&mut storage, &bad).unwrap_err();
    assert!(matches!(
        err,
        ImportError::Convert(ConvertError::ConflictingNodeShape { .. })
    ));
    assert!(!root.join("people").join("I0100.yaml").exists());

    let reopened = Storage::open(&root);
    assert_eq!(reopened.all(EntityType::Person).unwrap().len(), 6);
}

#[test]
fn failed_commit_leaves_no_partial_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_gzip_archive(dir.path(), FAMILY_ARCHIVE);
    let root = dir.path().join("store");
    std::fs::create_dir_all(root.join("places").join("P0001.yaml.tmp")).unwrap();

    let mut storage = Storage::open(&root);
    let err = import_into(&mut storage, &archive).unwrap_err();
    assert!(matches!(err, ImportError::Repo(RepoError::Io { .. })));

    for collection in ["people", "events", "families", "places"] {
        let dir = root.join(collection);
        if !dir.exists() {
            continue;
        }
        let written: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("yaml"))
            .collect();
        assert!(written.is_empty(), "{collection}: {written:?}");
    }
    assert!(storage.all(EntityType::Person).unwrap().is_empty());
    assert_eq!(storage.store(EntityType::Person).pending_count(), 0);

    std::fs::remove_dir(root.join("places").join("P0001.yaml.tmp")).unwrap();
    let summary = import_into(&mut storage, &archive).unwrap();
    assert_eq!(summary.written, 13);
}

#[test]
fn missing_archive_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut storage = Storage::open(dir.path().join("store"));

    let err = import_into(&mut storage, dir.path().join("absent.gramps")).unwrap_err();
    assert!(matches!(err, ImportError::Archive(ArchiveError::Io { .. })));
    assert!(!dir.path().join("store").exists());
}
