mod common;

use common::{ids, imported_family};
use kinship_core::service::graph::{JoinDirection, ReferenceDecl};
use kinship_core::{
    EntityGraph, EntityType, Filter, GraphError, JoinSpec, PrivateFields, Record, ReferenceMap,
    Storage, Value,
};

fn declared(source: EntityType, target: EntityType, field: &'static str) -> ReferenceDecl {
    ReferenceDecl {
        source,
        target,
        field,
        default: true,
    }
}

#[test]
fn forward_lookup_follows_reference_order() {
    let (_dir, storage) = imported_family();
    let graph = EntityGraph::new(&storage).unwrap();

    let family = graph.get(EntityType::Family, "F0002").unwrap();
    let children = graph.find_related(family, EntityType::Person, None).unwrap();
    assert_eq!(ids(children), vec!["I0005", "I0006"]);

    let father = graph
        .find_related(family, EntityType::Person, Some("father"))
        .unwrap();
    assert_eq!(ids(father), vec!["I0003"]);
}

#[test]
fn dangling_forward_references_yield_nothing() {
    let (_dir, storage) = imported_family();
    let graph = EntityGraph::new(&storage).unwrap();

    let anna = graph.get(EntityType::Person, "I0005").unwrap();
    assert!(graph
        .find_related(anna, EntityType::Citation, None)
        .unwrap()
        .is_empty());
}

#[test]
fn reverse_lookup_returns_each_referrer_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut storage = Storage::open(dir.path());
    let mut event = Record::new();
    event.insert("id", "E1");
    storage.add(EntityType::Event, "E1", event, false).unwrap();

    let mut person = Record::new();
    person.insert("id", "I1");
    for _ in 0..2 {
        person.push("eventref", [("id", "E1")].into_iter().collect::<Record>());
    }
    storage.add(EntityType::Person, "I1", person, false).unwrap();

    let graph = EntityGraph::new(&storage).unwrap();
    let event = graph.get(EntityType::Event, "E1").unwrap();
    let people = graph
        .find_all_referencing(event, EntityType::Person)
        .unwrap();
    assert_eq!(ids(people), vec!["I1"]);
}

#[test]
fn forward_and_reverse_lookups_agree_for_every_declared_reference() {
    let (_dir, storage) = imported_family();
    let graph = EntityGraph::new(&storage).unwrap();

    for reference in graph.references().declarations() {
        for source in storage.all(reference.source).unwrap() {
            let targets = graph
                .find_related(source, reference.target, Some(reference.field))
                .unwrap();
            for target in targets {
                let referrers = graph
                    .find_referencing(
                        reference.target,
                        target.id(),
                        reference.source,
                        Some(reference.field),
                    )
                    .unwrap();
                assert!(
                    ids(referrers).contains(&source.id().to_string()),
                    "{}/{} -> {}/{} via {}",
                    reference.source,
                    source.id(),
                    reference.target,
                    target.id(),
                    reference.field
                );
            }
        }
        for target in storage.all(reference.target).unwrap() {
            let referrers = graph
                .find_referencing(
                    reference.target,
                    target.id(),
                    reference.source,
                    Some(reference.field),
                )
                .unwrap();
            for source in referrers {
                let targets = graph
                    .find_related(source, reference.target, Some(reference.field))
                    .unwrap();
                assert!(ids(targets).contains(&target.id().to_string()));
            }
        }
    }
}

#[test]
fn undeclared_pairs_and_fields_are_rejected() {
    let (_dir, storage) = imported_family();
    let graph = EntityGraph::new(&storage).unwrap();
    let event = graph.get(EntityType::Event, "E0001").unwrap();

    let err = graph
        .find_related(event, EntityType::Family, None)
        .unwrap_err();
    assert!(matches!(err, GraphError::UndeclaredReference { field: None, .. }));

    let err = graph
        .find_related(event, EntityType::Place, Some("description"))
        .unwrap_err();
    assert!(matches!(
        err,
        GraphError::UndeclaredReference { field: Some(ref field), .. } if field == "description"
    ));
}

#[test]
fn several_fields_without_default_are_ambiguous_both_ways() {
    let (_dir, storage) = imported_family();
    let graph = EntityGraph::new(&storage).unwrap();

    let family = graph.get(EntityType::Family, "F0002").unwrap();
    let err = graph
        .find_all_referencing(family, EntityType::Person)
        .unwrap_err();
    assert!(matches!(
        err,
        GraphError::AmbiguousReference { ref fields, .. } if fields == &["childof", "parentin"]
    ));

    let john = graph.get(EntityType::Person, "I0003").unwrap();
    let err = graph
        .find_related(john, EntityType::Family, None)
        .unwrap_err();
    assert!(matches!(err, GraphError::AmbiguousReference { .. }));

    let headed = graph
        .find_referencing(EntityType::Family, "F0002", EntityType::Person, Some("parentin"))
        .unwrap();
    assert_eq!(ids(headed), vec!["I0003", "I0004"]);
}

#[test]
fn join_attaches_forward_and_reverse_relations() {
    let (_dir, storage) = imported_family();
    let graph = EntityGraph::new(&storage).unwrap();

    let plan = graph
        .join_plan(
            EntityType::Event,
            &[
                JoinSpec::Auto(EntityType::Place),
                JoinSpec::Auto(EntityType::Person),
            ],
        )
        .unwrap();
    assert_eq!(plan.steps[1].1, JoinDirection::Reverse("eventref"));

    let joined = graph
        .join(&plan, &Filter::field_equals("type", "Marriage"))
        .unwrap();
    assert_eq!(joined.len(), 1);
    assert_eq!(joined[0].base.id(), "E0002");

    let record = joined[0].to_record();
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["related_places"][0]["id"], "P0002");
    let people: Vec<&str> = json["related_people"]
        .as_array()
        .unwrap()
        .iter()
        .map(|person| person["id"].as_str().unwrap())
        .collect();
    assert_eq!(people, vec!["I0003", "I0004"]);
    assert_eq!(json["type"], "Marriage");
}

#[test]
fn ambiguous_join_fails_at_plan_time() {
    let (_dir, storage) = imported_family();
    let graph = EntityGraph::new(&storage).unwrap();

    let err = graph
        .join_plan(EntityType::Place, &[JoinSpec::Auto(EntityType::Place)])
        .unwrap_err();
    assert!(matches!(err, GraphError::AmbiguousReference { .. }));

    let plan = graph
        .join_plan(
            EntityType::Place,
            &[JoinSpec::Reverse(EntityType::Place, "placeref")],
        )
        .unwrap();
    let joined = graph
        .join(&plan, &Filter::id_in(["P0001"]))
        .unwrap();
    assert_eq!(ids(joined[0].related[0].1.clone()), vec!["P0002"]);
}

#[test]
fn custom_reference_map_is_validated_at_setup() {
    let err = ReferenceMap::new(vec![
        declared(EntityType::Family, EntityType::Person, "father"),
        declared(EntityType::Family, EntityType::Person, "mother"),
    ])
    .unwrap_err();
    assert!(matches!(err, GraphError::AmbiguousReference { .. }));

    let err = ReferenceMap::new(vec![declared(EntityType::Person, EntityType::Event, "gender")])
        .unwrap_err();
    assert!(matches!(err, GraphError::UnindexedReference { field: "gender", .. }));
}

#[test]
fn typed_helpers_reject_wrong_entity_type() {
    let (_dir, storage) = imported_family();
    let graph = EntityGraph::new(&storage).unwrap();
    let event = graph.get(EntityType::Event, "E0001").unwrap();

    let err = graph.ancestors(event).unwrap_err();
    assert!(matches!(
        err,
        GraphError::WrongEntityType {
            expected: EntityType::Person,
            actual: EntityType::Event
        }
    ));
}

#[test]
fn public_join_masks_private_records_only() {
    let dir = tempfile::tempdir().unwrap();
    let mut storage = Storage::open(dir.path());
    let mut place = Record::new();
    place.insert("id", "P1");
    place.insert("ptitle", "Lviv");
    storage.add(EntityType::Place, "P1", place, false).unwrap();

    let mut event = Record::new();
    event.insert("id", "E1");
    event.insert("type", "Adopted");
    event.insert("priv", Value::Bool(true));
    event.insert("place", [("id", "P1")].into_iter().collect::<Record>());
    storage.add(EntityType::Event, "E1", event, false).unwrap();

    let graph = EntityGraph::new(&storage).unwrap();
    let plan = graph
        .join_plan(EntityType::Event, &[JoinSpec::Auto(EntityType::Place)])
        .unwrap();
    let joined = graph.join(&plan, &Filter::All).unwrap();

    let public = joined[0].to_public_record(PrivateFields::Hide);
    assert_eq!(public.text("id"), Some("E1"));
    assert_eq!(public.text("type"), Some("[private]"));
    assert!(!public.contains_key("place"));
    let places = public.get("related_places").unwrap().as_list().unwrap();
    assert_eq!(places[0].as_record().unwrap().text("ptitle"), Some("Lviv"));

    assert_eq!(joined[0].to_record().text("type"), Some("Adopted"));
}
