use chrono::NaiveDate;
use polystore::{
    AdapterError, BaseType, Direction, Entity, Key, ModelError, Operator, Property, QueryResult,
    Schema, ValidationError, Value,
};

use crate::fixtures::{context, person_schema};

fn seed(ctx: &polystore::Context) -> Vec<Key> {
    let people = [
        (1, "John", "Doe", 40, vec!["admin"]),
        (2, "Jane", "Doe", 30, vec!["staff", "admin"]),
        (3, "Max", "Roe", 25, vec![]),
        (4, "Ann", "Poe", 35, vec!["staff"]),
    ];
    people
        .into_iter()
        .map(|(id, first, last, age, tags)| {
            let mut person = Entity::with_id(ctx.schema("Person").unwrap(), id)
                .unwrap()
                .with("firstname", first)
                .unwrap()
                .with("lastname", last)
                .unwrap()
                .with("age", age)
                .unwrap()
                .with("tags", tags)
                .unwrap();
            person.put(ctx).unwrap()
        })
        .collect()
}

fn ids(results: &[QueryResult]) -> Vec<Key> {
    results.iter().map(|r| r.key().clone()).collect()
}

#[test]
fn equality_uses_property_index() {
    let (ctx, _) = context();
    ctx.register(person_schema()).unwrap();
    let keys = seed(&ctx);

    let results = ctx.query("Person").unwrap().eq("lastname", "Doe").fetch(&ctx).unwrap();
    assert_eq!(ids(&results), vec![keys[0].clone(), keys[1].clone()]);
}

#[test]
fn repeated_property_matches_any_element() {
    let (ctx, _) = context();
    ctx.register(person_schema()).unwrap();
    let keys = seed(&ctx);

    let results = ctx.query("Person").unwrap().eq("tags", "staff").fetch(&ctx).unwrap();
    assert_eq!(ids(&results), vec![keys[1].clone(), keys[3].clone()]);
}

#[test]
fn range_filter_order_and_window() {
    let (ctx, _) = context();
    ctx.register(person_schema()).unwrap();
    let keys = seed(&ctx);

    let results = ctx
        .query("Person")
        .unwrap()
        .filter("age", Operator::Ge, 30)
        .order("age", Direction::Descending)
        .fetch(&ctx)
        .unwrap();
    assert_eq!(
        ids(&results),
        vec![keys[0].clone(), keys[3].clone(), keys[1].clone()]
    );

    let window = ctx
        .query("Person")
        .unwrap()
        .order("age", Direction::Ascending)
        .offset(1)
        .limit(2)
        .fetch(&ctx)
        .unwrap();
    assert_eq!(ids(&window), vec![keys[1].clone(), keys[3].clone()]);
}

#[test]
fn keys_only_returns_persisted_keys() {
    let (ctx, _) = context();
    ctx.register(person_schema()).unwrap();
    seed(&ctx);

    let results = ctx.query("Person").unwrap().keys_only().fetch(&ctx).unwrap();
    assert_eq!(results.len(), 4);
    for result in results {
        match result {
            QueryResult::Key(key) => assert!(key.is_persisted()),
            QueryResult::Entity(_) => panic!("keys-only query returned an entity"),
        }
    }
}

#[test]
fn filter_values_are_coerced() {
    let (ctx, _) = context();
    ctx.register(
        Schema::new("Meetup")
            .property(Property::new("on", BaseType::Date))
            .property(Property::new("score", BaseType::Float)),
    )
    .unwrap();

    let mut meetup = ctx
        .entity("Meetup")
        .unwrap()
        .with("on", NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
        .unwrap()
        .with("score", 3.0)
        .unwrap();
    let key = meetup.put(&ctx).unwrap();

    let by_date = ctx.query("Meetup").unwrap().eq("on", "2024-05-01").fetch(&ctx).unwrap();
    assert_eq!(ids(&by_date), vec![key.clone()]);

    let by_score = ctx.query("Meetup").unwrap().eq("score", 3).fetch(&ctx).unwrap();
    assert_eq!(ids(&by_score), vec![key]);

    let stored = by_date[0].clone().into_entity().unwrap();
    assert_eq!(stored.get("score"), Some(&Value::Float(3.0)));
}

#[test]
fn negative_zero_matches_zero() {
    let (ctx, _) = context();
    ctx.register(Schema::new("Reading").property(Property::new("delta", BaseType::Float)))
        .unwrap();

    let mut reading = ctx.entity("Reading").unwrap().with("delta", -0.0).unwrap();
    let key = reading.put(&ctx).unwrap();

    let hits = ctx.query("Reading").unwrap().eq("delta", 0.0).fetch(&ctx).unwrap();
    assert_eq!(ids(&hits), vec![key]);
}

#[test]
fn unindexed_property_never_matches() {
    let (ctx, _) = context();
    ctx.register(person_schema()).unwrap();
    let mut person = ctx
        .entity("Person")
        .unwrap()
        .with("lastname", "Doe")
        .unwrap()
        .with("bio", "hidden")
        .unwrap();
    person.put(&ctx).unwrap();

    let results = ctx.query("Person").unwrap().eq("bio", "hidden").fetch(&ctx).unwrap();
    assert!(results.is_empty());
}

#[test]
fn unknown_property_is_rejected() {
    let (ctx, _) = context();
    ctx.register(person_schema()).unwrap();

    let err = ctx
        .query("Person")
        .unwrap()
        .eq("shoe", 42)
        .fetch(&ctx)
        .unwrap_err();
    assert!(matches!(
        err,
        ModelError::Validation(ValidationError::UnknownProperty { .. })
    ));
}

#[test]
fn ancestor_query_covers_descendants_and_self() {
    let (ctx, _) = context();
    ctx.register(person_schema()).unwrap();
    let schema = ctx.schema("Person").unwrap();

    let mut root = Entity::with_id(schema.clone(), "root")
        .unwrap()
        .with("lastname", "Root")
        .unwrap();
    let root_key = root.put(&ctx).unwrap();

    let mut child = Entity::with_key(
        schema.clone(),
        Key::with_parent("Person", "child", &root_key).unwrap(),
    )
    .unwrap()
    .with("lastname", "Child")
    .unwrap();
    let child_key = child.put(&ctx).unwrap();

    let mut grandchild = Entity::with_key(
        schema.clone(),
        Key::with_parent("Person", "grandchild", &child_key).unwrap(),
    )
    .unwrap()
    .with("lastname", "Grandchild")
    .unwrap();
    let grandchild_key = grandchild.put(&ctx).unwrap();

    let mut stranger = Entity::with_id(schema, "stranger")
        .unwrap()
        .with("lastname", "Stranger")
        .unwrap();
    stranger.put(&ctx).unwrap();

    let under_root = ctx.query("Person").unwrap().ancestor(&root_key).fetch(&ctx).unwrap();
    let mut found = ids(&under_root);
    found.sort_by_key(|key| key.len());
    assert_eq!(found, vec![root_key, child_key.clone(), grandchild_key.clone()]);

    let under_child = ctx.query("Person").unwrap().ancestor(&child_key).fetch(&ctx).unwrap();
    let mut found = ids(&under_child);
    found.sort_by_key(|key| key.len());
    assert_eq!(found, vec![child_key, grandchild_key]);
}

#[test]
fn deleted_entities_leave_results() {
    let (ctx, _) = context();
    ctx.register(person_schema()).unwrap();
    let keys = seed(&ctx);

    ctx.delete(&keys[0]).unwrap();
    let results = ctx.query("Person").unwrap().eq("lastname", "Doe").fetch(&ctx).unwrap();
    assert_eq!(ids(&results), vec![keys[1].clone()]);
}

#[test]
fn cache_kind_cannot_be_queried() {
    let (ctx, _) = context();
    ctx.register(person_schema().adapter("cache")).unwrap();

    match ctx.query("Person").unwrap_err() {
        ModelError::Adapter(AdapterError::IndexingUnsupported { adapter, kind }) => {
            assert_eq!(adapter, "cache");
            assert_eq!(kind, "Person");
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = polystore::Query::new("Person").fetch(&ctx).unwrap_err();
    assert!(matches!(
        err,
        ModelError::Adapter(AdapterError::IndexingUnsupported { .. })
    ));
}
