//! Integration tests for entities stored through a Context.

mod fixtures;
mod queries;

use std::sync::Arc;

use fixtures::{context, context_with, person_schema, Flaky, Offline, ReadOnly};
use polystore::{
    Adapter, AdapterError, Config, Context, DictOptions, Entity, IndexEntry, Key, KeyId,
    ModelError, Raw, Schema, ToDict, ToJson, Urlsafe, ValidationError, Value, KEY_FIELD,
};

#[test]
fn person_scenario() {
    let (ctx, _) = context();
    ctx.register(person_schema()).unwrap();

    let mut person = ctx.entity("Person").unwrap().with("firstname", "John").unwrap();
    let err = person.put(&ctx).unwrap_err();
    assert!(matches!(
        err,
        ModelError::Validation(ValidationError::Required { ref property, .. }) if property == "lastname"
    ));
    assert!(!person.key().is_complete());

    person.set("lastname", "Doe").unwrap();
    let key = person.put(&ctx).unwrap();
    assert!(key.is_complete());
    assert!(person.is_persisted());

    let loaded = ctx.get(&key).unwrap().unwrap();
    assert_eq!(loaded.get("firstname"), Some(&Value::from("John")));
    assert_eq!(loaded.get("lastname"), Some(&Value::from("Doe")));
    assert_eq!(loaded.get("age"), Some(&Value::Int(18)));
    assert_eq!(loaded.get("tags"), Some(&Value::List(vec![])));
    assert!(loaded.key().is_persisted());
}

#[test]
fn load_accepts_every_key_form() {
    let (ctx, _) = context();
    ctx.register(person_schema()).unwrap();

    let mut person = Entity::with_id(ctx.schema("Person").unwrap(), "jdoe")
        .unwrap()
        .with("lastname", "Doe")
        .unwrap();
    let key = person.put(&ctx).unwrap();
    let (raw, _) = key.flatten_joined();
    let urlsafe = key.urlsafe().unwrap();

    assert!(Entity::load(&ctx, "Person", &key).unwrap().is_some());
    assert!(Entity::load(&ctx, "Person", "jdoe").unwrap().is_some());
    assert!(Entity::load(&ctx, "Person", Raw(&raw)).unwrap().is_some());
    assert!(Entity::load(&ctx, "Person", Urlsafe(&urlsafe)).unwrap().is_some());
    assert!(Entity::load(&ctx, "Person", "nobody").unwrap().is_none());
}

#[test]
fn ancestry_scenario() {
    let (ctx, _) = context();
    ctx.register(Schema::new("Org")).unwrap();
    ctx.register(person_schema()).unwrap();

    let org = Key::new("Org", "acme").unwrap();
    let mut alice = Entity::with_key(
        ctx.schema("Person").unwrap(),
        Key::with_parent("Person", "alice", &org).unwrap(),
    )
    .unwrap()
    .with("lastname", "Liddell")
    .unwrap();

    let key = alice.put(&ctx).unwrap();
    assert_eq!(key.parent(), Some(&org));

    let decoded = Key::from_urlsafe(&key.urlsafe().unwrap()).unwrap();
    let loaded = ctx.get(&decoded).unwrap().unwrap();
    assert_eq!(loaded.key(), &key);
    assert_eq!(loaded.key().parent(), Some(&org));
}

#[test]
fn allocated_id_lands_in_key() {
    let (ctx, mem) = context();
    ctx.register(person_schema()).unwrap();

    let mut first = ctx.entity("Person").unwrap().with("lastname", "A").unwrap();
    let mut second = ctx.entity("Person").unwrap().with("lastname", "B").unwrap();
    let a = first.put(&ctx).unwrap();
    let b = second.put(&ctx).unwrap();

    assert_eq!(a.id(), Some(&KeyId::Int(1)));
    assert_eq!(b.id(), Some(&KeyId::Int(2)));
    assert_eq!(mem.stats("Person").unwrap().pointer, 2);
}

#[test]
fn explicit_max_id_exhausts_allocation() {
    let (ctx, mem) = context();
    ctx.register(person_schema()).unwrap();

    let mut last = Entity::with_id(ctx.schema("Person").unwrap(), i64::MAX)
        .unwrap()
        .with("lastname", "Last")
        .unwrap();
    last.put(&ctx).unwrap();

    let mut fresh = ctx.entity("Person").unwrap().with("lastname", "Next").unwrap();
    let err = fresh.put(&ctx).unwrap_err();
    assert!(matches!(err, ModelError::Adapter(AdapterError::Storage(_))));
    assert!(!fresh.key().is_complete());
    assert_eq!(mem.global_count().unwrap(), 1);
    assert_eq!(mem.stats("Person").unwrap().pointer, i64::MAX);
}

#[test]
fn explicit_ids_on_cache_are_not_reallocated() {
    let (ctx, _) = context();
    ctx.register(person_schema().adapter("cache")).unwrap();

    let mut explicit = Entity::with_id(ctx.schema("Person").unwrap(), 1)
        .unwrap()
        .with("lastname", "Explicit")
        .unwrap();
    let taken = explicit.put(&ctx).unwrap();

    let mut fresh = ctx.entity("Person").unwrap().with("lastname", "Fresh").unwrap();
    let allocated = fresh.put(&ctx).unwrap();

    assert_eq!(allocated.id(), Some(&KeyId::Int(2)));
    let kept = ctx.get(&taken).unwrap().unwrap();
    assert_eq!(kept.get("lastname"), Some(&Value::from("Explicit")));
}

#[test]
fn failed_overwrite_keeps_record_and_indexes() {
    let (ctx, _) = context();
    let flaky = Flaky::default();
    let handle = flaky.clone();
    ctx.register_adapter("flaky", move |_| Arc::new(handle.clone()) as Arc<dyn Adapter>)
        .unwrap();
    ctx.register(person_schema().adapter("flaky")).unwrap();

    let mut person = Entity::with_id(ctx.schema("Person").unwrap(), 1)
        .unwrap()
        .with("lastname", "Doe")
        .unwrap();
    let key = person.put(&ctx).unwrap();

    flaky.fail_writes(true);
    person.set("lastname", "Roe").unwrap();
    assert!(person.put(&ctx).is_err());
    flaky.fail_writes(false);

    let stored = ctx.get(&key).unwrap().unwrap();
    assert_eq!(stored.get("lastname"), Some(&Value::from("Doe")));

    let doe = IndexEntry::property("Person", "lastname", &Value::from("Doe")).unwrap();
    let roe = IndexEntry::property("Person", "lastname", &Value::from("Roe")).unwrap();
    let (encoded, _) = key.flatten_joined();
    assert_eq!(flaky.inner.indexed(&doe).unwrap(), vec![encoded]);
    assert!(flaky.inner.indexed(&roe).unwrap().is_empty());

    let hits = ctx.query("Person").unwrap().eq("lastname", "Doe").fetch(&ctx).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key(), &key);
}

#[test]
fn put_twice_keeps_one_record() {
    let (ctx, mem) = context();
    ctx.register(person_schema()).unwrap();

    let mut person = Entity::with_id(ctx.schema("Person").unwrap(), 10)
        .unwrap()
        .with("lastname", "Doe")
        .unwrap();
    let key = person.put(&ctx).unwrap();
    person.set("firstname", "Jane").unwrap();
    assert_eq!(person.put(&ctx).unwrap(), key);

    assert_eq!(mem.global_count().unwrap(), 1);
    assert_eq!(mem.stats("Person").unwrap().count, 1);
    let loaded = ctx.get(&key).unwrap().unwrap();
    assert_eq!(loaded, person);
    assert_eq!(loaded.get("firstname"), Some(&Value::from("Jane")));
}

#[test]
fn delete_reports_existence() {
    let (ctx, mem) = context();
    ctx.register(person_schema()).unwrap();

    let mut person = ctx.entity("Person").unwrap().with("lastname", "Doe").unwrap();
    let key = person.put(&ctx).unwrap();

    assert!(person.delete(&ctx).unwrap());
    assert!(ctx.get(&key).unwrap().is_none());
    assert!(!ctx.delete(&key).unwrap());
    assert!(!ctx.delete(&Key::new("Person", 999).unwrap()).unwrap());
    assert_eq!(mem.global_count().unwrap(), 0);
}

#[test]
fn allocated_ranges_are_disjoint() {
    let (ctx, _) = context();
    ctx.register(person_schema()).unwrap();

    let first: Vec<i64> = ctx.allocate_ids("Person", 10).unwrap().collect();
    let second: Vec<i64> = ctx.allocate_ids("Person", 10).unwrap().collect();

    assert_eq!(first.len(), 10);
    assert_eq!(second.len(), 10);
    assert!(first.windows(2).all(|w| w[0] < w[1]));
    assert!(second.windows(2).all(|w| w[0] < w[1]));
    assert!(first.iter().all(|id| !second.contains(id)));
}

#[test]
fn failed_validation_writes_nothing() {
    let (ctx, mem) = context();
    ctx.register(person_schema()).unwrap();

    let mut person = Entity::with_id(ctx.schema("Person").unwrap(), 3)
        .unwrap()
        .with("firstname", "John")
        .unwrap();
    let key = person.key().clone();

    assert!(person.put(&ctx).is_err());
    assert!(ctx.get(&key).unwrap().is_none());
    assert_eq!(mem.global_count().unwrap(), 0);
    assert!(mem.indexed(&IndexEntry::Exists).unwrap().is_empty());
}

#[test]
fn incomplete_key_cannot_be_read_or_deleted() {
    let (ctx, _) = context();
    ctx.register(person_schema()).unwrap();
    let key = Key::incomplete("Person").unwrap();

    assert!(matches!(ctx.get(&key), Err(ModelError::Key(_))));
    assert!(matches!(ctx.delete(&key), Err(ModelError::Key(_))));
}

#[test]
fn overwrite_and_delete_clean_every_index() {
    let (ctx, mem) = context();
    ctx.register(person_schema()).unwrap();

    let mut person = Entity::with_id(ctx.schema("Person").unwrap(), 1)
        .unwrap()
        .with("lastname", "Doe")
        .unwrap()
        .with("tags", vec!["x", "y"])
        .unwrap();
    let key = person.put(&ctx).unwrap();
    let (encoded, _) = key.flatten_joined();

    let doe = IndexEntry::property("Person", "lastname", &Value::from("Doe")).unwrap();
    let roe = IndexEntry::property("Person", "lastname", &Value::from("Roe")).unwrap();
    let tag_x = IndexEntry::property("Person", "tags", &Value::from("x")).unwrap();
    assert_eq!(mem.indexed(&doe).unwrap(), vec![encoded.clone()]);
    assert_eq!(mem.indexed(&tag_x).unwrap(), vec![encoded.clone()]);

    person.set("lastname", "Roe").unwrap();
    person.set("tags", Value::List(vec![])).unwrap();
    person.put(&ctx).unwrap();
    assert!(mem.indexed(&doe).unwrap().is_empty());
    assert!(mem.indexed(&tag_x).unwrap().is_empty());
    assert_eq!(mem.indexed(&roe).unwrap(), vec![encoded.clone()]);

    ctx.delete(&key).unwrap();
    assert!(mem.indexed(&roe).unwrap().is_empty());
    assert!(mem.indexed(&IndexEntry::Exists).unwrap().is_empty());
    assert!(mem
        .indexed(&IndexEntry::Kind("Person".into()))
        .unwrap()
        .is_empty());
}

#[test]
fn unindexed_property_has_no_entry() {
    let (ctx, mem) = context();
    ctx.register(person_schema()).unwrap();

    let mut person = ctx
        .entity("Person")
        .unwrap()
        .with("lastname", "Doe")
        .unwrap()
        .with("bio", "long")
        .unwrap();
    person.put(&ctx).unwrap();

    let bio = IndexEntry::property("Person", "bio", &Value::from("long")).unwrap();
    assert!(mem.indexed(&bio).unwrap().is_empty());
}

#[test]
fn partial_adapter_reports_missing_method() {
    let ctx = Context::default();
    ctx.register_adapter("readonly", |_| Arc::new(ReadOnly) as Arc<dyn Adapter>)
        .unwrap();
    ctx.register(person_schema().adapter("readonly")).unwrap();

    let mut fresh = ctx.entity("Person").unwrap().with("lastname", "Doe").unwrap();
    match fresh.put(&ctx).unwrap_err() {
        ModelError::Adapter(AdapterError::NotImplemented { adapter, method }) => {
            assert_eq!(adapter, "readonly");
            assert_eq!(method, "allocate_ids");
        }
        other => panic!("unexpected error: {other}"),
    }

    let mut named = Entity::with_id(ctx.schema("Person").unwrap(), "x")
        .unwrap()
        .with("lastname", "Doe")
        .unwrap();
    assert!(matches!(
        named.put(&ctx),
        Err(ModelError::Adapter(AdapterError::NotImplemented { method: "put", .. }))
    ));

    let key = Key::new("Person", "x").unwrap();
    assert!(ctx.get(&key).unwrap().is_none());
    assert!(matches!(
        ctx.delete(&key),
        Err(ModelError::Adapter(AdapterError::NotImplemented { method: "delete", .. }))
    ));
}

#[test]
fn unsupported_default_is_skipped() {
    let (ctx, _) = context_with(
        Config::default()
            .with_default_adapter("offline")
            .with_fallbacks(["inmemory"]),
    );
    ctx.register_adapter("offline", |_| Arc::new(Offline) as Arc<dyn Adapter>)
        .unwrap();

    let adapter = ctx.register(person_schema()).unwrap();
    assert_eq!(adapter.name(), "inmemory");
}

#[test]
fn explicit_adapter_override_per_put() {
    let (ctx, mem) = context();
    ctx.register(person_schema()).unwrap();
    let cache = ctx.adapter("cache").unwrap();

    let mut person = Entity::with_id(ctx.schema("Person").unwrap(), 1)
        .unwrap()
        .with("lastname", "Doe")
        .unwrap();
    let key = person.put_with(&ctx, cache.as_ref()).unwrap();

    assert_eq!(mem.global_count().unwrap(), 0);
    assert!(ctx.get(&key).unwrap().is_none());
    assert!(ctx.get_with(&key, cache.as_ref()).unwrap().is_some());
    assert!(person.delete_with(&ctx, cache.as_ref()).unwrap());
}

#[test]
fn to_dict_on_loaded_entity() {
    let (ctx, _) = context();
    ctx.register(person_schema()).unwrap();

    let mut person = ctx
        .entity("Person")
        .unwrap()
        .with("firstname", "John")
        .unwrap()
        .with("lastname", "Doe")
        .unwrap();
    let key = person.put(&ctx).unwrap();
    let loaded = ctx.get(&key).unwrap().unwrap();

    let names = ["firstname", "lastname"];
    let dict = loaded.to_dict(DictOptions::new().include(&names));
    assert_eq!(dict.len(), 2);

    let dict = loaded.to_dict(DictOptions::new().all());
    assert_eq!(dict[KEY_FIELD], Value::Key(key));
    assert_eq!(dict["bio"], Value::Null);

    let json: serde_json::Value = serde_json::from_str(&loaded.to_json().unwrap()).unwrap();
    assert_eq!(json["lastname"], "Doe");
    assert_eq!(json["age"], 18);
}

#[test]
fn config_file_drives_adapter_choice() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "debug = true\n\n[adapters.kinds]\nPerson = \"cache\"").unwrap();

    let ctx = Context::new(Config::from_file(file.path()).unwrap());
    let adapter = ctx.register(person_schema()).unwrap();
    assert_eq!(adapter.name(), "cache");
    assert!(ctx.config().debug);

    let mut person = ctx.entity("Person").unwrap().with("lastname", "Doe").unwrap();
    let key = person.put(&ctx).unwrap();
    assert_eq!(
        ctx.get(&key).unwrap().unwrap().get("lastname"),
        Some(&Value::from("Doe"))
    );
}

#[test]
fn teardown_then_reregister() {
    let (ctx, mem) = context();
    ctx.register(person_schema()).unwrap();
    let mut person = ctx.entity("Person").unwrap().with("lastname", "Doe").unwrap();
    let key = person.put(&ctx).unwrap();

    ctx.teardown().unwrap();
    assert!(matches!(
        ctx.get(&key),
        Err(ModelError::Adapter(AdapterError::UnknownKind(_)))
    ));

    ctx.register(person_schema()).unwrap();
    assert!(ctx.get(&key).unwrap().is_some());

    mem.clear().unwrap();
    assert!(ctx.get(&key).unwrap().is_none());
}
