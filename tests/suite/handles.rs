//! Handle tables and the object registry under cross-thread use.

use std::sync::Arc;
use std::thread;

use hostbridge_engine::types::HandleId;
use hostbridge_engine::{HandleError, HandleTable, ObjectRegistry};

struct EnvHandle {
    name: String,
}

#[test]
fn registry_objects_resolve_from_other_threads() -> anyhow::Result<()> {
    let registry = Arc::new(ObjectRegistry::new());
    let id = registry.register_persistent(Arc::new(EnvHandle {
        name: "main".to_owned(),
    }));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.get::<EnvHandle>(id).map(|env| env.name.clone()))
        })
        .collect();
    for reader in readers {
        let name = reader
            .join()
            .map_err(|_| anyhow::anyhow!("reader panicked"))??;
        assert_eq!(name, "main");
    }

    registry.release::<EnvHandle>(id)?;
    assert!(matches!(
        registry.get::<EnvHandle>(id),
        Err(HandleError::NotFound(found)) if found == id
    ));
    Ok(())
}

#[test]
fn one_shot_consumed_by_exactly_one_racer() {
    let table = Arc::new(HandleTable::new());
    for round in 0..50 {
        let id = table.register_once(round);
        let racers: Vec<_> = (0..4)
            .map(|_| {
                let table = Arc::clone(&table);
                thread::spawn(move || table.lookup_and_consume(id).is_ok())
            })
            .collect();
        let winners = racers
            .into_iter()
            .map(thread::JoinHandle::join)
            .filter(|joined| matches!(joined, Ok(true)))
            .count();
        assert_eq!(winners, 1, "round {round}");
    }
    assert!(table.is_empty());
}

#[test]
fn nil_is_never_registered() {
    let table = HandleTable::new();
    let ids: Vec<HandleId> = (0..100).map(|n| table.register_persistent(n)).collect();
    assert!(ids.iter().all(|id| !id.is_nil()));
    assert!(matches!(
        table.lookup(HandleId::NIL),
        Err(HandleError::NotFound(HandleId::NIL))
    ));
}
