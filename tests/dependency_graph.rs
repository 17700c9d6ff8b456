//! Integration tests for dependency edges: leaf-last destruction, lazily
//! discovered edges, and cycles.

mod common;

use common::Tester;
use handle_lifecycle::{LifecycleError, LifecycleRegistry};

#[test]
fn test_simple_dependency_dispose_leaf_last() {
    let registry = LifecycleRegistry::new();
    let obj = Tester::new(&registry, &[]);
    let obj2 = Tester::new(&registry, &[obj.handle]);

    obj.dispose(&registry);
    assert!(!obj.destroyed());
    assert!(!obj2.destroyed());

    obj2.dispose(&registry);
    obj.assert_destroyed_once();
    obj2.assert_destroyed_once();
}

#[test]
fn test_dependent_destroyed_before_dependency() {
    let registry = LifecycleRegistry::new();
    let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));

    for (handle, deps) in [(1usize, vec![]), (2, vec![1])] {
        let order = order.clone();
        registry
            .register(
                handle,
                handle_lifecycle::Callbacks::destroy(move |h: &usize| order.lock().unwrap().push(*h)),
                deps,
            )
            .unwrap();
    }

    registry.unregister(1).unwrap();
    registry.unregister(2).unwrap();
    assert_eq!(*order.lock().unwrap(), vec![2, 1]);
}

#[test]
fn test_multiple_dependencies_dispose_leaf_last() {
    let registry = LifecycleRegistry::new();
    let obj = Tester::new(&registry, &[]);
    let obj2 = Tester::new(&registry, &[]);
    let obj3 = Tester::new(&registry, &[obj.handle, obj2.handle]);

    obj.dispose(&registry);
    obj2.dispose(&registry);
    assert!(!obj.destroyed());
    assert!(!obj2.destroyed());
    assert!(!obj3.destroyed());

    obj3.dispose(&registry);
    obj.assert_destroyed_once();
    obj2.assert_destroyed_once();
    obj3.assert_destroyed_once();
}

#[test]
fn test_linear_hierarchy_dispose_leaf_last() {
    let registry = LifecycleRegistry::new();
    let obj = Tester::new(&registry, &[]);
    let obj2 = Tester::new(&registry, &[obj.handle]);
    let obj3 = Tester::new(&registry, &[obj2.handle]);

    obj.dispose(&registry);
    obj2.dispose(&registry);
    assert!(!obj.destroyed());
    assert!(!obj2.destroyed());
    assert!(!obj3.destroyed());

    obj3.dispose(&registry);
    obj.assert_destroyed_once();
    obj2.assert_destroyed_once();
    obj3.assert_destroyed_once();
}

#[test]
fn test_diamond_dispose_leaf_last() {
    let registry = LifecycleRegistry::new();
    let obj = Tester::new(&registry, &[]);
    let obj2 = Tester::new(&registry, &[obj.handle]);
    let obj3 = Tester::new(&registry, &[obj.handle]);
    let obj4 = Tester::new(&registry, &[obj3.handle, obj2.handle]);

    obj.dispose(&registry);
    obj2.dispose(&registry);
    obj3.dispose(&registry);
    assert!(!obj.destroyed());
    assert!(!obj2.destroyed());
    assert!(!obj3.destroyed());
    assert!(!obj4.destroyed());

    obj4.dispose(&registry);
    for o in [&obj, &obj2, &obj3, &obj4] {
        o.assert_destroyed_once();
    }
    assert!(registry.is_empty());
}

#[test]
fn test_diamond_random_disposal_order() {
    let registry = LifecycleRegistry::new();
    let obj = Tester::new(&registry, &[]);
    let obj2 = Tester::new(&registry, &[obj.handle]);
    let obj3 = Tester::new(&registry, &[obj.handle]);
    let obj4 = Tester::new(&registry, &[obj3.handle, obj2.handle]);

    obj4.dispose(&registry);
    assert!(obj4.destroyed());
    assert!(!obj.destroyed());
    assert!(!obj2.destroyed());
    assert!(!obj3.destroyed());

    obj2.dispose(&registry);
    assert!(obj2.destroyed());
    assert!(!obj.destroyed());
    assert!(!obj3.destroyed());

    obj3.dispose(&registry);
    assert!(obj3.destroyed());
    assert!(!obj.destroyed());

    obj.dispose(&registry);
    for o in [&obj, &obj2, &obj3, &obj4] {
        o.assert_destroyed_once();
    }
}

#[test]
fn test_refcount_accounts_for_every_edge() {
    let registry = LifecycleRegistry::new();
    let leaf = Tester::new(&registry, &[]);
    let a = Tester::new(&registry, &[leaf.handle]);
    let b = Tester::new(&registry, &[leaf.handle]);
    assert_eq!(registry.ref_count(&leaf.handle), Some(3));

    registry.add_dependency(a.handle, b.handle).unwrap();
    registry.add_dependency(a.handle, b.handle).unwrap();
    assert_eq!(registry.ref_count(&b.handle), Some(2));

    registry.remove_dependency(a.handle, b.handle).unwrap();
    assert_eq!(registry.ref_count(&b.handle), Some(1));
    assert_eq!(registry.dependencies_of(&a.handle), Some(vec![leaf.handle]));
}

#[test]
fn test_lazily_discovered_dependency() {
    let registry = LifecycleRegistry::new();
    let device = Tester::new(&registry, &[]);
    let texture = Tester::new(&registry, &[]);
    registry.add_dependency(texture.handle, device.handle).unwrap();

    device.dispose(&registry);
    assert!(!device.destroyed());

    texture.dispose(&registry);
    device.assert_destroyed_once();
    texture.assert_destroyed_once();
}

#[test]
fn test_remove_dependency_errors() {
    let registry = LifecycleRegistry::new();
    let a = Tester::new(&registry, &[]);
    let b = Tester::new(&registry, &[]);

    assert_eq!(
        registry.remove_dependency(a.handle, b.handle),
        Err(LifecycleError::DependencyNotFound {
            handle: a.handle,
            dependency: b.handle
        })
    );
    assert_eq!(
        registry.remove_dependency(a.handle, 0),
        Err(LifecycleError::ObjectNotFound(0))
    );
    assert_eq!(
        registry.add_dependency(0, b.handle),
        Err(LifecycleError::ObjectNotFound(0))
    );
}

#[test]
fn test_cycle_requires_explicit_break() {
    let registry = LifecycleRegistry::new();
    let a = Tester::new(&registry, &[]);
    let b = Tester::new(&registry, &[a.handle]);
    let c = Tester::new(&registry, &[b.handle]);
    registry.add_dependency(a.handle, c.handle).unwrap();

    c.dispose(&registry);
    a.dispose(&registry);
    b.dispose(&registry);
    assert!(!a.destroyed());
    assert!(!b.destroyed());
    assert!(!c.destroyed());
    assert_eq!(registry.len(), 3);

    registry.remove_dependency(a.handle, c.handle).unwrap();
    a.assert_destroyed_once();
    b.assert_destroyed_once();
    c.assert_destroyed_once();
    assert!(registry.is_empty());
}

#[test]
fn test_self_dependency_is_a_cycle() {
    let registry = LifecycleRegistry::new();
    let a = Tester::new(&registry, &[]);
    registry.add_dependency(a.handle, a.handle).unwrap();

    a.dispose(&registry);
    assert!(!a.destroyed());

    registry.remove_dependency(a.handle, a.handle).unwrap();
    a.assert_destroyed_once();
}
