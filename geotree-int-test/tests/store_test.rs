//! Store contract tests, run identically against both backends.

use std::sync::Arc;

use geotree::{
    DiskNodeStore, Envelope, MemoryNodeStore, NodeId, NodeStore, SpatialError, TreeMetadata,
};
use geotree_int_test::test_util::init_logging;

fn with_both_backends(test: impl Fn(Arc<dyn NodeStore>)) {
    init_logging();

    test(Arc::new(MemoryNodeStore::new()));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("contract.gtree");
    test(Arc::new(DiskNodeStore::create(&path).unwrap()));
}

#[test]
fn test_node_lifecycle_contract() {
    with_both_backends(|store| {
        let root = store.create_node().unwrap();
        let a = store.create_node().unwrap();
        let b = store.create_node().unwrap();

        store.add_child(root, a).unwrap();
        store.add_child(root, b).unwrap();

        assert!(!store.is_leaf(root).unwrap());
        assert!(store.is_leaf(a).unwrap());
        assert_eq!(store.children(root).unwrap(), vec![a, b]);
        assert_eq!(store.parent(a).unwrap(), Some(root));

        store.remove_child(root, a).unwrap();
        assert_eq!(store.children(root).unwrap(), vec![b]);
        assert_eq!(store.parent(a).unwrap(), None);

        store.delete_node(b).unwrap();
        assert!(store.children(root).unwrap().is_empty());
        assert!(store.is_leaf(root).unwrap());
    });
}

#[test]
fn test_dangling_node_handle_is_corrupt_tree() {
    with_both_backends(|store| {
        let node = store.create_node().unwrap();
        store.delete_node(node).unwrap();
        assert!(matches!(
            store.children(node).unwrap_err(),
            SpatialError::CorruptTree(_)
        ));
    });
}

#[test]
fn test_bounding_box_contract() {
    with_both_backends(|store| {
        let node = store.create_node().unwrap();
        assert_eq!(store.bounding_box(node).unwrap(), None);

        let bbox = Envelope::rect(-3.0, -4.0, 5.0, 6.0).unwrap();
        store.set_bounding_box(node, &bbox).unwrap();
        assert_eq!(store.bounding_box(node).unwrap(), Some(bbox.clone()));

        let grown = bbox.union(&Envelope::from_point(&[100.0, 100.0]));
        store.set_bounding_box(node, &grown).unwrap();
        assert_eq!(store.bounding_box(node).unwrap(), Some(grown));

        store.clear_bounding_box(node).unwrap();
        assert_eq!(store.bounding_box(node).unwrap(), None);
    });
}

#[test]
fn test_reference_contract() {
    with_both_backends(|store| {
        let leaf = store.create_node().unwrap();
        let record = store.create_record(&[1.0, 2.0, 3.0, 4.0]).unwrap();

        assert!(store.record_exists(record).unwrap());
        assert_eq!(store.record_data(record).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(store.reference_holder(record).unwrap(), None);

        store.add_reference(leaf, record).unwrap();
        assert_eq!(store.reference_holder(record).unwrap(), Some(leaf));
        assert_eq!(store.references(leaf).unwrap(), vec![record]);

        // a record can be referenced by at most one leaf
        let other = store.create_node().unwrap();
        assert!(store.add_reference(other, record).is_err());

        store.remove_reference(leaf, record).unwrap();
        assert_eq!(store.reference_holder(record).unwrap(), None);

        store.delete_record(record).unwrap();
        assert!(!store.record_exists(record).unwrap());
        assert!(matches!(
            store.record_data(record).unwrap_err(),
            SpatialError::NotFound(_)
        ));
    });
}

#[test]
fn test_delete_referenced_record_detaches_leaf() {
    with_both_backends(|store| {
        let leaf = store.create_node().unwrap();
        let record = store.create_record(&[0.0, 0.0]).unwrap();
        store.add_reference(leaf, record).unwrap();

        store.delete_record(record).unwrap();
        assert!(store.references(leaf).unwrap().is_empty());
    });
}

#[test]
fn test_metadata_contract() {
    with_both_backends(|store| {
        assert_eq!(store.read_metadata().unwrap(), None);

        let meta = TreeMetadata {
            root: Some(NodeId(1)),
            max_node_references: 64,
            total_count: 9,
        };
        store.write_metadata(&meta).unwrap();
        assert_eq!(store.read_metadata().unwrap(), Some(meta.clone()));

        let updated = TreeMetadata {
            total_count: 10,
            ..meta
        };
        store.write_metadata(&updated).unwrap();
        assert_eq!(store.read_metadata().unwrap(), Some(updated));

        store.clear_metadata().unwrap();
        assert_eq!(store.read_metadata().unwrap(), None);
    });
}

#[test]
fn test_disk_store_survives_reopen_mid_structure() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("structure.gtree");

    let (root, leaf, record);
    {
        let store = DiskNodeStore::create(&path).unwrap();
        root = store.create_node().unwrap();
        leaf = store.create_node().unwrap();
        store.add_child(root, leaf).unwrap();
        record = store.create_record(&[7.0, 8.0]).unwrap();
        store.add_reference(leaf, record).unwrap();
        store
            .set_bounding_box(root, &Envelope::rect(0.0, 0.0, 10.0, 10.0).unwrap())
            .unwrap();
        store.close().unwrap();
    }

    let store = DiskNodeStore::open(&path).unwrap();
    assert_eq!(store.children(root).unwrap(), vec![leaf]);
    assert_eq!(store.parent(leaf).unwrap(), Some(root));
    assert_eq!(store.references(leaf).unwrap(), vec![record]);
    assert_eq!(store.reference_holder(record).unwrap(), Some(leaf));
    assert_eq!(
        store.bounding_box(root).unwrap(),
        Some(Envelope::rect(0.0, 0.0, 10.0, 10.0).unwrap())
    );
}
