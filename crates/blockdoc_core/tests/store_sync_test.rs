//! Integration tests for replicating a block store between peers

#[cfg(test)]
mod store_sync_tests {
    use std::sync::Arc;

    use blockdoc_core::BlockDocError;
    use blockdoc_core::props::{PropValue, Props, props_from};
    use blockdoc_core::schema::SchemaRegistry;
    use blockdoc_core::snapshot;
    use blockdoc_core::store::{AutoIncrementIdGenerator, BlockStore, MemoryStorage, UpdateOrigin};
    use blockdoc_core::text::RichText;

    /// A replica whose ids cannot collide with another peer's.
    fn peer(prefix: &str) -> BlockStore {
        BlockStore::new(
            Arc::new(SchemaRegistry::with_builtin_flavours()),
            Arc::new(MemoryStorage::new()),
        )
        .with_id_generator(Arc::new(AutoIncrementIdGenerator::with_prefix(prefix)))
    }

    /// Exchange missing updates in both directions.
    fn sync(a: &BlockStore, b: &BlockStore) {
        let to_b = a.encode_diff(&b.encode_state_vector()).unwrap();
        let to_a = b.encode_diff(&a.encode_state_vector()).unwrap();
        b.apply_update(&to_b, UpdateOrigin::Remote).unwrap();
        a.apply_update(&to_a, UpdateOrigin::Remote).unwrap();
    }

    fn paragraph(store: &BlockStore, text: &str) -> String {
        store
            .create_node(
                "affine:paragraph",
                props_from([("text", PropValue::from(RichText::from_plain(text)))]),
                &[],
            )
            .unwrap()
    }

    fn sorted_ids(store: &BlockStore) -> Vec<String> {
        let mut ids = store.ids();
        ids.sort();
        ids
    }

    #[test]
    fn test_peers_converge_after_exchange() {
        let a = peer("a:");
        let b = peer("b:");

        let first = paragraph(&a, "from a");
        let note = a.create_node("affine:note", Props::new(), &[first]).unwrap();
        sync(&a, &b);

        let second = paragraph(&b, "from b");
        b.attach(&note, &second, 1).unwrap();
        sync(&a, &b);

        assert_eq!(sorted_ids(&a), sorted_ids(&b));
        assert_eq!(
            snapshot::encode(&a, &note).unwrap(),
            snapshot::encode(&b, &note).unwrap()
        );
        assert_eq!(a.children(&note).unwrap().len(), 2);
    }

    #[test]
    fn test_concurrent_moves_leave_one_parent() {
        let a = peer("a:");
        let b = peer("b:");

        let left = a.create_node("affine:note", Props::new(), &[]).unwrap();
        let right = a.create_node("affine:note", Props::new(), &[]).unwrap();
        let moving = paragraph(&a, "moving");
        sync(&a, &b);

        a.attach(&left, &moving, 0).unwrap();
        b.attach(&right, &moving, 0).unwrap();
        sync(&a, &b);
        sync(&a, &b);

        for store in [&a, &b] {
            let listings = [&left, &right]
                .iter()
                .filter(|parent| store.children(parent).unwrap().contains(&moving))
                .count();
            assert_eq!(listings, 1);
        }
        assert_eq!(a.children(&left).unwrap(), b.children(&left).unwrap());
        assert_eq!(a.children(&right).unwrap(), b.children(&right).unwrap());
    }

    #[test]
    fn test_concurrent_opposite_moves_leave_a_tree() {
        let a = peer("a:");
        let b = peer("b:");

        let note = a.create_node("affine:note", Props::new(), &[]).unwrap();
        let first = paragraph(&a, "first");
        let second = paragraph(&a, "second");
        a.attach(&note, &first, 0).unwrap();
        a.attach(&note, &second, 1).unwrap();
        sync(&a, &b);

        a.attach(&first, &second, 0).unwrap();
        b.attach(&second, &first, 0).unwrap();
        sync(&a, &b);
        sync(&a, &b);

        // Both moves left the note; the loop is cut at the smaller id, which
        // then heads its own subtree.
        for store in [&a, &b] {
            assert!(store.children(&note).unwrap().is_empty());
            assert_eq!(store.children(&first).unwrap(), vec![second.clone()]);
            assert!(store.children(&second).unwrap().is_empty());
            assert_eq!(store.roots(), vec![note.clone(), first.clone()]);
            assert_eq!(snapshot::encode(store, &first).unwrap().node_count(), 2);
        }
        assert_eq!(
            snapshot::encode(&a, &first).unwrap(),
            snapshot::encode(&b, &first).unwrap()
        );
    }

    #[test]
    fn test_concurrent_three_way_loop_is_broken() {
        let a = peer("a:");
        let b = peer("b:");
        let c = peer("c:");

        let x = paragraph(&a, "x");
        let y = paragraph(&a, "y");
        let z = paragraph(&a, "z");
        sync(&a, &b);
        sync(&a, &c);

        a.attach(&x, &y, 0).unwrap();
        b.attach(&y, &z, 0).unwrap();
        c.attach(&z, &x, 0).unwrap();
        for _ in 0..2 {
            sync(&a, &b);
            sync(&b, &c);
            sync(&a, &c);
        }

        for store in [&a, &b, &c] {
            let roots = store.roots();
            assert_eq!(roots.len(), 1);
            assert_eq!(snapshot::encode(store, &roots[0]).unwrap().node_count(), 3);
        }
        assert_eq!(a.roots(), c.roots());
    }

    #[test]
    fn test_concurrent_delete_drops_dangling_child() {
        let a = peer("a:");
        let b = peer("b:");

        let doomed = paragraph(&a, "doomed");
        let note = a.create_node("affine:note", Props::new(), &[doomed.clone()]).unwrap();
        sync(&a, &b);

        a.delete_node(&doomed).unwrap();
        b.update_props(
            &doomed,
            props_from([("text", PropValue::from(RichText::from_plain("edited")))]),
        )
        .unwrap();
        sync(&a, &b);
        sync(&a, &b);

        assert_eq!(a.children(&note).unwrap(), b.children(&note).unwrap());
        for child in a.children(&note).unwrap() {
            assert!(a.has(&child));
        }
    }

    #[test]
    fn test_unknown_child_leaves_store_unchanged() {
        let store = peer("x:");
        let before = store.node_count();

        let err = store
            .create_node("affine:note", Props::new(), &["missing".to_string()])
            .unwrap_err();

        assert!(matches!(err, BlockDocError::InvalidChildReference { .. }));
        assert_eq!(store.node_count(), before);
    }

    #[test]
    fn test_observed_updates_replay_on_peer() {
        let a = peer("a:");
        let b = peer("b:");
        let updates = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&updates);
        let _subscription = a
            .observe_updates(move |update| sink.lock().unwrap().push(update.to_vec()))
            .unwrap();

        let id = paragraph(&a, "live");
        for update in updates.lock().unwrap().iter() {
            b.apply_update(update, UpdateOrigin::Remote).unwrap();
        }

        assert_eq!(
            b.get(&id).unwrap().text().unwrap().plain_text(),
            "live"
        );
    }
}
