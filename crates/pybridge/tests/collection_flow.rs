//! Collection proxy integration tests: keyed and positional walks,
//! resolution precedence, and specialized dispatch against a scripted
//! worker.

#[cfg(test)]
mod tests {
    use pybridge::{
        CallArgs, Collection, Error, FromHandle, GenericOp, ItemKey, ObjectRef, Resolution,
        SpecializedTable,
        testutils::{ScriptTable, scripted_session, shutdown_session},
        wire::RawValue,
    };

    struct Material {
        handle: ObjectRef,
    }

    impl FromHandle for Material {
        fn from_handle(handle: ObjectRef) -> Self {
            Self { handle }
        }
    }

    fn keyed_script() -> ScriptTable {
        ScriptTable::new()
            .answer(
                "list(obj.items.keys())",
                RawValue::List(vec![
                    RawValue::Str("a".to_string()),
                    RawValue::Str("b".to_string()),
                ]),
            )
            .answer("len(obj.items)", RawValue::Int(2))
    }

    #[tokio::test]
    async fn keyed_collection_walk() {
        let (session, worker) = scripted_session(keyed_script());
        let items = Collection::new(session.root("obj.items").unwrap());

        assert_eq!(items.length().await.unwrap(), 2);
        assert_eq!(items.keys().await.unwrap(), vec!["a", "b"]);

        // Element handles compose locally, in key order.
        let values = items.values().await.unwrap();
        let expressions = values.iter().map(|v| v.expression()).collect::<Vec<_>>();
        assert_eq!(expressions, vec!["obj.items.get(\"a\")", "obj.items.get(\"b\")"]);

        let pairs = items.items().await.unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0, ItemKey::Key("a".to_string()));
        assert_eq!(pairs[0].1.expression(), "obj.items.get(\"a\")");
        assert_eq!(pairs[1].0, ItemKey::Key("b".to_string()));
        assert_eq!(pairs[1].1.expression(), "obj.items.get(\"b\")");

        shutdown_session(session, worker).await;
    }

    #[tokio::test]
    async fn find_answers_with_a_sentinel_not_an_error() {
        let (session, worker) = scripted_session(keyed_script());
        let items = Collection::new(session.root("obj.items").unwrap());

        assert_eq!(items.find("b").await.unwrap(), 1);
        assert_eq!(items.find("zzz").await.unwrap(), -1);
        assert!(!session.is_closed());

        shutdown_session(session, worker).await;
    }

    #[tokio::test]
    async fn positional_collection_falls_back_to_remote_enumeration() {
        let script = ScriptTable::new()
            .answer("list(obj.nodes.keys())", RawValue::List(vec![]))
            .answer(
                "list(obj.nodes.values())",
                RawValue::List(vec![
                    RawValue::Ref("obj.nodes[0]".to_string()),
                    RawValue::Ref("obj.nodes[1]".to_string()),
                ]),
            );
        let (session, worker) = scripted_session(script);
        let nodes = Collection::new(session.root("obj.nodes").unwrap());

        let values = nodes.values().await.unwrap();
        let expressions = values.iter().map(|v| v.expression()).collect::<Vec<_>>();
        assert_eq!(expressions, vec!["obj.nodes[0]", "obj.nodes[1]"]);

        // Positional pairs carry 0-based indices, in the same order as the
        // values walk.
        let pairs = nodes.items().await.unwrap();
        assert_eq!(pairs[0].0, ItemKey::Index(0));
        assert_eq!(pairs[1].0, ItemKey::Index(1));

        assert_eq!(nodes.find("anything").await.unwrap(), -1);

        shutdown_session(session, worker).await;
    }

    #[tokio::test]
    async fn element_access_never_touches_the_wire() {
        // The script answers nothing: any remote call would come back as a
        // ScriptError failure and fail the assertions below.
        let (session, worker) = scripted_session(ScriptTable::new());
        let items = Collection::new(session.root("obj.items").unwrap());

        assert_eq!(items.get("a").expression(), "obj.items.get(\"a\")");
        assert_eq!(items.get(3).expression(), "obj.items[3]");

        let material: Material = items.get_as("a");
        assert_eq!(material.handle.expression(), "obj.items.get(\"a\")");

        shutdown_session(session, worker).await;
    }

    #[tokio::test]
    async fn generic_names_win_over_specialized_and_data() {
        let table = SpecializedTable::new()
            .remote_method("get")
            .remote_method("add");
        let (session, worker) = scripted_session(ScriptTable::new());
        let items = Collection::with_table(session.root("obj.items").unwrap(), table);

        // "get" stays generic even though the table registers it, so element
        // access still composes locally without a round trip.
        assert_eq!(items.resolve("get"), Resolution::Generic(GenericOp::Get));
        assert_eq!(items.get("get").expression(), "obj.items.get(\"get\")");

        assert_eq!(items.resolve("add"), Resolution::Specialized);
        assert_eq!(
            items.resolve("a"),
            Resolution::Item(ItemKey::Key("a".to_string()))
        );

        let err = items
            .call_specialized("get", CallArgs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotImplemented(_)), "{err:?}");

        shutdown_session(session, worker).await;
    }

    #[tokio::test]
    async fn specialized_dispatch_calls_the_remote_method() {
        let script = ScriptTable::new().answer(
            "obj.nodes.add(name=\"n1\")",
            RawValue::Ref("obj.nodes[2]".to_string()),
        );
        let table = SpecializedTable::new().remote_method("add");
        let (session, worker) = scripted_session(script);
        let nodes = Collection::with_table(session.root("obj.nodes").unwrap(), table);

        let payload = nodes
            .call_specialized("add", CallArgs::new().arg("name", "n1"))
            .await
            .unwrap();
        assert_eq!(payload, RawValue::Ref("obj.nodes[2]".to_string()));

        shutdown_session(session, worker).await;
    }

    #[tokio::test]
    async fn bulk_accessors_fail_fast() {
        let (session, worker) = scripted_session(ScriptTable::new());
        let items = Collection::new(session.root("obj.items").unwrap());

        assert!(matches!(
            items.foreach_get("name").await.unwrap_err(),
            Error::NotImplemented("foreach_get")
        ));
        assert!(matches!(
            items.foreach_set("name", &[]).await.unwrap_err(),
            Error::NotImplemented("foreach_set")
        ));

        shutdown_session(session, worker).await;
    }
}
