//! Dirty tracking and delta computation integration tests.

use dorm_tests::prelude::*;

mod dirty_tracking {
    use super::*;

    #[test]
    fn assignment_marks_even_when_the_value_is_unchanged() {
        let registry = blog();
        let mut post = RecordInstance::new(&registry, "Post").unwrap();
        post.set(&registry, "title", "news").unwrap();
        post.clear_changes_deep();

        post.set(&registry, "title", "news").unwrap();
        assert!(!post.is_clean());
    }

    #[test]
    fn nested_changes_propagate_with_storage_prefixes() {
        let registry = blog();
        let mut post = RecordInstance::new(&registry, "Post").unwrap();
        let meta = RecordInstance::new(&registry, "Meta").unwrap();
        post.set(&registry, "meta", meta).unwrap();
        post.clear_changes_deep();

        {
            let mut meta = post.embedded_mut(&registry, "meta").unwrap();
            meta.set(&registry, "revision", 2).unwrap();
        }

        let paths: Vec<&str> = post.changed_paths().collect();
        assert_eq!(paths, vec!["meta.revision"]);
    }

    #[test]
    fn replacing_the_parent_collapses_nested_paths() {
        let registry = blog();
        let mut post = RecordInstance::new(&registry, "Post").unwrap();
        let meta = RecordInstance::new(&registry, "Meta").unwrap();
        post.set(&registry, "meta", meta).unwrap();
        post.clear_changes_deep();

        {
            let mut meta = post.embedded_mut(&registry, "meta").unwrap();
            meta.set(&registry, "revision", 2).unwrap();
        }
        let replacement = RecordInstance::new(&registry, "Meta").unwrap();
        post.set(&registry, "meta", replacement).unwrap();

        let paths: Vec<&str> = post.changed_paths().collect();
        assert_eq!(paths, vec!["meta"]);
    }

    #[test]
    fn container_mutations_mark_the_whole_field() {
        let registry = blog();
        let mut post = RecordInstance::new(&registry, "Post").unwrap();
        {
            let mut keywords = post.list_mut(&registry, "keywords").unwrap();
            keywords.push("rust");
            keywords.push("odm");
        }

        let paths: Vec<&str> = post.changed_paths().collect();
        assert_eq!(paths, vec!["keywords"]);
    }

    #[test]
    fn read_only_container_access_stays_clean() {
        let registry = blog();
        let mut post = RecordInstance::new(&registry, "Post").unwrap();
        {
            let mut keywords = post.list_mut(&registry, "keywords").unwrap();
            keywords.push("rust");
        }
        post.clear_changes_deep();

        {
            let keywords = post.list_mut(&registry, "keywords").unwrap();
            assert_eq!(keywords.len(), 1);
        }
        assert!(post.is_clean());
    }
}

mod delta_computation {
    use super::*;

    #[test]
    fn sub_path_deltas_leave_siblings_alone() {
        let registry = blog();
        let mut post = RecordInstance::new(&registry, "Post").unwrap();
        let mut meta = RecordInstance::new(&registry, "Meta").unwrap();
        meta.set(&registry, "editor", "ada").unwrap();
        meta.set(&registry, "revision", 1).unwrap();
        post.set(&registry, "meta", meta).unwrap();
        post.clear_changes_deep();

        {
            let mut meta = post.embedded_mut(&registry, "meta").unwrap();
            meta.set(&registry, "revision", 2).unwrap();
        }

        let delta = compute_delta(&registry, &post).unwrap();
        assert_eq!(delta.set.get("meta.revision"), Some(&Value::Int(2)));
        assert!(!delta.set.contains_key("meta"));
        assert!(!delta.set.contains_key("meta.editor"));
        assert!(delta.unset.is_empty());
    }

    #[test]
    fn empty_collections_become_unsets() {
        let registry = blog();
        let mut post = RecordInstance::new(&registry, "Post").unwrap();
        {
            let mut keywords = post.list_mut(&registry, "keywords").unwrap();
            keywords.push("rust");
        }
        post.clear_changes_deep();

        {
            let mut keywords = post.list_mut(&registry, "keywords").unwrap();
            keywords.clear();
        }

        let delta = compute_delta(&registry, &post).unwrap();
        assert!(delta.set.is_empty());
        assert!(delta.unset.contains("keywords"));
    }
}

mod idempotence {
    use super::*;

    #[test]
    fn applying_a_delta_twice_leaves_the_document_unchanged() {
        let registry = blog();
        let mut store = MemoryStore::new();

        let mut post = RecordInstance::new(&registry, "Post").unwrap();
        post.set(&registry, "title", "first").unwrap();
        let mut meta = RecordInstance::new(&registry, "Meta").unwrap();
        meta.set(&registry, "editor", "ada").unwrap();
        post.set(&registry, "meta", meta).unwrap();
        {
            let mut keywords = post.list_mut(&registry, "keywords").unwrap();
            keywords.push("rust");
        }
        let id = store
            .insert("posts", to_document(&registry, &post).unwrap())
            .unwrap();
        post.set_id(id);
        post.clear_changes_deep();

        // One delta covering a set, a nested sub-path set, and an unset.
        post.set(&registry, "title", "second").unwrap();
        {
            let mut meta = post.embedded_mut(&registry, "meta").unwrap();
            meta.set(&registry, "revision", 2).unwrap();
        }
        {
            let mut keywords = post.list_mut(&registry, "keywords").unwrap();
            keywords.clear();
        }
        let delta = compute_delta(&registry, &post).unwrap();

        store.update("posts", id, &delta.set, &delta.unset).unwrap();
        let once = store
            .find_one("posts", &Filter::eq("_id", id))
            .unwrap()
            .unwrap();

        store.update("posts", id, &delta.set, &delta.unset).unwrap();
        let twice = store
            .find_one("posts", &Filter::eq("_id", id))
            .unwrap()
            .unwrap();

        assert_eq!(once, twice);
    }
}

mod save_path {
    use super::*;

    #[test]
    fn save_writes_only_changed_paths() {
        let registry = blog();
        let mut session = Session::new(&registry, MemoryStore::new());

        let mut post = RecordInstance::new(&registry, "Post").unwrap();
        post.set(&registry, "title", "first").unwrap();
        let mut meta = RecordInstance::new(&registry, "Meta").unwrap();
        meta.set(&registry, "editor", "ada").unwrap();
        post.set(&registry, "meta", meta).unwrap();
        let id = session.insert(&mut post).unwrap();

        {
            let mut meta = post.embedded_mut(&registry, "meta").unwrap();
            meta.set(&registry, "revision", 3).unwrap();
        }
        session.save(&mut post).unwrap();
        assert!(post.is_clean());

        let stored = session.get("Post", id).unwrap();
        let meta = stored.embedded("meta").unwrap();
        assert_eq!(meta.value("editor"), Some(&Value::String("ada".to_string())));
        assert_eq!(meta.value("revision"), Some(&Value::Int(3)));
    }

    #[test]
    fn empty_collection_save_round_trips_as_absent() {
        let registry = blog();
        let mut session = Session::new(&registry, MemoryStore::new());

        let mut post = RecordInstance::new(&registry, "Post").unwrap();
        post.set(&registry, "title", "first").unwrap();
        {
            let mut keywords = post.list_mut(&registry, "keywords").unwrap();
            keywords.push("rust");
        }
        let id = session.insert(&mut post).unwrap();

        {
            let mut keywords = post.list_mut(&registry, "keywords").unwrap();
            keywords.clear();
        }
        session.save(&mut post).unwrap();

        // The cleared list is indistinguishable from a never-set one.
        let stored = session.get("Post", id).unwrap();
        assert_eq!(stored.get("keywords"), None);
    }

    #[test]
    fn save_clears_changes_recursively() {
        let registry = blog();
        let mut session = Session::new(&registry, MemoryStore::new());

        let mut post = RecordInstance::new(&registry, "Post").unwrap();
        post.set(&registry, "title", "first").unwrap();
        let meta = RecordInstance::new(&registry, "Meta").unwrap();
        post.set(&registry, "meta", meta).unwrap();
        session.insert(&mut post).unwrap();

        {
            let mut meta = post.embedded_mut(&registry, "meta").unwrap();
            meta.set(&registry, "revision", 1).unwrap();
        }
        session.save(&mut post).unwrap();

        assert!(post.is_clean());
        assert!(post.embedded("meta").unwrap().is_clean());
    }
}
