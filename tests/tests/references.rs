//! Reference field integration tests.

use dorm_tests::prelude::*;

fn seeded_post(session: &mut Session<'_, MemoryStore>, registry: &Registry) -> (RecordId, RecordId) {
    let mut author = RecordInstance::new(registry, "Author").unwrap();
    author.set(registry, "email", "ada@example.com").unwrap();
    let author_id = session.insert(&mut author).unwrap();

    let mut post = RecordInstance::new(registry, "Post").unwrap();
    post.set(registry, "title", "news").unwrap();
    post.set(
        registry,
        "author",
        Reference::Unresolved {
            id: author_id,
            target: None,
        },
    )
    .unwrap();
    let post_id = session.insert(&mut post).unwrap();
    (author_id, post_id)
}

mod wire_format {
    use super::*;

    #[test]
    fn typed_references_store_bare_identifiers() {
        let registry = blog();
        let mut session = Session::new(&registry, MemoryStore::new());
        let (author_id, post_id) = seeded_post(&mut session, &registry);

        let doc = session
            .store()
            .find_one("posts", &Filter::eq("_id", post_id))
            .unwrap()
            .unwrap();
        assert_eq!(doc.get("author"), Some(&Value::Id(author_id)));
    }

    #[test]
    fn generic_references_store_an_id_and_type_tag() {
        let registry = blog();
        let mut session = Session::new(&registry, MemoryStore::new());
        let (author_id, _) = seeded_post(&mut session, &registry);

        let mut post = RecordInstance::new(&registry, "Post").unwrap();
        post.set(&registry, "title", "about ada").unwrap();
        post.set(
            &registry,
            "subject",
            Reference::Unresolved {
                id: author_id,
                target: Some("Author".to_string()),
            },
        )
        .unwrap();
        let post_id = session.insert(&mut post).unwrap();

        let doc = session
            .store()
            .find_one("posts", &Filter::eq("_id", post_id))
            .unwrap()
            .unwrap();
        let subject = match doc.get("subject") {
            Some(Value::Map(entries)) => entries,
            other => panic!("unexpected shape: {other:?}"),
        };
        assert_eq!(subject.get("_id"), Some(&Value::Id(author_id)));
        assert_eq!(subject.get("_type"), Some(&Value::String("Author".to_string())));
    }

    #[test]
    fn resolved_references_to_unsaved_records_cannot_serialize() {
        let registry = blog();
        let author = RecordInstance::new(&registry, "Author").unwrap();

        let mut post = RecordInstance::new(&registry, "Post").unwrap();
        post.set(&registry, "title", "news").unwrap();
        post.set(&registry, "author", Reference::Resolved(Box::new(author)))
            .unwrap();

        assert!(to_document(&registry, &post).is_err());
    }
}

mod resolution {
    use super::*;

    #[test]
    fn references_hydrate_unresolved() {
        let registry = blog();
        let mut session = Session::new(&registry, MemoryStore::new());
        let (author_id, post_id) = seeded_post(&mut session, &registry);

        let post = session.get("Post", post_id).unwrap();
        let reference = post.reference("author").unwrap();
        assert!(!reference.is_resolved());
        assert_eq!(reference.id(), Some(author_id));
    }

    #[test]
    fn resolution_caches_on_the_field() {
        let registry = blog();
        let mut session = Session::new(&registry, MemoryStore::new());
        let (_, post_id) = seeded_post(&mut session, &registry);

        let mut post = session.get("Post", post_id).unwrap();
        {
            let author = session.resolve(&mut post, "author").unwrap();
            assert_eq!(
                author.value("email"),
                Some(&Value::String("ada@example.com".to_string()))
            );
        }

        // Second resolution serves the cache; no dirty paths either way.
        assert!(post.reference("author").unwrap().is_resolved());
        session.resolve(&mut post, "author").unwrap();
        assert!(post.is_clean());
    }

    #[test]
    fn generic_references_resolve_through_their_tag() {
        let registry = blog();
        let mut session = Session::new(&registry, MemoryStore::new());
        let (author_id, _) = seeded_post(&mut session, &registry);

        let mut post = RecordInstance::new(&registry, "Post").unwrap();
        post.set(&registry, "title", "about").unwrap();
        post.set(
            &registry,
            "subject",
            Reference::Unresolved {
                id: author_id,
                target: Some("Author".to_string()),
            },
        )
        .unwrap();
        let post_id = session.insert(&mut post).unwrap();

        let mut fetched = session.get("Post", post_id).unwrap();
        let subject = session.resolve(&mut fetched, "subject").unwrap();
        assert_eq!(subject.type_name(), "Author");
        assert_eq!(subject.id(), Some(author_id));
    }

    #[test]
    fn dangling_references_surface_not_found() {
        let registry = blog();
        let session = Session::new(&registry, MemoryStore::new());

        let mut post = RecordInstance::new(&registry, "Post").unwrap();
        post.set(
            &registry,
            "author",
            Reference::Unresolved {
                id: RecordId::new(404),
                target: None,
            },
        )
        .unwrap();

        assert!(matches!(
            session.resolve(&mut post, "author"),
            Err(PersistError::NotFound { .. })
        ));
    }

    #[test]
    fn saving_a_record_never_saves_its_resolved_references() {
        let registry = blog();
        let mut session = Session::new(&registry, MemoryStore::new());
        let (author_id, post_id) = seeded_post(&mut session, &registry);

        let mut post = session.get("Post", post_id).unwrap();
        session.resolve(&mut post, "author").unwrap();
        post.set(&registry, "title", "updated").unwrap();
        session.save(&mut post).unwrap();

        // The author's stored document is untouched.
        let author = session.get("Author", author_id).unwrap();
        assert_eq!(
            author.value("email"),
            Some(&Value::String("ada@example.com".to_string()))
        );
        let doc = session
            .store()
            .find_one("posts", &Filter::eq("_id", post_id))
            .unwrap()
            .unwrap();
        assert_eq!(doc.get("author"), Some(&Value::Id(author_id)));
    }
}
