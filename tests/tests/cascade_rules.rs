//! Cascading delete integration tests.

use dorm_tests::prelude::*;

/// User <- Post(author, rule) <- Comment(post, rule2) chain with the
/// given rules on each hop.
fn chain_registry(author_rule: DeleteRule, post_rule: DeleteRule) -> Registry {
    let mut builder = RegistryBuilder::new();
    builder
        .add_type("User")
        .field(FieldDef::new("name", FieldKind::String))
        .finish();
    builder
        .add_type("Post")
        .field(FieldDef::new("title", FieldKind::String))
        .field(FieldDef::new(
            "author",
            FieldKind::Reference {
                target: "User".to_string(),
                delete_rule: author_rule,
            },
        ))
        .finish();
    builder
        .add_type("Comment")
        .field(FieldDef::new("text", FieldKind::String))
        .field(FieldDef::new(
            "post",
            FieldKind::Reference {
                target: "Post".to_string(),
                delete_rule: post_rule,
            },
        ))
        .finish();
    builder.build().unwrap()
}

fn typed_ref(id: RecordId) -> Reference {
    Reference::Unresolved { id, target: None }
}

fn seed_chain(
    session: &mut Session<'_, MemoryStore>,
    registry: &Registry,
) -> (RecordId, RecordId, RecordId) {
    let mut user = RecordInstance::new(registry, "User").unwrap();
    user.set(registry, "name", "ada").unwrap();
    let user_id = session.insert(&mut user).unwrap();

    let mut post = RecordInstance::new(registry, "Post").unwrap();
    post.set(registry, "title", "news").unwrap();
    post.set(registry, "author", typed_ref(user_id)).unwrap();
    let post_id = session.insert(&mut post).unwrap();

    let mut comment = RecordInstance::new(registry, "Comment").unwrap();
    comment.set(registry, "text", "nice").unwrap();
    comment.set(registry, "post", typed_ref(post_id)).unwrap();
    let comment_id = session.insert(&mut comment).unwrap();

    (user_id, post_id, comment_id)
}

mod single_hop {
    use super::*;

    #[test]
    fn deny_refuses_while_references_exist() {
        let registry = chain_registry(DeleteRule::Deny, DeleteRule::None);
        let mut session = Session::new(&registry, MemoryStore::new());
        let (user_id, post_id, _) = seed_chain(&mut session, &registry);

        assert!(matches!(
            session.delete_by_id("User", user_id),
            Err(PersistError::ReferentialIntegrity { .. })
        ));

        // Remove the referencing post; the delete now goes through.
        session.delete_by_id("Post", post_id).unwrap();
        let outcome = session.delete_by_id("User", user_id).unwrap();
        assert_eq!(outcome.deleted, 1);
    }

    #[test]
    fn nullify_clears_references_and_keeps_holders() {
        let registry = chain_registry(DeleteRule::Nullify, DeleteRule::None);
        let mut session = Session::new(&registry, MemoryStore::new());
        let (user_id, post_id, _) = seed_chain(&mut session, &registry);

        let outcome = session.delete_by_id("User", user_id).unwrap();
        assert_eq!(outcome, DeleteOutcome { deleted: 1, nullified: 1, pulled: 0 });

        let post = session.get("Post", post_id).unwrap();
        assert!(post.reference("author").is_none());
    }

    #[test]
    fn deleting_an_unknown_id_is_not_found() {
        let registry = chain_registry(DeleteRule::None, DeleteRule::None);
        let mut session = Session::new(&registry, MemoryStore::new());

        assert!(matches!(
            session.delete_by_id("User", RecordId::new(41)),
            Err(PersistError::NotFound { .. })
        ));
    }
}

mod transitive {
    use super::*;

    #[test]
    fn cascade_follows_the_whole_chain() {
        let registry = chain_registry(DeleteRule::Cascade, DeleteRule::Cascade);
        let mut session = Session::new(&registry, MemoryStore::new());
        let (user_id, post_id, comment_id) = seed_chain(&mut session, &registry);

        let outcome = session.delete_by_id("User", user_id).unwrap();
        assert_eq!(outcome.deleted, 3);
        assert!(session.get("Post", post_id).is_err());
        assert!(session.get("Comment", comment_id).is_err());
    }

    #[test]
    fn a_deny_behind_a_cascade_aborts_everything() {
        let registry = chain_registry(DeleteRule::Cascade, DeleteRule::Deny);
        let mut session = Session::new(&registry, MemoryStore::new());
        let (user_id, post_id, comment_id) = seed_chain(&mut session, &registry);

        // The post would cascade, but its comment denies. Nothing moves.
        assert!(matches!(
            session.delete_by_id("User", user_id),
            Err(PersistError::ReferentialIntegrity { .. })
        ));
        assert!(session.get("User", user_id).is_ok());
        assert!(session.get("Post", post_id).is_ok());
        assert!(session.get("Comment", comment_id).is_ok());
    }

    #[test]
    fn nullify_behind_a_cascade_touches_survivors_only() {
        let registry = chain_registry(DeleteRule::Cascade, DeleteRule::Nullify);
        let mut session = Session::new(&registry, MemoryStore::new());
        let (user_id, _, comment_id) = seed_chain(&mut session, &registry);

        let outcome = session.delete_by_id("User", user_id).unwrap();
        assert_eq!(outcome.deleted, 2);
        assert_eq!(outcome.nullified, 1);

        let comment = session.get("Comment", comment_id).unwrap();
        assert!(comment.reference("post").is_none());
    }

    #[test]
    fn mutual_cascades_terminate() {
        let mut builder = RegistryBuilder::new();
        builder
            .add_type("Left")
            .field(FieldDef::new(
                "other",
                FieldKind::GenericReference {
                    delete_rule: DeleteRule::Cascade,
                },
            ))
            .finish();
        builder
            .add_type("Right")
            .field(FieldDef::new(
                "other",
                FieldKind::GenericReference {
                    delete_rule: DeleteRule::Cascade,
                },
            ))
            .finish();
        let registry = builder.build().unwrap();
        let mut session = Session::new(&registry, MemoryStore::new());

        let mut left = RecordInstance::new(&registry, "Left").unwrap();
        let left_id = session.insert(&mut left).unwrap();
        let mut right = RecordInstance::new(&registry, "Right").unwrap();
        right
            .set(
                &registry,
                "other",
                Reference::Unresolved {
                    id: left_id,
                    target: Some("Left".to_string()),
                },
            )
            .unwrap();
        let right_id = session.insert(&mut right).unwrap();
        left.set(
            &registry,
            "other",
            Reference::Unresolved {
                id: right_id,
                target: Some("Right".to_string()),
            },
        )
        .unwrap();
        session.save(&mut left).unwrap();

        let outcome = session.delete_by_id("Left", left_id).unwrap();
        assert_eq!(outcome.deleted, 2);
    }
}

mod pull_lists {
    use super::*;

    fn playlist_registry() -> Registry {
        let mut builder = RegistryBuilder::new();
        builder
            .add_type("Song")
            .field(FieldDef::new("title", FieldKind::String))
            .finish();
        builder
            .add_type("Playlist")
            .field(FieldDef::new("name", FieldKind::String))
            .field(FieldDef::new(
                "songs",
                FieldKind::List(Box::new(FieldKind::Reference {
                    target: "Song".to_string(),
                    delete_rule: DeleteRule::Pull,
                })),
            ))
            .finish();
        builder.build().unwrap()
    }

    #[test]
    fn pull_removes_only_the_doomed_identifier() {
        let registry = playlist_registry();
        let mut session = Session::new(&registry, MemoryStore::new());

        let mut keep = RecordInstance::new(&registry, "Song").unwrap();
        keep.set(&registry, "title", "keep").unwrap();
        let keep_id = session.insert(&mut keep).unwrap();

        let mut doomed = RecordInstance::new(&registry, "Song").unwrap();
        doomed.set(&registry, "title", "drop").unwrap();
        let doomed_id = session.insert(&mut doomed).unwrap();

        let mut playlist = RecordInstance::new(&registry, "Playlist").unwrap();
        playlist.set(&registry, "name", "mix").unwrap();
        {
            let mut songs = playlist.list_mut(&registry, "songs").unwrap();
            songs.push(typed_ref(keep_id));
            songs.push(typed_ref(doomed_id));
        }
        let playlist_id = session.insert(&mut playlist).unwrap();

        let outcome = session.delete_by_id("Song", doomed_id).unwrap();
        assert_eq!(outcome, DeleteOutcome { deleted: 1, nullified: 0, pulled: 1 });

        let playlist = session.get("Playlist", playlist_id).unwrap();
        match playlist.get("songs") {
            Some(FieldValue::List(items)) => {
                assert_eq!(items.len(), 1);
                match &items[0] {
                    FieldValue::Ref(reference) => assert_eq!(reference.id(), Some(keep_id)),
                    other => panic!("unexpected element: {other:?}"),
                }
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn pulling_the_last_element_unsets_the_list() {
        let registry = playlist_registry();
        let mut session = Session::new(&registry, MemoryStore::new());

        let mut song = RecordInstance::new(&registry, "Song").unwrap();
        song.set(&registry, "title", "only").unwrap();
        let song_id = session.insert(&mut song).unwrap();

        let mut playlist = RecordInstance::new(&registry, "Playlist").unwrap();
        playlist.set(&registry, "name", "mix").unwrap();
        {
            let mut songs = playlist.list_mut(&registry, "songs").unwrap();
            songs.push(typed_ref(song_id));
        }
        let playlist_id = session.insert(&mut playlist).unwrap();

        session.delete_by_id("Song", song_id).unwrap();
        let playlist = session.get("Playlist", playlist_id).unwrap();
        assert_eq!(playlist.get("songs"), None);
    }
}

mod polymorphic_targets {
    use super::*;

    #[test]
    fn a_site_declared_on_the_base_fires_for_subtypes() {
        let mut builder = RegistryBuilder::new();
        builder
            .add_type("Animal")
            .polymorphic()
            .field(FieldDef::new("name", FieldKind::String))
            .finish();
        builder
            .add_type("Dog")
            .parent("Animal")
            .finish();
        builder
            .add_type("Sighting")
            .field(FieldDef::new(
                "animal",
                FieldKind::Reference {
                    target: "Animal".to_string(),
                    delete_rule: DeleteRule::Cascade,
                },
            ))
            .finish();
        let registry = builder.build().unwrap();
        let mut session = Session::new(&registry, MemoryStore::new());

        let mut dog = RecordInstance::new(&registry, "Dog").unwrap();
        dog.set(&registry, "name", "rex").unwrap();
        let dog_id = session.insert(&mut dog).unwrap();

        let mut sighting = RecordInstance::new(&registry, "Sighting").unwrap();
        sighting.set(&registry, "animal", typed_ref(dog_id)).unwrap();
        let sighting_id = session.insert(&mut sighting).unwrap();

        let outcome = session.delete_by_id("Dog", dog_id).unwrap();
        assert_eq!(outcome.deleted, 2);
        assert!(session.get("Sighting", sighting_id).is_err());
    }
}
