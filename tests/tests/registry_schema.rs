//! Schema registration integration tests.
//!
//! Builder invariants, inheritance, collection resolution, and
//! discriminators over the shared fixtures.

use dorm_tests::prelude::*;

mod builder_invariants {
    use super::*;

    #[test]
    fn duplicate_type_names_are_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.add_type("Thing").finish();
        builder.add_type("Thing").finish();
        assert!(matches!(
            builder.build(),
            Err(SchemaError::DuplicateTypeName(_))
        ));
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.add_type("Orphan").parent("Ghost").finish();
        assert!(matches!(
            builder.build(),
            Err(SchemaError::UnknownParentType { .. })
        ));
    }

    #[test]
    fn subtyping_requires_opt_in() {
        let mut builder = RegistryBuilder::new();
        builder.add_type("Sealed").finish();
        builder.add_type("Child").parent("Sealed").finish();
        assert!(matches!(
            builder.build(),
            Err(SchemaError::InheritanceNotAllowed { .. })
        ));
    }

    #[test]
    fn inheritance_cycles_are_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.add_type("A").polymorphic().parent("B").finish();
        builder.add_type("B").polymorphic().parent("A").finish();
        assert!(matches!(
            builder.build(),
            Err(SchemaError::InheritanceCycle(_))
        ));
    }

    #[test]
    fn embedded_types_cannot_declare_storage_concerns() {
        let mut builder = RegistryBuilder::new();
        builder
            .add_type("Fragment")
            .embedded()
            .collection("fragments")
            .finish();
        assert!(matches!(
            builder.build(),
            Err(SchemaError::EmbeddedStorageDeclaration { .. })
        ));
    }

    #[test]
    fn declared_primary_must_use_the_reserved_storage_name() {
        let mut builder = RegistryBuilder::new();
        builder
            .add_type("Odd")
            .field(FieldDef::new("key", FieldKind::Id).storage("pk").primary())
            .finish();
        assert!(matches!(
            builder.build(),
            Err(SchemaError::PrimaryStorageName { .. })
        ));
    }

    #[test]
    fn pull_requires_a_list_site() {
        let mut builder = RegistryBuilder::new();
        builder.add_type("Target").finish();
        builder
            .add_type("Holder")
            .field(FieldDef::new(
                "single",
                FieldKind::Reference {
                    target: "Target".to_string(),
                    delete_rule: DeleteRule::Pull,
                },
            ))
            .finish();
        assert!(matches!(
            builder.build(),
            Err(SchemaError::InvalidDeleteRule { .. })
        ));
    }
}

mod inheritance {
    use super::*;

    #[test]
    fn fields_merge_down_the_chain() {
        let registry = menagerie();
        let dog = registry.get("Dog").unwrap();
        let names: Vec<&str> = dog.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "legs", "breed"]);
    }

    #[test]
    fn root_records_get_an_implicit_id() {
        let registry = menagerie();
        let animal = registry.get("Animal").unwrap();
        let primary = animal.primary_field().unwrap();
        assert_eq!(primary.name, "id");
        assert_eq!(primary.storage_name, "_id");
    }

    #[test]
    fn subtype_relationships_are_transitive() {
        let registry = menagerie();
        assert!(registry.is_same_or_subtype("Dog", "Animal"));
        assert!(registry.is_same_or_subtype("Dog", "Dog"));
        assert!(!registry.is_same_or_subtype("Fish", "Mammal"));
        assert!(registry.is_related("Mammal", "Dog"));
        assert!(!registry.is_related("Fish", "Dog"));
    }
}

mod collections {
    use super::*;

    #[test]
    fn hierarchy_shares_the_root_collection() {
        let registry = menagerie();
        assert_eq!(registry.collection_of("Animal"), Some("animal"));
        assert_eq!(registry.collection_of("Dog"), Some("animal"));
        assert_eq!(registry.collection_of("Fish"), Some("animal"));
    }

    #[test]
    fn configured_names_override_the_default() {
        let registry = blog();
        assert_eq!(registry.collection_of("Post"), Some("posts"));
    }

    #[test]
    fn default_names_are_snake_cased() {
        let mut builder = RegistryBuilder::new();
        builder.add_type("BlogPost").finish();
        let registry = builder.build().unwrap();
        assert_eq!(registry.collection_of("BlogPost"), Some("blog_post"));
    }

    #[test]
    fn embedded_types_have_no_collection() {
        let registry = blog();
        assert_eq!(registry.collection_of("Meta"), None);
    }

    #[test]
    fn abstract_roots_delegate_to_the_first_concrete_type() {
        let mut builder = RegistryBuilder::new();
        builder.add_type("Shape").polymorphic().abstract_type().finish();
        builder.add_type("Circle").parent("Shape").polymorphic().finish();
        builder.add_type("Oval").parent("Circle").finish();
        let registry = builder.build().unwrap();
        assert_eq!(registry.collection_of("Shape"), None);
        assert_eq!(registry.collection_of("Circle"), Some("circle"));
        assert_eq!(registry.collection_of("Oval"), Some("circle"));
    }
}

mod discriminators {
    use super::*;

    #[test]
    fn qualified_names_are_ancestor_chains() {
        let registry = menagerie();
        assert_eq!(registry.qualified_name("Dog"), Some("Animal.Mammal.Dog"));
        assert_eq!(registry.qualified_name("Animal"), Some("Animal"));
    }

    #[test]
    fn discriminator_sets_cover_subtypes() {
        let registry = menagerie();
        let set = registry.discriminator_set("Mammal");
        assert_eq!(set, vec!["Animal.Mammal", "Animal.Mammal.Dog"]);
    }

    #[test]
    fn unknown_tail_segments_fall_back_to_the_nearest_ancestor() {
        let registry = menagerie();
        let resolved = registry
            .resolve_discriminator("Animal.Mammal.Dog.Puppy")
            .unwrap();
        assert_eq!(resolved.name, "Dog");
        assert!(registry.resolve_discriminator("Plant.Tree").is_none());
    }
}

mod reference_sites {
    use super::*;

    #[test]
    fn sites_reach_through_embedded_records() {
        let mut builder = RegistryBuilder::new();
        builder.add_type("User").finish();
        builder
            .add_type("Stamp")
            .embedded()
            .field(FieldDef::new(
                "by",
                FieldKind::Reference {
                    target: "User".to_string(),
                    delete_rule: DeleteRule::Nullify,
                },
            ))
            .finish();
        builder
            .add_type("Ticket")
            .field(FieldDef::new("audit", FieldKind::Embedded("Stamp".to_string())))
            .finish();
        let registry = builder.build().unwrap();

        let sites = registry.reference_sites();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].collection, "ticket");
        assert_eq!(sites[0].path, "audit.by");
        assert_eq!(sites[0].rule, DeleteRule::Nullify);
    }

    #[test]
    fn none_rules_produce_no_sites() {
        let registry = blog();
        assert!(registry.reference_sites().is_empty());
    }
}
