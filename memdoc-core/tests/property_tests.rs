// property_tests.rs
// Property-based checks for ordering, sorting and updates

use std::cmp::Ordering;

use memdoc_core::value_utils::{compare_directed, compare_values, type_rank};
use memdoc_core::{apply_update, doc, get_path, project, Bson, Document, SortSpec};
use proptest::prelude::*;

fn scalar() -> impl Strategy<Value = Bson> {
    prop_oneof![
        any::<i32>().prop_map(Bson::Int32),
        any::<i64>().prop_map(Bson::Int64),
        (-1.0e9f64..1.0e9).prop_map(Bson::Double),
        "[a-z]{0,6}".prop_map(Bson::String),
        any::<bool>().prop_map(Bson::Boolean),
        Just(Bson::Null),
        Just(Bson::MinKey),
        Just(Bson::MaxKey),
    ]
}

fn value() -> impl Strategy<Value = Bson> {
    prop_oneof![
        4 => scalar(),
        1 => prop::collection::vec(scalar(), 0..4).prop_map(Bson::Array),
        1 => ("[a-z]{1,4}", scalar()).prop_map(|(k, v)| {
            let mut d = Document::new();
            d.insert(k, v);
            Bson::Document(d)
        }),
    ]
}

proptest! {
    // ========== Comparator properties ==========

    #[test]
    fn prop_rank_decides_across_types(a in value(), b in value()) {
        let (ra, rb) = (type_rank(Some(&a)), type_rank(Some(&b)));
        prop_assume!(ra != rb);
        let expected = if ra < rb { -1 } else { 1 };
        prop_assert_eq!(compare_directed(Some(&a), Some(&b), false), expected);
        prop_assert_eq!(compare_directed(Some(&a), Some(&b), true), expected);
    }

    #[test]
    fn prop_value_equals_itself(a in value()) {
        prop_assert_eq!(compare_values(&a, &a), Ordering::Equal);
        prop_assert_eq!(compare_directed(Some(&a), Some(&a), true), 0);
    }

    #[test]
    fn prop_comparator_antisymmetric(a in value(), b in value()) {
        prop_assert_eq!(compare_values(&a, &b), compare_values(&b, &a).reverse());
    }

    // ========== Sort properties ==========

    #[test]
    fn prop_sort_is_stable(keys in prop::collection::vec(0i32..4, 0..40)) {
        let mut docs: Vec<Document> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| doc! {"k": *k, "i": i as i64})
            .collect();
        SortSpec::from_document(&doc! {"k": 1}).unwrap().sort_documents(&mut docs);

        for pair in docs.windows(2) {
            let (ka, kb) = (pair[0].get_i32("k").unwrap(), pair[1].get_i32("k").unwrap());
            prop_assert!(ka <= kb);
            if ka == kb {
                prop_assert!(pair[0].get_i64("i").unwrap() < pair[1].get_i64("i").unwrap());
            }
        }
    }

    #[test]
    fn prop_descending_then_ascending_sorts(keys in prop::collection::btree_set(any::<i32>(), 0..30)) {
        // distinct keys in ascending order, shuffled by reversing
        let original: Vec<Document> = keys.iter().map(|k| doc! {"k": *k}).collect();
        let mut docs = original.clone();
        SortSpec::from_document(&doc! {"k": -1}).unwrap().sort_documents(&mut docs);
        SortSpec::from_document(&doc! {"k": 1}).unwrap().sort_documents(&mut docs);
        prop_assert_eq!(docs, original);
    }

    // ========== Update properties ==========

    #[test]
    fn prop_set_is_idempotent(v in value(), extra in scalar()) {
        let update = doc! {"$set": {"x": v}};
        let mut once = doc! {"y": extra};
        apply_update(&mut once, &update, true).unwrap();
        let mut twice = once.clone();
        let changed = apply_update(&mut twice, &update, true).unwrap();
        prop_assert!(!changed);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_unset_then_get_is_absent(v in value(), path in "[a-c](\\.[a-c]){0,2}") {
        let mut doc = Document::new();
        memdoc_core::set_path(&mut doc, &path, v).unwrap();
        let mut fields = Document::new();
        fields.insert(path.clone(), "");
        apply_update(&mut doc, &doc! {"$unset": fields}, true).unwrap();
        prop_assert!(get_path(&doc, &path).is_none());
    }

    // ========== Projection properties ==========

    #[test]
    fn prop_include_projection_keeps_id_and_field(a in scalar(), b in scalar(), c in scalar()) {
        let source = doc! {"_id": 1, "a": a.clone(), "b": b, "c": c};
        let projected = project(&source, &doc! {"a": 1}).unwrap();
        prop_assert_eq!(projected, doc! {"_id": 1, "a": a});
    }
}
