// aggregation_tests.rs
// End-to-end pipeline behavior through a collection

use memdoc_core::{
    doc, Bson, Collection, Database, DivideByZeroPolicy, Document, EngineOptions, MemDocError,
};

/// Collection pre-filled with `docs`
fn collection_with(docs: Vec<Document>) -> Collection {
    let mut coll = Collection::new("test");
    coll.insert_many(docs).unwrap();
    coll
}

/// Run a pipeline that is expected to succeed
fn run(coll: &Collection, pipeline: Bson) -> Vec<Document> {
    coll.aggregate(&pipeline).unwrap()
}

fn people() -> Collection {
    collection_with(vec![
        doc! {"name": "Alice", "age": 25},
        doc! {"name": "Alice", "age": 30},
    ])
}

// ========== $group TESTS ==========

#[test]
fn test_group_first() {
    let out = run(
        &people(),
        Bson::Array(vec![Bson::Document(
            doc! {"$group": {"_id": "$name", "first": {"$first": "$age"}}},
        )]),
    );
    assert_eq!(out, vec![doc! {"_id": "Alice", "first": 25}]);
}

#[test]
fn test_group_last() {
    let out = run(
        &people(),
        Bson::Array(vec![Bson::Document(
            doc! {"$group": {"_id": "$name", "last": {"$last": "$age"}}},
        )]),
    );
    assert_eq!(out, vec![doc! {"_id": "Alice", "last": 30}]);
}

#[test]
fn test_group_max_of_product() {
    let coll = collection_with(vec![doc! {"a": 10, "b": 5}, doc! {"a": 8, "b": 4}]);
    let out = run(
        &coll,
        Bson::Array(vec![Bson::Document(doc! {
            "$group": {"_id": Bson::Null, "max": {"$max": {"$multiply": ["$a", "$b"]}}}
        })]),
    );
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].get("max"), Some(&Bson::Int32(50)));
}

#[test]
fn test_group_count_null_id() {
    let docs: Vec<Document> = (0..7).map(|i| doc! {"i": i}).collect();
    let coll = collection_with(docs);
    let out = run(
        &coll,
        Bson::Array(vec![Bson::Document(
            doc! {"$group": {"_id": Bson::Null, "count": {"$count": {}}}},
        )]),
    );
    assert_eq!(out, vec![doc! {"_id": Bson::Null, "count": 7}]);
}

#[test]
fn test_group_divide_by_zero_rows_skipped() {
    let coll = collection_with(vec![
        doc! {"a": 10, "b": 2},
        doc! {"a": 1, "b": 0},
        doc! {"a": 9, "b": 3},
    ]);
    let pipeline = Bson::Array(vec![Bson::Document(doc! {
        "$group": {"_id": Bson::Null, "max": {"$max": {"$divide": ["$a", "$b"]}}}
    })]);
    let out = run(&coll, pipeline.clone());
    assert_eq!(out[0].get("max"), Some(&Bson::Double(5.0)));

    let mut db = Database::new(
        "strict",
        EngineOptions::new().with_divide_by_zero(DivideByZeroPolicy::Error),
    )
    .unwrap();
    let strict = db.collection("c").unwrap();
    strict
        .insert_many(vec![doc! {"a": 1, "b": 0}])
        .unwrap();
    let err = strict.aggregate(&pipeline).unwrap_err();
    assert!(matches!(err, MemDocError::DivideByZero));
}

// ========== $unwind TESTS ==========

#[test]
fn test_unwind_values() {
    let coll = collection_with(vec![doc! {"_id": 1, "tag": "x", "values": [1, 2, 3]}]);
    let out = run(&coll, Bson::Array(vec![Bson::Document(doc! {"$unwind": "$values"})]));
    assert_eq!(out.len(), 3);
    for (i, doc) in out.iter().enumerate() {
        assert_eq!(doc.get("values"), Some(&Bson::Int32(i as i32 + 1)));
        assert_eq!(doc.get_str("tag").unwrap(), "x");
        assert_eq!(doc.get("_id"), Some(&Bson::Int32(1)));
    }
}

// ========== $skip / $limit TESTS ==========

#[test]
fn test_skip_then_limit_yields_last_document() {
    let k = 4;
    let docs: Vec<Document> = (0..=k).map(|i| doc! {"_id": i}).collect();
    let coll = collection_with(docs);
    let out = run(
        &coll,
        Bson::Array(vec![
            Bson::Document(doc! {"$skip": k}),
            Bson::Document(doc! {"$limit": k}),
        ]),
    );
    assert_eq!(out, vec![doc! {"_id": k}]);
}

// ========== MULTI-STAGE TESTS ==========

#[test]
fn test_match_group_sort_project() {
    let coll = collection_with(vec![
        doc! {"dept": "eng", "salary": 100},
        doc! {"dept": "ops", "salary": 70},
        doc! {"dept": "eng", "salary": 120},
        doc! {"dept": "ops", "salary": 90},
        doc! {"dept": "hr", "salary": 50},
    ]);
    let out = run(
        &coll,
        Bson::Array(vec![
            Bson::Document(doc! {"$match": {"salary": {"$gte": 60}}}),
            Bson::Document(doc! {"$group": {"_id": "$dept", "total": {"$sum": "$salary"}}}),
            Bson::Document(doc! {"$sort": {"total": -1}}),
            Bson::Document(doc! {"$project": {"_id": 0, "dept": "$_id", "total": 1}}),
        ]),
    );
    assert_eq!(
        out,
        vec![doc! {"dept": "eng", "total": 220}, doc! {"dept": "ops", "total": 160}]
    );
}

#[test]
fn test_failing_pipeline_returns_no_partial_results() {
    let coll = people();
    let err = coll
        .aggregate(&Bson::Array(vec![
            Bson::Document(doc! {"$match": {}}),
            Bson::Document(doc! {"$lookup": {"from": "other"}}),
        ]))
        .unwrap_err();
    assert!(matches!(err, MemDocError::UnsupportedStage(_)));
}

#[test]
fn test_aggregate_does_not_touch_store() {
    let coll = people();
    let _ = run(&coll, Bson::Array(vec![Bson::Document(doc! {"$set": {"age": 0}})]));
    assert_eq!(coll.count_documents(&doc! {"age": 0}).unwrap(), 0);
}
