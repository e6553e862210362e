//! List, paging, projection and query source integration tests.

mod common;

use common::{Patient, PatientName, repo, seed_patients};
use helios_docstore::error::{StorageError, ValidationError};
use helios_docstore::query::field;
use helios_docstore::{ListOptions, Projection, Sort};

fn names(patients: &[Patient]) -> Vec<&str> {
    patients.iter().map(|p| p.name.as_str()).collect()
}

// ============================================================================
// Paging
// ============================================================================

#[tokio::test]
async fn test_list_all_in_insertion_order() {
    let repo = repo();
    seed_patients(&repo, 3).await;

    let all = repo.list::<Patient>(ListOptions::new()).await.unwrap();
    assert_eq!(names(&all), vec!["p0", "p1", "p2"]);
}

#[tokio::test]
async fn test_list_skip_and_take_returns_page() {
    let repo = repo();
    seed_patients(&repo, 3).await;

    let page = repo
        .list::<Patient>(ListOptions::new().skip(1).take(1))
        .await
        .unwrap();
    assert_eq!(names(&page), vec!["p1"]);
}

#[tokio::test]
async fn test_list_single_bound_does_not_page() {
    let repo = repo();
    seed_patients(&repo, 3).await;

    let skipped = repo
        .list::<Patient>(ListOptions::new().skip(1))
        .await
        .unwrap();
    assert_eq!(skipped.len(), 3);

    let taken = repo
        .list::<Patient>(ListOptions::new().take(1))
        .await
        .unwrap();
    assert_eq!(taken.len(), 3);
}

#[tokio::test]
async fn test_list_page_past_end_is_empty() {
    let repo = repo();
    seed_patients(&repo, 3).await;

    let page = repo
        .list::<Patient>(ListOptions::new().page(5, 2))
        .await
        .unwrap();
    assert!(page.is_empty());
}

#[tokio::test]
async fn test_list_take_zero_means_unbounded() {
    let repo = repo();
    seed_patients(&repo, 3).await;

    let page = repo
        .list::<Patient>(ListOptions::new().page(1, 0))
        .await
        .unwrap();
    assert_eq!(names(&page), vec!["p1", "p2"]);
}

// ============================================================================
// Filter, sort, projection
// ============================================================================

#[tokio::test]
async fn test_list_with_filter_and_sort() {
    let repo = repo();
    seed_patients(&repo, 5).await;

    let result = repo
        .list::<Patient>(
            ListOptions::new()
                .filter(field("age").between(10, 30))
                .sort(Sort::descending("age")),
        )
        .await
        .unwrap();
    assert_eq!(names(&result), vec!["p3", "p2", "p1"]);
}

#[tokio::test]
async fn test_list_with_composite_filter() {
    let repo = repo();
    seed_patients(&repo, 5).await;

    let filter = field("name")
        .eq("p0")
        .or(field("age").gte(40))
        .and(field("name").ne("p9"));
    let result = repo
        .list::<Patient>(ListOptions::new().filter(filter))
        .await
        .unwrap();
    assert_eq!(names(&result), vec!["p0", "p4"]);
}

#[tokio::test]
async fn test_list_with_typed_filter() {
    let repo = repo();
    seed_patients(&repo, 4).await;

    let result = repo
        .list::<Patient>(ListOptions::new().filter(Patient::AGE.lt(&20)))
        .await
        .unwrap();
    assert_eq!(names(&result), vec!["p0", "p1"]);

    let result = repo
        .list::<Patient>(ListOptions::new().filter(Patient::AGE.is_in([&0, &30])))
        .await
        .unwrap();
    assert_eq!(names(&result), vec!["p0", "p3"]);
}

#[tokio::test]
async fn test_list_as_projection() {
    let repo = repo();
    seed_patients(&repo, 2).await;

    let projected = repo
        .list_as::<Patient, PatientName>(
            ListOptions::new().projection(Projection::include(["name"])),
        )
        .await
        .unwrap();
    assert_eq!(
        projected,
        vec![
            PatientName {
                name: "p0".to_string()
            },
            PatientName {
                name: "p1".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_list_with_exclusion_projection_into_entity_fails_to_decode() {
    let repo = repo();
    seed_patients(&repo, 1).await;

    let result = repo
        .list::<Patient>(ListOptions::new().projection(Projection::exclude(["age"])))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_list_rejects_array_index_projection() {
    let repo = repo();
    seed_patients(&repo, 2).await;

    let err = repo
        .list_as::<Patient, serde_json::Value>(
            ListOptions::new().projection(Projection::include(["name.0"])),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::Validation(ValidationError::InvalidProjection { .. })
    ));
}

// ============================================================================
// Query source
// ============================================================================

#[tokio::test]
async fn test_query_source_composes_filters() {
    let repo = repo();
    seed_patients(&repo, 6).await;

    let query = repo
        .query::<Patient>()
        .filter(field("age").gte(10))
        .filter(field("age").lt(50))
        .sort(Sort::descending("age"));

    assert_eq!(query.collection_name(), "patients");
    assert_eq!(names(&query.to_list().await.unwrap()), vec!["p4", "p3", "p2", "p1"]);
    assert_eq!(query.count().await.unwrap(), 4);
    assert_eq!(query.first().await.unwrap().unwrap().name, "p4");
}

#[tokio::test]
async fn test_query_source_skip_limit_and_count() {
    let repo = repo();
    seed_patients(&repo, 5).await;

    let query = repo.query::<Patient>().skip(1).limit(3);
    assert_eq!(names(&query.to_list().await.unwrap()), vec!["p1", "p2", "p3"]);
    assert_eq!(query.count().await.unwrap(), 3);

    let tail = repo.query::<Patient>().skip(4).limit(3);
    assert_eq!(tail.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_query_source_projection() {
    let repo = repo();
    seed_patients(&repo, 2).await;

    let projected: Vec<PatientName> = repo
        .query::<Patient>()
        .project(Projection::include(["name"]))
        .filter(field("name").eq("p1"))
        .to_list_as()
        .await
        .unwrap();
    assert_eq!(
        projected,
        vec![PatientName {
            name: "p1".to_string()
        }]
    );
}

#[tokio::test]
async fn test_query_source_empty_collection() {
    let repo = repo();
    let query = repo.query::<Patient>();
    assert!(query.to_list().await.unwrap().is_empty());
    assert!(query.first().await.unwrap().is_none());
    assert_eq!(query.count().await.unwrap(), 0);
}
