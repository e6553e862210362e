//! Shared-repository concurrency and command log tests.

mod common;

use std::sync::Arc;

use common::{Patient, Tag, repo, repo_with_client};
use helios_docstore::backends::memory::MemoryClient;
use helios_docstore::query::field;
use helios_docstore::{DataRepository, ListOptions, Repository, UpdateSpec, WriteOptions};

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_repository_is_shareable() {
    assert_send_sync::<Repository>();
    assert_send_sync::<helios_docstore::DbContext>();
}

fn assert_send<T: Send>() {}

#[test]
fn test_session_can_move_between_tasks() {
    assert_send::<helios_docstore::Session>();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_through_one_repository() {
    let repo = repo();

    let tasks: Vec<_> = (0..16u32)
        .map(|i| {
            let repo = repo.clone();
            tokio::spawn(async move {
                let patients: Vec<Patient> = (0..10)
                    .map(|j| Patient::new(&format!("t{i}-{j}"), i))
                    .collect();
                for patient in &patients {
                    repo.add(patient).await?;
                }
                Ok::<_, helios_docstore::StorageError>(patients.len())
            })
        })
        .collect();

    let mut added = 0;
    for task in tasks {
        added += task.await.unwrap().unwrap();
    }
    assert_eq!(added, 160);
    assert_eq!(repo.count::<Patient>(None).await.unwrap(), 160);
    assert_eq!(
        repo.count::<Patient>(Some(field("age").eq(3))).await.unwrap(),
        10
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_increments_are_not_lost() {
    let repo = repo();
    let patient = Patient::new("counter", 0);
    repo.add(&patient).await.unwrap();

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let repo = repo.clone();
            let patient = patient.clone();
            tokio::spawn(async move {
                repo.update_one(&patient, &UpdateSpec::new().inc("age", 1))
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let stored = repo.get::<Patient>(&patient.id).await.unwrap().unwrap();
    assert_eq!(stored.age, 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_one_session_per_task() {
    let repo = repo();

    let tasks: Vec<_> = (0..4)
        .map(|i| {
            let repo = repo.clone();
            tokio::spawn(async move {
                let mut session = repo.start_session().await?;
                let tag = Tag::new(&format!("tag-{i}"));
                repo.add_with(&tag, WriteOptions::in_session(&mut session))
                    .await?;
                repo.count_with::<Tag>(
                    Some(field("label").eq(tag.label.as_str())),
                    WriteOptions::in_session(&mut session),
                )
                .await
            })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), 1);
    }

    let mut labels: Vec<String> = repo
        .list::<Tag>(ListOptions::new())
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.label)
        .collect();
    labels.sort();
    assert_eq!(labels, vec!["tag-0", "tag-1", "tag-2", "tag-3"]);
}

#[tokio::test]
async fn test_dyn_repository_shared_across_tasks() {
    let repo: Arc<dyn DataRepository<Tag>> = Arc::new(repo());
    let tags: Vec<Tag> = (0..5).map(|i| Tag::new(&format!("l{i}"))).collect();

    let handles: Vec<_> = tags
        .iter()
        .cloned()
        .map(|tag| {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move { repo.add(&tag).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(repo.count(None).await.unwrap(), 5);
    assert_eq!(repo.delete_many(None).await.unwrap().deleted, 5);
}

// ============================================================================
// Command log
// ============================================================================

#[tokio::test]
async fn test_command_logging_does_not_change_results() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("helios_docstore=debug")
        .with_test_writer()
        .try_init();

    let quiet = repo();
    let chatty = repo_with_client(Arc::new(MemoryClient::new().with_command_logging(true)));
    let patients: Vec<Patient> = (0..4).map(|i| Patient::new(&format!("p{i}"), i)).collect();

    for repo in [&quiet, &chatty] {
        repo.initialize(["patients"]).await.unwrap();
        repo.add_many(&patients).await.unwrap();
        repo.update_many::<Patient>(Some(field("age").gte(2)), &UpdateSpec::new().inc("age", 10))
            .await
            .unwrap();
        repo.delete(&patients[0]).await.unwrap();
    }

    let a = quiet.list::<Patient>(ListOptions::new()).await.unwrap();
    let b = chatty.list::<Patient>(ListOptions::new()).await.unwrap();
    assert_eq!(a, b);
    assert_eq!(
        a.iter().map(|p| p.age).collect::<Vec<_>>(),
        vec![1, 12, 13]
    );
}
