//! Shared fixtures for the repository integration tests.
//!
//! Three entity shapes cover the supported key types: [`Patient`] is keyed by
//! an object id, [`Device`] by a UUID and [`Tag`] by a plain string.

#![allow(dead_code)]

use std::sync::Arc;

use helios_docstore::backends::memory::MemoryClient;
use helios_docstore::entity::{Entity, EntityKey, ObjectId, Timestamped, Timestamps};
use helios_docstore::naming::{NamingStyle, TypeNameProvider};
use helios_docstore::query::Field;
use helios_docstore::{DbContext, DocumentClient, Repository};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DATABASE: &str = "helios_test";

// ============================================================================
// Entities
// ============================================================================

/// A patient keyed by object id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub age: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nickname: Option<String>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Patient {
    pub const NAME: Field<Patient, String> = Field::new("name");
    pub const AGE: Field<Patient, u32> = Field::new("age");

    pub fn new(name: &str, age: u32) -> Self {
        Self {
            id: ObjectId::generate(),
            name: name.to_string(),
            age,
            nickname: None,
            timestamps: Timestamps::now(),
        }
    }

    pub fn with_nickname(mut self, nickname: &str) -> Self {
        self.nickname = Some(nickname.to_string());
        self
    }
}

impl Entity for Patient {
    type Key = ObjectId;

    fn id(&self) -> &ObjectId {
        &self.id
    }
}

impl Timestamped for Patient {
    fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }
}

/// A device keyed by UUID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub serial: String,
    pub active: bool,
}

impl Device {
    pub const ACTIVE: Field<Device, bool> = Field::new("active");

    pub fn new(serial: &str) -> Self {
        Self {
            id: Uuid::generate(),
            serial: serial.to_string(),
            active: true,
        }
    }
}

impl Entity for Device {
    type Key = Uuid;

    fn id(&self) -> &Uuid {
        &self.id
    }
}

/// A tag keyed by an opaque string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "_id")]
    pub id: String,
    pub label: String,
}

impl Tag {
    pub fn new(label: &str) -> Self {
        Self {
            id: String::generate(),
            label: label.to_string(),
        }
    }
}

impl Entity for Tag {
    type Key = String;

    fn id(&self) -> &String {
        &self.id
    }
}

/// Projection target for patients read without their timestamps.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PatientName {
    pub name: String,
}

// ============================================================================
// Builders
// ============================================================================

/// Collection names: `patients`, `devices`, `tags`.
pub fn names() -> Arc<TypeNameProvider> {
    Arc::new(
        TypeNameProvider::new()
            .with_style(NamingStyle::SnakeCase)
            .pluralized(),
    )
}

/// A repository over a fresh in-memory store.
pub fn repo() -> Repository {
    repo_with_client(Arc::new(MemoryClient::new()))
}

/// A repository over `client`.
pub fn repo_with_client(client: Arc<dyn DocumentClient>) -> Repository {
    let context = DbContext::new(client, DATABASE, names()).expect("valid database name");
    Repository::new(Arc::new(context))
}

/// Adds `n` patients named `p0`, `p1`, ... with ages 0, 10, 20, ...
pub async fn seed_patients(repo: &Repository, n: u32) -> Vec<Patient> {
    let patients: Vec<Patient> = (0..n)
        .map(|i| Patient::new(&format!("p{i}"), i * 10))
        .collect();
    repo.add_many(&patients).await.expect("seed patients");
    patients
}
