#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use haven_core::intake::IntakeForm;
use haven_core::store::{Entry, Revision};
use haven_core::{
    Bed, DocumentStore, House, MemoryStore, Repository, Resident, ResidentStatus, Room,
    StoreError, StoreEvent,
};
use tokio::sync::broadcast;

pub fn bed(id: &str) -> Bed {
    Bed {
        id: id.to_string(),
        label: id.trim_start_matches("bed").to_string(),
        occupant_id: None,
    }
}

pub fn house(id: &str, rooms: &[(&str, &[&str])]) -> House {
    House {
        id: id.to_string(),
        name: format!("House {}", id),
        address: format!("{} Main St", id),
        rooms: rooms
            .iter()
            .map(|(room_id, beds)| Room {
                id: room_id.to_string(),
                name: room_id.to_string(),
                beds: beds.iter().map(|b| bed(b)).collect(),
            })
            .collect(),
        image: None,
    }
}

pub fn resident(id: &str, status: ResidentStatus, target_house_id: &str) -> Resident {
    let now = Utc::now();
    let mut intake = IntakeForm {
        target_house_id: target_house_id.to_string(),
        ..Default::default()
    };
    intake.personal.first_name = "Test".to_string();
    intake.personal.last_name = id.to_string();
    intake.personal.email = format!("{}@example.com", id);
    intake.personal.dob = NaiveDate::from_ymd_opt(1990, 1, 1);
    Resident {
        id: id.to_string(),
        status,
        intake,
        assigned_house_id: None,
        assigned_bed_id: None,
        check_in_logs: vec![],
        drug_test_logs: vec![],
        discharge_record: None,
        notes: None,
        password_hash: None,
        created_at: now,
        updated_at: now,
    }
}

/// Houses hA..hZ used across the assignment scenarios
pub fn facility() -> Vec<House> {
    vec![
        house("hA", &[("room1", &["bed1", "bed2"]), ("room2", &["bed4"])]),
        house("hB", &[("room9", &["bed9", "bed10"])]),
        house("hX", &[("roomX", &["bed3"])]),
        house("hY", &[("roomY", &["bed7"])]),
        house("hZ", &[("roomK", &["bed5", "bed6"])]),
    ]
}

pub async fn seeded(store: Arc<dyn DocumentStore>, residents: &[Resident]) -> Repository {
    let repo = Repository::new(store);
    for h in facility() {
        repo.insert(&h).await.unwrap();
    }
    for r in residents {
        repo.insert(r).await.unwrap();
    }
    repo
}

pub async fn memory_repo(residents: &[Resident]) -> Repository {
    seeded(Arc::new(MemoryStore::new()), residents).await
}

pub async fn house_of(repo: &Repository, id: &str) -> House {
    repo.get::<House>(id).await.unwrap().unwrap().value
}

pub async fn resident_of(repo: &Repository, id: &str) -> Resident {
    repo.get::<Resident>(id).await.unwrap().unwrap().value
}

pub fn occupant(house: &House, bed_id: &str) -> Option<String> {
    house
        .find_bed(bed_id)
        .and_then(|(_, bed)| bed.occupant_id.clone())
}

/// Force a bed occupant directly, bypassing the assignment service
pub async fn force_occupant(repo: &Repository, house_id: &str, bed_id: &str, resident_id: Option<&str>) {
    repo.modify::<House, _>(house_id, |h| {
        h.bed_mut(None, bed_id).unwrap().occupant_id = resident_id.map(str::to_string);
        Ok(())
    })
    .await
    .unwrap();
}

/// Check the no-double-booking, back-reference and terminal-status invariants
pub async fn assert_invariants(repo: &Repository) {
    let houses: Vec<House> = repo
        .list::<House>()
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.value)
        .collect();
    let residents: Vec<Resident> = repo
        .list::<Resident>()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.value)
        .collect();

    for r in &residents {
        let beds_held: Vec<(&str, &str)> = houses
            .iter()
            .flat_map(|h| h.beds().map(move |(_, b)| (h.id.as_str(), b)))
            .filter(|(_, b)| b.occupant_id.as_deref() == Some(r.id.as_str()))
            .map(|(h, b)| (h, b.id.as_str()))
            .collect();
        assert!(beds_held.len() <= 1, "{} double-booked: {:?}", r.id, beds_held);

        match r.status {
            ResidentStatus::Active => {
                if let (Some(h), Some(b)) = (&r.assigned_house_id, &r.assigned_bed_id) {
                    assert_eq!(beds_held, vec![(h.as_str(), b.as_str())], "{} back-reference", r.id);
                }
            }
            ResidentStatus::Alumni | ResidentStatus::Discharged => {
                assert!(r.assigned_house_id.is_none() && r.assigned_bed_id.is_none());
            }
            ResidentStatus::Pending => {}
        }
    }
}

struct FailRule {
    key: String,
    error: StoreError,
    /// Successful updates of `key` allowed before the rule starts failing
    skip: usize,
}

/// Memory store whose updates can be made to fail per key
pub struct FlakyStore {
    inner: MemoryStore,
    rules: Mutex<Vec<FailRule>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            rules: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_update(&self, key: &str, error: StoreError, skip: usize) {
        self.rules.lock().unwrap().push(FailRule {
            key: key.to_string(),
            error,
            skip,
        });
    }

    pub fn heal(&self) {
        self.rules.lock().unwrap().clear();
    }

    fn check(&self, key: &str) -> Result<(), StoreError> {
        let mut rules = self.rules.lock().unwrap();
        for rule in rules.iter_mut().filter(|r| r.key == key) {
            if rule.skip > 0 {
                rule.skip -= 1;
            } else {
                return Err(rule.error.clone());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<Entry>, StoreError> {
        self.inner.get(key).await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.inner.keys(prefix).await
    }

    async fn create(&self, key: &str, value: Vec<u8>) -> Result<Revision, StoreError> {
        self.inner.create(key, value).await
    }

    async fn update(&self, key: &str, value: Vec<u8>, expected: Revision) -> Result<Revision, StoreError> {
        self.check(key)?;
        self.inner.update(key, value, expected).await
    }

    async fn delete(&self, key: &str, expected: Option<Revision>) -> Result<(), StoreError> {
        self.inner.delete(key, expected).await
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.subscribe()
    }
}
