//! Documents persisted by the facility: houses with their rooms and beds,
//! residents with their sub-collections, chores and application settings.
//!
//! Wire names are camelCase so the stored JSON lines up with what the web
//! client reads.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::intake::IntakeForm;

/// Smallest assignable unit. At most one occupant at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bed {
    pub id: String,
    #[serde(rename = "number")]
    pub label: String,
    pub occupant_id: Option<String>,
}

impl Bed {
    pub fn is_vacant(&self) -> bool {
        self.occupant_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub beds: Vec<Bed>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct House {
    pub id: String,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub rooms: Vec<Room>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Occupied and total bed counts for a house
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    pub occupied: usize,
    pub total: usize,
}

/// Vacant beds of one room, as offered by the admission picker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomVacancy {
    pub room_id: String,
    pub room_name: String,
    pub beds: Vec<Bed>,
}

impl House {
    /// Iterate every (room, bed) pair in layout order
    pub fn beds(&self) -> impl Iterator<Item = (&Room, &Bed)> {
        self.rooms
            .iter()
            .flat_map(|room| room.beds.iter().map(move |bed| (room, bed)))
    }

    /// Find a bed by id anywhere in the house
    pub fn find_bed(&self, bed_id: &str) -> Option<(&Room, &Bed)> {
        self.beds().find(|(_, bed)| bed.id == bed_id)
    }

    /// Mutable bed lookup, optionally constrained to one room
    pub fn bed_mut(&mut self, room_id: Option<&str>, bed_id: &str) -> Option<&mut Bed> {
        self.rooms
            .iter_mut()
            .filter(|room| room_id.map_or(true, |id| room.id == id))
            .flat_map(|room| room.beds.iter_mut())
            .find(|bed| bed.id == bed_id)
    }

    /// Clear `resident_id` from every bed it occupies. Returns the number of beds cleared.
    pub fn release(&mut self, resident_id: &str) -> usize {
        let mut cleared = 0;
        for bed in self.rooms.iter_mut().flat_map(|room| room.beds.iter_mut()) {
            if bed.occupant_id.as_deref() == Some(resident_id) {
                bed.occupant_id = None;
                cleared += 1;
            }
        }
        cleared
    }

    pub fn occupancy(&self) -> Occupancy {
        let (occupied, total) = self.beds().fold((0, 0), |(occupied, total), (_, bed)| {
            (occupied + usize::from(!bed.is_vacant()), total + 1)
        });
        Occupancy { occupied, total }
    }

    /// Vacant beds grouped by room; rooms without vacancies are omitted
    pub fn vacancies(&self) -> Vec<RoomVacancy> {
        self.rooms
            .iter()
            .filter_map(|room| {
                let beds: Vec<Bed> = room.beds.iter().filter(|b| b.is_vacant()).cloned().collect();
                if beds.is_empty() {
                    None
                } else {
                    Some(RoomVacancy {
                        room_id: room.id.clone(),
                        room_name: room.name.clone(),
                        beds,
                    })
                }
            })
            .collect()
    }
}

/// Resident lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResidentStatus {
    Pending,
    Active,
    Alumni,
    Discharged,
}

impl std::fmt::Display for ResidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResidentStatus::Pending => write!(f, "pending"),
            ResidentStatus::Active => write!(f, "active"),
            ResidentStatus::Alumni => write!(f, "alumni"),
            ResidentStatus::Discharged => write!(f, "discharged"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckInType {
    House,
    Meeting,
}

impl std::fmt::Display for CheckInType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckInType::House => write!(f, "HOUSE"),
            CheckInType::Meeting => write!(f, "MEETING"),
        }
    }
}

/// A geolocated attestation of presence. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInLog {
    pub id: String,
    pub resident_id: String,
    #[serde(rename = "type")]
    pub kind: CheckInType,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub location: Coordinate,
    pub location_name: String,
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestResult {
    Negative,
    Positive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestKind {
    Instant,
    Lab,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrugTestLog {
    pub id: String,
    pub date: DateTime<Utc>,
    pub result: TestResult,
    #[serde(rename = "type")]
    pub kind: TestKind,
    #[serde(default)]
    pub notes: String,
    pub performed_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DischargeType {
    Voluntary,
    Involuntary,
    #[serde(rename = "Successful Completion")]
    SuccessfulCompletion,
    Medical,
    Transfer,
}

impl DischargeType {
    /// Status a resident ends up in after a discharge of this type
    pub fn resulting_status(self) -> ResidentStatus {
        match self {
            DischargeType::SuccessfulCompletion => ResidentStatus::Alumni,
            _ => ResidentStatus::Discharged,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DischargeRecord {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: DischargeType,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub forwarding_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resident {
    pub id: String,
    pub status: ResidentStatus,
    pub intake: IntakeForm,
    pub assigned_house_id: Option<String>,
    pub assigned_bed_id: Option<String>,
    #[serde(default)]
    pub check_in_logs: Vec<CheckInLog>,
    #[serde(default)]
    pub drug_test_logs: Vec<DrugTestLog>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discharge_record: Option<DischargeRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resident {
    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.intake.personal.first_name.trim(),
            self.intake.personal.last_name.trim()
        )
    }

    pub fn is_assigned(&self) -> bool {
        self.assigned_bed_id.is_some() || self.assigned_house_id.is_some()
    }

    pub fn clear_assignment(&mut self) {
        self.assigned_house_id = None;
        self.assigned_bed_id = None;
    }

    /// Check-ins for display, newest first. Storage order stays append-only.
    pub fn check_ins_newest_first(&self) -> Vec<&CheckInLog> {
        let mut logs: Vec<&CheckInLog> = self.check_in_logs.iter().collect();
        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        logs
    }

    /// Copy safe to hand to API clients
    pub fn redacted(&self) -> Resident {
        Resident {
            password_hash: None,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChoreStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoreCompletion {
    pub resident_id: String,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chore {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub house_id: Option<String>,
    pub assigned_to: Option<String>,
    pub status: ChoreStatus,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completions: Vec<ChoreCompletion>,
}

/// Singleton settings document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_password_hash: Option<String>,
}

impl AppSettings {
    pub const ID: &'static str = "app";
}
