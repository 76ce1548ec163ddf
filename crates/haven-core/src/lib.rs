//! Haven core
//!
//! Occupancy model and operations for a sober-living residence: houses,
//! rooms and beds; residents and their lifecycle; bed assignment with
//! revision-checked commits; geolocated check-ins; intake, drug tests and
//! chores; and the figures behind the manager dashboard.

pub mod assignment;
pub mod checkin;
pub mod chores;
pub mod dashboard;
pub mod error;
pub mod facility;
pub mod geo;
pub mod intake;
pub mod model;
pub mod reconcile;
pub mod records;
pub mod repository;
pub mod store;

pub use assignment::{AssignmentService, TransferOutcome};
pub use checkin::{CheckInRecorder, CheckInRequest};
pub use error::{HavenError, HavenResult};
pub use geo::{DeviceClass, Fix, GeoPolicy, LocationError, LocationSource};
pub use model::{Bed, CheckInLog, House, Resident, ResidentStatus, Room};
pub use reconcile::{reconcile, ReconcileReport};
pub use repository::{Document, Repository, Versioned};
pub use store::{DocumentStore, MemoryStore, StoreError, StoreEvent};
