//! HTTP route handlers for the Haven API

pub mod assignments;
pub mod checkins;
pub mod chores;
pub mod dashboard;
pub mod events;
pub mod houses;
pub mod residents;
pub mod session;

use serde::Deserialize;

/// `?houseId=` filter shared by list endpoints
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseFilter {
    pub house_id: Option<String>,
}
