//! Manager dashboard figures and the text prompts built from them

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{CheckInType, House, Resident, ResidentStatus};

const RECENT_ACTIVITY_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseOccupancy {
    pub house_id: String,
    pub name: String,
    pub occupied: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub active: usize,
    pub alumni: usize,
    pub discharged: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    pub resident_id: String,
    pub resident_name: String,
    #[serde(rename = "type")]
    pub kind: CheckInType,
    pub timestamp: DateTime<Utc>,
    pub location_name: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub houses: Vec<HouseOccupancy>,
    pub status_counts: StatusCounts,
    pub recent_activity: Vec<ActivityItem>,
}

/// Residents shown under a house: assigned to it, or unassigned and applying to it
pub fn belongs_to_house(resident: &Resident, house_id: &str) -> bool {
    match &resident.assigned_house_id {
        Some(assigned) => assigned == house_id,
        None => resident.intake.target_house_id == house_id,
    }
}

pub fn build(houses: &[House], residents: &[Resident], house_filter: Option<&str>) -> Dashboard {
    let houses: Vec<HouseOccupancy> = houses
        .iter()
        .filter(|h| house_filter.map_or(true, |id| h.id == id))
        .map(|h| {
            let occupancy = h.occupancy();
            HouseOccupancy {
                house_id: h.id.clone(),
                name: h.name.clone(),
                occupied: occupancy.occupied,
                total: occupancy.total,
            }
        })
        .collect();

    let residents: Vec<&Resident> = residents
        .iter()
        .filter(|r| house_filter.map_or(true, |id| belongs_to_house(r, id)))
        .collect();

    let mut status_counts = StatusCounts::default();
    for r in &residents {
        match r.status {
            ResidentStatus::Pending => status_counts.pending += 1,
            ResidentStatus::Active => status_counts.active += 1,
            ResidentStatus::Alumni => status_counts.alumni += 1,
            ResidentStatus::Discharged => status_counts.discharged += 1,
        }
    }

    let mut recent_activity: Vec<ActivityItem> = residents
        .iter()
        .flat_map(|r| {
            let name = r.display_name();
            r.check_in_logs.iter().map(move |log| ActivityItem {
                resident_id: r.id.clone(),
                resident_name: name.clone(),
                kind: log.kind,
                timestamp: log.timestamp,
                location_name: log.location_name.clone(),
                note: log.notes.clone(),
            })
        })
        .collect();
    recent_activity.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    recent_activity.truncate(RECENT_ACTIVITY_LIMIT);

    Dashboard {
        houses,
        status_counts,
        recent_activity,
    }
}

/// Prompt for the daily shift report
pub fn shift_report_prompt(dashboard: &Dashboard) -> String {
    let house_summary = dashboard
        .houses
        .iter()
        .map(|h| format!("{}: {}/{} beds occupied.", h.name, h.occupied, h.total))
        .collect::<Vec<_>>()
        .join("\n");

    let activity = if dashboard.recent_activity.is_empty() {
        "No recent activity.".to_string()
    } else {
        dashboard
            .recent_activity
            .iter()
            .map(|a| {
                format!(
                    "- {}: {} checked into {} at {} ({})",
                    a.timestamp.format("%Y-%m-%d %H:%M"),
                    a.resident_name,
                    a.kind,
                    a.location_name,
                    a.note.as_deref().unwrap_or("No notes")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "You are a House Manager Assistant for a sober living facility.\n\
         Please generate a concise, professional daily shift report based on the following data.\n\n\
         House Status:\n{}\n\n\
         Recent Activity (Last {} logs):\n{}\n\n\
         Format the report with sections: \"Occupancy Overview\", \"Recent Activity Highlights\", \
         and \"Attention Items\" (call out anomalies or missing check-ins; otherwise give generic reminders).",
        house_summary, RECENT_ACTIVITY_LIMIT, activity
    )
}

/// Prompt asking for a risk summary of an intake application
pub fn intake_risk_prompt(resident: &Resident) -> String {
    let data = serde_json::to_string(&resident.intake).unwrap_or_default();
    format!(
        "Analyze the following intake form data for a new resident in a sober living home.\n\
         Identify potential risk factors, support needs, and provide a brief summary for the house manager.\n\n\
         Data: {}",
        data
    )
}
