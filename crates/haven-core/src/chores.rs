//! House chores and their completions

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;

use crate::error::{HavenError, HavenResult};
use crate::model::{Chore, ChoreCompletion, ChoreStatus, House, Resident};
use crate::repository::Repository;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChore {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub house_id: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// Partial update; absent fields are left as they are
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoreUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<ChoreStatus>,
}

async fn ensure_references(
    repo: &Repository,
    house_id: Option<&str>,
    resident_id: Option<&str>,
) -> HavenResult<()> {
    if let Some(house_id) = house_id {
        repo.require::<House>(house_id).await?;
    }
    if let Some(resident_id) = resident_id {
        repo.require::<Resident>(resident_id).await?;
    }
    Ok(())
}

pub async fn create_chore(repo: &Repository, chore: NewChore) -> HavenResult<Chore> {
    if chore.title.trim().is_empty() {
        return Err(HavenError::Validation("chore title is required".to_string()));
    }
    ensure_references(repo, chore.house_id.as_deref(), chore.assigned_to.as_deref()).await?;

    let chore = Chore {
        id: format!("k-{}", uuid::Uuid::new_v4()),
        title: chore.title.trim().to_string(),
        description: chore.description,
        house_id: chore.house_id,
        assigned_to: chore.assigned_to,
        status: ChoreStatus::Pending,
        due_date: chore.due_date,
        created_at: Utc::now(),
        completions: Vec::new(),
    };
    repo.insert(&chore).await?;
    info!(chore_id = %chore.id, "Chore created");
    Ok(chore)
}

/// Chores newest first, optionally restricted to one house
pub async fn list_chores(repo: &Repository, house_id: Option<&str>) -> HavenResult<Vec<Chore>> {
    let mut chores: Vec<Chore> = repo
        .list::<Chore>()
        .await?
        .into_iter()
        .map(|c| c.value)
        .filter(|c| house_id.map_or(true, |id| c.house_id.as_deref() == Some(id)))
        .collect();
    chores.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(chores)
}

pub async fn update_chore(repo: &Repository, chore_id: &str, update: ChoreUpdate) -> HavenResult<Chore> {
    ensure_references(repo, None, update.assigned_to.as_deref()).await?;
    let updated = repo
        .modify::<Chore, _>(chore_id, move |chore| {
            if let Some(title) = update.title {
                if title.trim().is_empty() {
                    return Err(HavenError::Validation("chore title is required".to_string()));
                }
                chore.title = title.trim().to_string();
            }
            if let Some(description) = update.description {
                chore.description = description;
            }
            if update.assigned_to.is_some() {
                chore.assigned_to = update.assigned_to;
            }
            if update.due_date.is_some() {
                chore.due_date = update.due_date;
            }
            if let Some(status) = update.status {
                chore.status = status;
            }
            Ok(())
        })
        .await?;
    Ok(updated.value)
}

pub async fn delete_chore(repo: &Repository, chore_id: &str) -> HavenResult<()> {
    let chore = repo.require::<Chore>(chore_id).await?;
    repo.remove::<Chore>(chore_id, Some(chore.revision)).await?;
    info!(chore_id, "Chore deleted");
    Ok(())
}

/// Append a completion and mark the chore completed
pub async fn complete_chore(
    repo: &Repository,
    chore_id: &str,
    resident_id: &str,
    notes: String,
) -> HavenResult<Chore> {
    repo.require::<Resident>(resident_id).await?;
    let completion = ChoreCompletion {
        resident_id: resident_id.to_string(),
        completed_at: Utc::now(),
        notes,
    };
    let updated = repo
        .modify::<Chore, _>(chore_id, move |chore| {
            chore.completions.push(completion);
            chore.status = ChoreStatus::Completed;
            Ok(())
        })
        .await?;
    info!(chore_id, resident_id, "Chore completed");
    Ok(updated.value)
}
