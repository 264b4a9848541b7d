use chrono::NaiveDate;

use crate::{
    error::{AppError, Result},
    models::session::SessionAvailability,
    repositories::store::BookingStore,
};

/// The sessions offered on one date.
#[derive(Debug, Clone)]
pub struct DaySchedule {
    /// The date listed.
    pub date: NaiveDate,
    /// Every activity with sessions on `date`, sorted and deduplicated.
    pub activities: Vec<String>,
    /// The sessions, filtered to one activity when requested.
    pub sessions: Vec<SessionAvailability>,
}

/// Lists the distinct event dates.
pub async fn event_dates(store: &dyn BookingStore) -> Result<Vec<NaiveDate>> {
    Ok(store.event_dates().await?)
}

/// Resolves the date to list, defaulting to the earliest event date.
pub async fn resolve_date(store: &dyn BookingStore, date: Option<NaiveDate>) -> Result<NaiveDate> {
    if let Some(date) = date {
        return Ok(date);
    }

    store
        .event_dates()
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("No sessions have been loaded yet".to_string()))
}

/// Lists the sessions on a date with their remaining seats.
///
/// # Arguments
///
/// * `store` - The store to read from.
/// * `date` - The date to list. `None` selects the earliest event date.
/// * `activity` - Restricts the sessions to one activity.
///
/// # Returns
///
/// A `Result` containing the `DaySchedule`.
pub async fn day_schedule(
    store: &dyn BookingStore,
    date: Option<NaiveDate>,
    activity: Option<&str>,
) -> Result<DaySchedule> {
    let date = resolve_date(store, date).await?;
    let all = store.sessions_on(date).await?;

    let mut activities: Vec<String> = all.iter().map(|s| s.session.activity.clone()).collect();
    activities.sort();
    activities.dedup();

    let sessions = match activity {
        Some(activity) => all
            .into_iter()
            .filter(|s| s.session.activity == activity)
            .collect(),
        None => all,
    };

    tracing::debug!(
        "Listed {} sessions across {} activities on {}",
        sessions.len(),
        activities.len(),
        date
    );

    Ok(DaySchedule { date, activities, sessions })
}
