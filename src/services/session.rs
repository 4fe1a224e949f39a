// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Racer login and logout.

use crate::db::SessionStore;
use crate::error::{AppError, Result};
use crate::models::{Race, Racer};
use crate::services::crm::CrmClient;
use chrono::NaiveDate;

/// Log a racer in and remember them locally.
///
/// The racer's race must run on `today`; otherwise nothing is stored.
pub async fn login(
    crm: &CrmClient,
    store: &SessionStore,
    email: &str,
    number: &str,
    today: NaiveDate,
) -> Result<(Racer, Race)> {
    let email = email.trim();
    let number = number.trim();

    let racer = crm.login(email, number).await?;
    let race = crm.get_race(&racer.race_slug).await?;

    if race.date != today {
        tracing::info!(race = %race.slug, race_date = %race.date, %today, "Race is not today");
        return Err(AppError::NoRaceToday(racer.race_slug));
    }

    store.save_racer(&racer).await?;
    tracing::info!(racer_id = %racer.racer_id, race = %race.slug, "Session stored");
    Ok((racer, race))
}

/// The stored racer; every confirmation flow starts here.
pub async fn require_racer(store: &SessionStore) -> Result<Racer> {
    store.load_racer().await?.ok_or(AppError::NotLoggedIn)
}

/// Forget the stored racer.
pub async fn logout(store: &SessionStore) -> Result<()> {
    store.clear_racer().await?;
    tracing::info!("Logged out");
    Ok(())
}
