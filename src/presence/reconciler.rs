//! Home/away reconciliation

use crate::error::TadoError;
use crate::models::HomeMode;
use crate::retry::{retry, RetryExhausted, RetryPolicy};
use crate::tado::{Session, TadoApi};

/// Mode the home should switch to, if it disagrees with occupancy
pub fn plan_transition(occupied: bool, current: HomeMode) -> Option<HomeMode> {
    match (occupied, current) {
        (true, HomeMode::Away) => Some(HomeMode::Home),
        (false, HomeMode::Home) => Some(HomeMode::Away),
        _ => None,
    }
}

/// Issue at most one set-home / set-away call and return the mode applied
pub async fn reconcile_mode<A>(
    api: &A,
    session: &Session,
    policy: &RetryPolicy,
    occupied: bool,
    current: HomeMode,
) -> Result<Option<HomeMode>, RetryExhausted<TadoError>>
where
    A: TadoApi + ?Sized,
{
    let target = match plan_transition(occupied, current) {
        Some(target) => target,
        None => {
            tracing::debug!("[Presence] Mode {} matches occupancy, nothing to do", current);
            return Ok(None);
        }
    };

    match target {
        HomeMode::Home => retry(policy, "set_home", move || api.set_home(session)).await?,
        HomeMode::Away => retry(policy, "set_away", move || api.set_away(session)).await?,
    }

    tracing::info!("[Presence] Setting status to {}.", target);
    Ok(Some(target))
}
