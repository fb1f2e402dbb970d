//! Session freshness

use chrono::{DateTime, Utc};

use super::state::PresenceState;
use crate::error::TadoError;
use crate::models::Credentials;
use crate::retry::{retry, RetryExhausted, RetryPolicy};
use crate::tado::{Session, TadoApi};

/// Log in through the retry policy
pub async fn login<A>(
    api: &A,
    credentials: &Credentials,
    policy: &RetryPolicy,
) -> Result<Session, RetryExhausted<TadoError>>
where
    A: TadoApi + ?Sized,
{
    retry(policy, "login", move || api.login(credentials)).await
}

/// Return a usable session, logging in again when the last login is older
/// than `refresh_after`, the token expired, or the API rejected it.
pub async fn refresh_auth<A>(
    api: &A,
    credentials: &Credentials,
    policy: &RetryPolicy,
    state: &mut PresenceState,
    session: Session,
    refresh_after: chrono::Duration,
    now: DateTime<Utc>,
) -> Result<Session, RetryExhausted<TadoError>>
where
    A: TadoApi + ?Sized,
{
    if !state.login_due(now, refresh_after) && !session.is_expired(now) {
        return Ok(session);
    }

    tracing::info!("[Presence] Refreshing tado session");
    let session = login(api, credentials, policy).await?;
    state.mark_logged_in(now);
    Ok(session)
}
