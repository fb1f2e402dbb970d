//! tado cloud API access

mod client;
#[cfg(test)]
pub mod fake;

pub use self::client::TadoClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::TadoError;
use crate::models::{Credentials, HomeMode};

/// An authenticated session bound to one home
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub home_id: i64,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Remote operations the presence loop needs from tado
#[async_trait]
pub trait TadoApi: Send + Sync {
    /// Authenticate and resolve the account's home
    async fn login(&self, credentials: &Credentials) -> Result<Session, TadoError>;

    /// Raw mobile device records, parsed later one by one
    async fn get_mobile_devices(&self, session: &Session) -> Result<Vec<Value>, TadoError>;

    async fn get_home_state(&self, session: &Session) -> Result<HomeMode, TadoError>;

    async fn set_home(&self, session: &Session) -> Result<(), TadoError>;

    async fn set_away(&self, session: &Session) -> Result<(), TadoError>;
}
