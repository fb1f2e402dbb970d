//! In-memory `TadoApi` used by the presence tests

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use super::{Session, TadoApi};
use crate::error::TadoError;
use crate::models::{Credentials, HomeMode};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub login: u32,
    pub get_mobile_devices: u32,
    pub get_home_state: u32,
    pub set_home: u32,
    pub set_away: u32,
}

/// Scripted fake. Each queued failure is returned once before the call succeeds.
pub struct FakeTado {
    inner: Mutex<Inner>,
}

struct Inner {
    devices: Vec<Value>,
    mode: HomeMode,
    failures: VecDeque<(&'static str, TadoError)>,
    calls: CallCounts,
}

impl FakeTado {
    pub fn new(devices: Vec<Value>, mode: HomeMode) -> Self {
        Self {
            inner: Mutex::new(Inner {
                devices,
                mode,
                failures: VecDeque::new(),
                calls: CallCounts::default(),
            }),
        }
    }

    pub fn set_devices(&self, devices: Vec<Value>) {
        self.inner.lock().unwrap().devices = devices;
    }

    pub fn mode(&self) -> HomeMode {
        self.inner.lock().unwrap().mode
    }

    /// Make the next `count` calls of `operation` fail with `make_err()`
    pub fn fail_next(&self, operation: &'static str, count: usize, make_err: impl Fn() -> TadoError) {
        let mut inner = self.inner.lock().unwrap();
        for _ in 0..count {
            inner.failures.push_back((operation, make_err()));
        }
    }

    pub fn calls(&self) -> CallCounts {
        self.inner.lock().unwrap().calls
    }

    pub fn session() -> Session {
        Session {
            access_token: "fake-token".to_string(),
            home_id: 1,
            expires_at: Utc::now() + chrono::Duration::hours(2),
        }
    }

    fn take_failure(inner: &mut Inner, operation: &'static str) -> Result<(), TadoError> {
        match inner.failures.iter().position(|(op, _)| *op == operation) {
            Some(pos) => match inner.failures.remove(pos) {
                Some((_, err)) => Err(err),
                None => Ok(()),
            },
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TadoApi for FakeTado {
    async fn login(&self, _credentials: &Credentials) -> Result<Session, TadoError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.login += 1;
        Self::take_failure(&mut inner, "login")?;
        Ok(Self::session())
    }

    async fn get_mobile_devices(&self, _session: &Session) -> Result<Vec<Value>, TadoError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.get_mobile_devices += 1;
        Self::take_failure(&mut inner, "get_mobile_devices")?;
        Ok(inner.devices.clone())
    }

    async fn get_home_state(&self, _session: &Session) -> Result<HomeMode, TadoError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.get_home_state += 1;
        Self::take_failure(&mut inner, "get_home_state")?;
        Ok(inner.mode)
    }

    async fn set_home(&self, _session: &Session) -> Result<(), TadoError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.set_home += 1;
        Self::take_failure(&mut inner, "set_home")?;
        inner.mode = HomeMode::Home;
        Ok(())
    }

    async fn set_away(&self, _session: &Session) -> Result<(), TadoError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.set_away += 1;
        Self::take_failure(&mut inner, "set_away")?;
        inner.mode = HomeMode::Away;
        Ok(())
    }
}
