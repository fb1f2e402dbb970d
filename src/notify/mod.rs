//! Outbound notifications

mod healthcheck;

pub use self::healthcheck::HealthcheckPinger;
