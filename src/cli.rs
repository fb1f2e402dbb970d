use clap::Parser;
use url::Url;

use crate::models::Credentials;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)] // read from Cargo.toml
pub struct Cli {
    /// Your tado username (normally your email address)
    #[arg(short = 'u', long = "username", env = "TADO_USERNAME", value_name = "email")]
    pub username: String,

    /// Your tado password
    #[arg(
        short = 'p',
        long = "password",
        env = "TADO_PASSWORD",
        value_name = "password",
        hide_env_values = true
    )]
    pub password: String,

    /// Healthcheck URL pinged after every device check
    #[arg(long = "healthcheck", env = "TADO_HEALTHCHECK_URL", value_name = "url")]
    pub healthcheck: Option<Url>,

    /// Configuration file (defaults to config/default if present)
    #[arg(long = "config", value_name = "path")]
    pub config: Option<String>,
}

impl Cli {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}
