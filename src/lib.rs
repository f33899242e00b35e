#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod invite;
pub mod logging;
pub mod mailer;
pub mod model;
pub mod notify;

use config::{ConfigFairing, DatabaseFairing};
use logging::LoggerFairing;
use mailer::MailerFairing;
use notify::NotifierFairing;

pub use config::Config;

/// Build the server from the default figment (`Rocket.toml` plus `ROCKET_*`
/// environment variables).
pub fn build() -> Rocket<Build> {
    assemble(rocket::build())
}

/// Attach every fairing and route to the given base instance.
/// The database fairing must come before anything that needs a connection.
pub(crate) fn assemble(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(MailerFairing)
        .attach(NotifierFairing)
        .mount("/", api::routes())
}
