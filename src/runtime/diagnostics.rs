use crate::common::constants::DIAGNOSTIC_TARGET;
use std::fmt::Display;

/// Writes one line to the process-wide diagnostic stream.
///
/// Goes through the `log` facade, so where it lands is up to whichever logger
/// the host process installs.
pub fn log(message: impl Display) {
    log::info!(target: DIAGNOSTIC_TARGET, "{message}");
}
