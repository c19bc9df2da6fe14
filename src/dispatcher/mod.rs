//! Enrollment dispatcher: walks one enrollment through its sequence.

#[allow(clippy::module_inception)]
mod dispatcher;
mod guard;

pub use dispatcher::Dispatcher;
pub(crate) use guard::InFlight;
