mod check;
mod inspect;

pub use check::run_check;
pub use inspect::{inspect_report, run_inspect, InspectReport};
