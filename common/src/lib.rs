pub mod config;
pub mod measurement;
pub mod plot;
pub mod record;
pub mod select;
pub mod util;
