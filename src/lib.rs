mod board;
mod common;
mod config;
mod engine;
mod keys;
mod ledger;
mod logging;
mod phase;
mod playback;
pub mod prelude;
mod record;
mod store;
mod sync;
pub mod ui;

pub use board::*;
pub use common::*;
pub use config::*;
pub use engine::*;
pub use keys::*;
pub use ledger::*;
pub use logging::init_logging;
pub use phase::*;
pub use playback::*;
pub use record::*;
pub use store::*;
pub use sync::*;
