// Library surface for the binary, headless hosts and integration tests.
pub mod app_dirs;
pub mod audio;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod runtime;
pub mod scorer;
pub mod sequence;
pub mod session;
pub mod summary;
pub mod util;

pub use error::{Error, Result};

/// Cells on the 3x3 grid
pub const GRID_SIZE: usize = 9;

/// Spoken letters. Chosen to sound distinct from each other.
pub const LETTERS: [char; 8] = ['C', 'H', 'K', 'L', 'Q', 'R', 'S', 'T'];

/// Orientation pause between entering play and the first stimulus
pub const WARMUP_MS: u64 = 500;

/// UI redraw cadence while nothing else is due
pub const TICK_RATE_MS: u64 = 100;
