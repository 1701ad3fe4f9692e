//! `ga-output` — everything the simulation writes to disk.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                  |
//! |---------------|-----------------------------------------------------------|
//! | [`paths`]     | `ResultsRoot` — the `GA_RESULTS_DIR`-anchored layout      |
//! | [`records`]   | append-only activity/reflection record files              |
//! | [`checkpoint`]| atomic JSON writes, checkpoint scanning, conversation IO  |
//! | [`compress`]  | checkpoints + conversation → `movement.json`              |
//! | [`report`]    | human-readable `simulation.md`                            |
//! | [`error`]     | `OutputError`, `OutputResult<T>`                          |

pub mod checkpoint;
pub mod compress;
pub mod error;
pub mod paths;
pub mod records;
pub mod report;

#[cfg(test)]
mod tests;

pub use checkpoint::{
    checkpoint_file_name, latest_checkpoint, list_checkpoints, load_conversation, load_json,
    save_conversation, write_json_atomic,
};
pub use compress::{MovementDoc, compress_simulation};
pub use error::{OutputError, OutputResult};
pub use paths::ResultsRoot;
pub use records::{ActivityKind, RecordFile, RecordSink, ReflectionFile};
pub use report::write_report;
