//! loopabs-store: keyed per-stage JSON records
//!
//! Records live under `<root>/{raw,abstracted,verified}/<key>.json`, one file
//! per loop id, written atomically. `<root>/index.json` lists the ids of the
//! current batch; the clean step looks each of them up in the three stages
//! and joins them into `<root>/dataset.json`.

mod error;
mod key;
mod merge;
mod stage;

pub use error::StoreError;
pub use key::file_key;
pub use merge::{clean, merge_records, MergeReport};
pub use stage::{Stage, StageStore, DATASET_FILE, INDEX_FILE};
