//! Sessions are read from a data directory through [data_dir::DataDir].
//! The layout is:
//!   - One `<year>-data.jsonl` file per year, one [records::SessionRecord] per line.
//!   - `projects.json` and `activity_types.json`, each a JSON array of registry entries.
//!   - Missing files are treated as empty; broken lines are logged and skipped.

pub mod data_dir;
pub mod records;
