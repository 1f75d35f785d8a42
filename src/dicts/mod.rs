//! Loading and grouping of YAML/JSON configuration documents.

mod collection;
mod document;
mod error;
mod source;

pub use collection::{Dicts, DictsBuilder, DISABLED_KEY};
pub use document::{is_truthy, Document, DEFAULT_PATH, PATH_KEY};
pub use error::DictsError;
pub use source::{is_loadable, load_file, Parsed};
