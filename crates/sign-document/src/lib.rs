pub mod assemble;
pub mod constants;
pub mod grid;
mod options;
pub mod pdf;
pub mod split;
mod types;

pub use assemble::{DocumentAssembler, DocumentJob, DocumentProgress, DocumentReport};
pub use grid::GridLayout;
pub use options::*;
pub use split::{document_file_name, export_timestamp, plan_files};
pub use types::*;
