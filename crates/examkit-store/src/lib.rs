//! examkit-store — reference collaborator implementations.
//!
//! In-memory and JSON-file backed question banks and attempt stores, plus the
//! TOML exam-definition parser. These implement the `examkit-core` traits and
//! back both the CLI and tests.

pub mod exam_file;
pub mod json_store;
pub mod memory;

pub use exam_file::{parse_exam, parse_exam_str, validate_exam, ExamDefinition, ValidationWarning};
pub use json_store::JsonAttemptStore;
pub use memory::{MemoryAttemptStore, MemoryBank};
