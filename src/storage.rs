pub mod impl_directory;
pub mod impl_in_memory;
pub mod impl_jsonl;
pub mod interface;
