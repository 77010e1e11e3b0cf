// ABOUTME: Concurrent dump engine
// ABOUTME: Chunking, bounded worker pool, table pipeline, output writer and metadata blocks

pub mod chunk;
pub mod metadata;
pub mod pipeline;
pub mod pool;
pub mod report;
pub mod writer;

pub use chunk::chunk_tables;
pub use metadata::DumpMetadata;
pub use pipeline::{script_table, FragmentKind, PipelineOptions, ScriptFragment, TableScript};
pub use pool::{run_batches, ErrorPolicy, PoolOutcome};
pub use report::{DumpReport, TableFailure};
pub use writer::{OutputOrder, ScriptSender, ScriptWriter};
