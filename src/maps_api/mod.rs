pub mod archive_source;
pub mod legend_retriever;
