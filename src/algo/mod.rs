pub mod aggregate;
pub mod cache;
pub mod catalog;
pub mod collate;
pub mod dataset;
pub mod grouping;
pub mod leaf;
pub mod selection;
#[cfg(feature = "cache")]
pub mod storage;
pub mod table;
