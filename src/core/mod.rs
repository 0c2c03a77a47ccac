pub mod blocks;
pub mod compression;
pub mod constants;
pub mod data_handle;
pub mod error;
pub mod format;
pub mod pixel;
pub mod reader;
pub mod solver;
