//! Packet providers

pub mod reader;

pub use reader::ReaderProvider;
