pub mod cache;
pub mod download;
pub mod info;
pub mod resolve;
