// Core modules implementing export, range reads, sheet resolution, and upsert paste.
pub mod backend;
pub mod encode;
pub mod error;
pub mod export;
pub mod model;
pub mod paste;
pub mod read;
pub mod reference;
pub mod resolve;
