pub mod ai;
pub mod catalog;
pub mod compose;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod lexicon;
pub mod parties;
pub mod types;

pub use error::DomainError;
pub use types::*;
