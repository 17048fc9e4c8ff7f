pub mod artifacts;
pub mod config;
pub mod corpus;
pub mod domain;
pub mod error;
