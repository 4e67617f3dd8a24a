pub mod error;
pub mod ingestion;
pub mod services;
pub mod structures;
pub mod tracking;
pub mod web;
