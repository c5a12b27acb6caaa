//! Persistence for question banks and lessons.
//!
//! `repository` holds the backend-agnostic traits plus an in-memory
//! implementation; `sqlite` holds the `SQLx` backend.

#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;
