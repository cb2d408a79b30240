//! Row types mapped from database queries.

pub mod job;
