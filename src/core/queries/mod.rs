//! Analytical queries run after the load

pub mod runner;

pub use runner::{load_queries, parse_queries, NamedQuery, QueryExecution, QueryRunReport, QueryRunner};
