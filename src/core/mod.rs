//! Routing runtime: grammar, tables, bounds compilation, selection and strategies.

pub mod bounds;
pub mod config;
pub mod delivery;
pub mod distribution;
pub mod grammar;
pub mod markov;
pub mod random;
pub mod selector;
pub mod table;
