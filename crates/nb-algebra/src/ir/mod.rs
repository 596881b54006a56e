//! Relational Algebra IR: expressions, queries, operators and schemas

pub mod expr;
pub mod operator;
pub mod query;
pub mod schema;
