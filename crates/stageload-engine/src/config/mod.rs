//! Tables file: YAML parsing, environment substitution, and validation.

pub mod parser;
pub mod types;
pub mod validator;
