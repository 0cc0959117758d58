//! Request routing: pattern matching, the route table, and the extension
//! fallback table.

mod error;
mod extension;
mod matcher;
mod table;

pub use error::RouteError;
pub use extension::{extension_of, lookup_extension};
pub use matcher::{match_path, MatchResult, Params, MAX_PARAMS};
pub use table::{MethodFilter, Route, RouteTable, RouteType};
