//! Error types surfaced by the view cache.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Record in table `{table}` has no usable primary key")]
    MissingPrimaryKey { table: String },

    #[error("Table `{0}` is not described by the schema")]
    UnknownTable(String),

    #[error("Record in table `{table}` is not an object")]
    InvalidRecord { table: String },

    #[error("Field `{field}` of table `{table}` is a relation, not a scalar")]
    NotAScalarField { table: String, field: String },

    #[error("Field `{field}` of table `{table}` is the primary key and cannot be written")]
    ImmutablePrimaryKey { table: String, field: String },

    #[error("Invalid route pattern `{pattern}`: {reason}")]
    InvalidRoutePattern { pattern: String, reason: String },
}

pub type CacheResult<T> = Result<T, CacheError>;
