//! PostgreSQL implementation of the movie source.

mod queries;
mod source;

pub use source::PostgresMovieSource;
