//! PostgreSQL implementation of the movie source.
//!
//! A dedicated connection is opened for every extraction and closed before the
//! call returns, so nothing is held open while the indexer sleeps between
//! passes. All queries of one extraction run in a single read-only
//! `REPEATABLE READ` transaction, so every page and every entity kind sees the
//! same snapshot.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use movies_indexer_shared::{ChangeSet, RawGenreRow, RawMovieRow, RawPersonRow, Watermark};
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgRow};
use sqlx::{Connection, PgConnection, Postgres, QueryBuilder, Row, Transaction};
use tracing::{debug, instrument, warn};

use crate::config::PostgresConfig;
use crate::errors::SourceError;
use crate::interfaces::{ExtractOptions, MovieSource};
use crate::postgres::queries::{self, Page};

type QueryFn = fn(Option<DateTime<Utc>>, Option<Page>) -> QueryBuilder<'static, Postgres>;

/// PostgreSQL-backed movie source.
///
/// Reads the `content` schema: `film_work`, `genre`, `person` and the
/// `genre_film_work`/`person_film_work` join tables.
pub struct PostgresMovieSource {
    options: PgConnectOptions,
    connect_timeout: Duration,
}

impl PostgresMovieSource {
    /// Creates a new source. No connection is made until the first fetch.
    pub fn new(config: &PostgresConfig) -> Self {
        Self {
            options: config.connect_options(),
            connect_timeout: config.connect_timeout,
        }
    }

    /// Creates a source from prepared connect options.
    pub fn with_options(options: PgConnectOptions, connect_timeout: Duration) -> Self {
        Self {
            options,
            connect_timeout,
        }
    }

    async fn connect(&self) -> Result<PgConnection, SourceError> {
        match tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&self.options))
            .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(SourceError::Timeout(self.connect_timeout)),
        }
    }

    /// Run one query, following pages until a short page is returned.
    async fn fetch_paged<T>(
        conn: &mut PgConnection,
        options: &ExtractOptions,
        build: QueryFn,
        decode: fn(&PgRow) -> Result<T, SourceError>,
    ) -> Result<Vec<T>, SourceError> {
        let since = options.since.map(|w| w.timestamp());
        let mut rows = Vec::new();
        let mut offset: i64 = 0;

        loop {
            let page = options.page_size.map(|size| Page {
                limit: i64::from(size),
                offset,
            });

            let mut builder = build(since, page);
            let fetched = builder.build().fetch_all(&mut *conn).await?;
            let fetched_count = fetched.len();

            for row in &fetched {
                rows.push(decode(row)?);
            }

            match page {
                Some(page) if fetched_count as i64 == page.limit => offset += page.limit,
                _ => break,
            }
        }

        Ok(rows)
    }

    async fn fetch_with(
        conn: &mut PgConnection,
        options: &ExtractOptions,
    ) -> Result<ChangeSet, SourceError> {
        let mut tx = begin_snapshot(conn).await?;
        let observed_at = snapshot_time(&mut tx).await?;

        let movies = Self::fetch_paged(&mut tx, options, queries::movies, decode_movie).await?;
        let genres = Self::fetch_paged(&mut tx, options, queries::genres, decode_genre).await?;
        let persons = Self::fetch_paged(&mut tx, options, queries::persons, decode_person).await?;
        tx.commit().await?;

        Ok(ChangeSet {
            movies,
            genres,
            persons,
            observed_at: Some(Watermark::new(observed_at)),
        })
    }
}

/// Open a read-only transaction whose snapshot is fixed for all its queries.
pub(crate) async fn begin_snapshot(
    conn: &mut PgConnection,
) -> Result<Transaction<'_, Postgres>, SourceError> {
    let mut tx = conn.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

/// Database clock at the start of the transaction.
async fn snapshot_time(tx: &mut Transaction<'_, Postgres>) -> Result<DateTime<Utc>, SourceError> {
    let now = sqlx::query_scalar::<_, DateTime<Utc>>("SELECT now()")
        .fetch_one(&mut **tx)
        .await?;
    Ok(now)
}

fn decode_movie(row: &PgRow) -> Result<RawMovieRow, SourceError> {
    Ok(RawMovieRow {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        rating: row.try_get("rating")?,
        kind: row.try_get("kind")?,
        persons: row.try_get::<Value, _>("persons")?,
        genres: row.try_get::<Value, _>("genres")?,
    })
}

fn decode_genre(row: &PgRow) -> Result<RawGenreRow, SourceError> {
    Ok(RawGenreRow {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
    })
}

fn decode_person(row: &PgRow) -> Result<RawPersonRow, SourceError> {
    Ok(RawPersonRow {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        films: row.try_get::<Value, _>("films")?,
    })
}

#[async_trait]
impl MovieSource for PostgresMovieSource {
    #[instrument(skip(self), fields(since = ?options.since, page_size = ?options.page_size))]
    async fn fetch_changes(&self, options: &ExtractOptions) -> Result<ChangeSet, SourceError> {
        options.validate()?;

        let mut conn = self.connect().await?;
        // On error the connection is dropped here, which closes the socket.
        let changes = Self::fetch_with(&mut conn, options).await?;

        if let Err(e) = conn.close().await {
            warn!(error = %e, "Failed to close source connection cleanly");
        }

        debug!(
            movies = changes.movies.len(),
            genres = changes.genres.len(),
            persons = changes.persons.len(),
            "Fetched changes from source"
        );
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sqlx::postgres::PgPoolOptions;
    use uuid::Uuid;

    const FIRST: &str = "11111111-1111-1111-1111-111111111111";
    const SECOND: &str = "22222222-2222-2222-2222-222222222222";

    fn at(year: i32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap()
    }

    async fn page_ids(tx: &mut Transaction<'_, Postgres>, offset: i64) -> Vec<String> {
        let mut builder = queries::movies(None, Some(Page { limit: 1, offset }));
        builder
            .build()
            .fetch_all(&mut **tx)
            .await
            .unwrap()
            .iter()
            .map(|row| row.get::<String, _>("id"))
            .collect()
    }

    #[sqlx::test(migrations = "tests/migrations")]
    #[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
    async fn test_update_between_pages_does_not_shift_rows(
        _pool_options: PgPoolOptions,
        options: PgConnectOptions,
    ) {
        let pool = sqlx::PgPool::connect_with(options.clone()).await.unwrap();
        for (id, title, year) in [(FIRST, "Stalker", 2020), (SECOND, "Solaris", 2021)] {
            sqlx::query("INSERT INTO content.film_work (id, title, updated_at) VALUES ($1, $2, $3)")
                .bind(Uuid::parse_str(id).unwrap())
                .bind(title)
                .bind(at(year))
                .execute(&pool)
                .await
                .unwrap();
        }

        let mut conn = PgConnection::connect_with(&options).await.unwrap();
        let mut tx = begin_snapshot(&mut conn).await.unwrap();
        let mut ids = page_ids(&mut tx, 0).await;

        // Moves the first film behind the second in change order.
        sqlx::query("UPDATE content.film_work SET updated_at = $1 WHERE id = $2")
            .bind(at(2030))
            .bind(Uuid::parse_str(FIRST).unwrap())
            .execute(&pool)
            .await
            .unwrap();

        ids.extend(page_ids(&mut tx, 1).await);
        tx.commit().await.unwrap();

        assert_eq!(ids, vec![FIRST.to_string(), SECOND.to_string()]);
    }
}
