//! SQL for the change-detection queries.
//!
//! Every query is built with `QueryBuilder` so the optional watermark filter and
//! the optional page bounds are bound parameters, never interpolated text.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};

/// `LIMIT`/`OFFSET` bounds of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Page {
    pub limit: i64,
    pub offset: i64,
}

/// One row per film, with persons and genres aggregated into JSON arrays.
///
/// Persons are `DISTINCT` over `(role, id, name)`, so a person listed twice in
/// the same role collapses into one entry. Films without persons or genres get
/// empty arrays instead of `NULL`.
const MOVIES_SELECT: &str = r#"SELECT
    fw.id::text AS id,
    fw.title,
    fw.description,
    fw.rating::float8 AS rating,
    fw.type::text AS kind,
    COALESCE(
        json_agg(
            DISTINCT jsonb_build_object(
                'person_role', pfw.role,
                'person_id', p.id,
                'person_name', p.full_name
            )
        ) FILTER (WHERE p.id IS NOT NULL),
        '[]'
    ) AS persons,
    COALESCE(
        json_agg(DISTINCT g.name) FILTER (WHERE g.name IS NOT NULL),
        '[]'
    ) AS genres
FROM content.film_work fw
LEFT JOIN content.person_film_work pfw ON pfw.film_work_id = fw.id
LEFT JOIN content.person p ON p.id = pfw.person_id
LEFT JOIN content.genre_film_work gfw ON gfw.film_work_id = fw.id
LEFT JOIN content.genre g ON g.id = gfw.genre_id"#;

const GENRES_SELECT: &str = r#"SELECT
    g.id::text AS id,
    g.name,
    g.description
FROM content.genre g"#;

/// One row per person, with one JSON object per film/role pair.
const PERSONS_SELECT: &str = r#"SELECT
    p.id::text AS id,
    p.full_name,
    COALESCE(
        json_agg(
            DISTINCT jsonb_build_object(
                'film_id', fw.id,
                'title', fw.title,
                'rating', fw.rating,
                'role', pfw.role
            )
        ) FILTER (WHERE fw.id IS NOT NULL),
        '[]'
    ) AS films
FROM content.person p
LEFT JOIN content.person_film_work pfw ON pfw.person_id = p.id
LEFT JOIN content.film_work fw ON fw.id = pfw.film_work_id"#;

/// Ids of films touched directly or through a linked genre or person. Kept
/// apart from the aggregating query so the aggregates still see every join row.
const CHANGED_FILM_IDS: &str = r#"SELECT cfw.id
FROM content.film_work cfw
LEFT JOIN content.person_film_work cpfw ON cpfw.film_work_id = cfw.id
LEFT JOIN content.person cp ON cp.id = cpfw.person_id
LEFT JOIN content.genre_film_work cgfw ON cgfw.film_work_id = cfw.id
LEFT JOIN content.genre cg ON cg.id = cgfw.genre_id
WHERE cfw.updated_at > "#;

/// Ids of persons touched directly or through a linked film.
const CHANGED_PERSON_IDS: &str = r#"SELECT cp.id
FROM content.person cp
LEFT JOIN content.person_film_work cpfw ON cpfw.person_id = cp.id
LEFT JOIN content.film_work cfw ON cfw.id = cpfw.film_work_id
WHERE cp.updated_at > "#;

fn push_page(builder: &mut QueryBuilder<'static, Postgres>, page: Option<Page>) {
    if let Some(page) = page {
        builder.push(" LIMIT ");
        builder.push_bind(page.limit);
        builder.push(" OFFSET ");
        builder.push_bind(page.offset);
    }
}

/// Films that changed after `since`, directly or through a linked genre or person.
pub(crate) fn movies(
    since: Option<DateTime<Utc>>,
    page: Option<Page>,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(MOVIES_SELECT);
    if let Some(since) = since {
        builder.push(" WHERE fw.id IN (");
        builder.push(CHANGED_FILM_IDS);
        builder.push_bind(since);
        builder.push(" OR cg.updated_at > ");
        builder.push_bind(since);
        builder.push(" OR cp.updated_at > ");
        builder.push_bind(since);
        builder.push(")");
    }
    builder.push(" GROUP BY fw.id ORDER BY fw.updated_at, fw.id");
    push_page(&mut builder, page);
    builder
}

/// Genres that changed after `since`.
pub(crate) fn genres(
    since: Option<DateTime<Utc>>,
    page: Option<Page>,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(GENRES_SELECT);
    if let Some(since) = since {
        builder.push(" WHERE g.updated_at > ");
        builder.push_bind(since);
    }
    builder.push(" ORDER BY g.updated_at, g.id");
    push_page(&mut builder, page);
    builder
}

/// Persons that changed after `since`, directly or through a linked film.
pub(crate) fn persons(
    since: Option<DateTime<Utc>>,
    page: Option<Page>,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(PERSONS_SELECT);
    if let Some(since) = since {
        builder.push(" WHERE p.id IN (");
        builder.push(CHANGED_PERSON_IDS);
        builder.push_bind(since);
        builder.push(" OR cfw.updated_at > ");
        builder.push_bind(since);
        builder.push(")");
    }
    builder.push(" GROUP BY p.id ORDER BY p.updated_at, p.id");
    push_page(&mut builder, page);
    builder
}
