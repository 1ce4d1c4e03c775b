use rusqlite::{params, Connection, Row};
use sea_query::{Expr, Func, Iden, Order, Query, SqliteQueryBuilder};
use sea_query_rusqlite::RusqliteBinder;

use crate::{ctx::BaseParams, db, users::UserId, Error, Result};

use super::{tags, Note, NoteBody, NoteId, SearchQuery};

#[derive(Iden)]
pub enum Notes {
    Table,
    Id,
    Title,
    Content,
    UserId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum Tags {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
pub enum NoteTags {
    Table,
    NoteId,
    TagId,
}

const NOTE_COLUMNS: &str = "id, title, content, user_id, created_at, updated_at";

impl<'a> TryFrom<&Row<'a>> for Note {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'a>) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            user_id: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
            tags: vec![],
        })
    }
}

fn with_tags(conn: &Connection, notes: Vec<Note>) -> rusqlite::Result<Vec<Note>> {
    notes
        .into_iter()
        .map(|note| {
            let tags = tags::for_note(conn, note.id)?;
            Ok(Note { tags, ..note })
        })
        .collect()
}

pub async fn find_notes(BaseParams { db, ctx }: BaseParams) -> Result<Vec<Note>> {
    let user_id = ctx.user_id();
    db.call(move |conn| {
        let notes = conn
            .prepare(&format!("SELECT {NOTE_COLUMNS} FROM notes WHERE user_id = ? ORDER BY id"))?
            .query_map([user_id], |row| Note::try_from(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(with_tags(conn, notes)?)
    })
    .await
    .map_err(db::Error::from)
    .map_err(Error::from)
}

pub async fn create_note(
    NoteBody { title, content, tags }: NoteBody,
    BaseParams { db, ctx }: BaseParams,
) -> Result<Note> {
    let user_id = ctx.user_id();
    let names = tags::normalize(tags);

    let note = db
        .call(move |conn| {
            let tx = conn.transaction()?;

            let note = tx.query_row(
                &format!(
                    "INSERT INTO notes (title, content, user_id) VALUES (?, ?, ?) RETURNING {NOTE_COLUMNS}"
                ),
                params![title, content, user_id],
                |row| Note::try_from(row),
            )?;
            let tags = tags::get_or_create(&tx, &names)?;
            tags::link(&tx, note.id, &tags)?;

            tx.commit()?;
            Ok(Note { tags, ..note })
        })
        .await
        .map_err(db::Error::from)?;

    tracing::info!(note_id = note.id, user_id, tags = note.tags.len(), "note created");
    Ok(note)
}

/// Owner-scoped: a note of another user is reported exactly like a missing one.
pub async fn update_note(
    note_id: NoteId,
    NoteBody { title, content, tags }: NoteBody,
    BaseParams { db, ctx }: BaseParams,
) -> Result<Note> {
    let user_id = ctx.user_id();
    let names = tags::normalize(tags);

    let note = db
        .call(move |conn| {
            let tx = conn.transaction()?;

            let note = tx.query_row(
                &format!(
                    r#"UPDATE notes SET title = ?, content = ?, updated_at = ?
                    WHERE id = ? AND user_id = ?
                    RETURNING {NOTE_COLUMNS}"#
                ),
                params![title, content, chrono::Utc::now(), note_id, user_id],
                |row| Note::try_from(row),
            )?;
            tags::unlink_all(&tx, note.id)?;
            let tags = tags::get_or_create(&tx, &names)?;
            tags::link(&tx, note.id, &tags)?;

            tx.commit()?;
            Ok(Note { tags, ..note })
        })
        .await
        .map_err(db::Error::from)
        .map_err(|e| e.not_found_message("Note not found"))?;

    tracing::info!(note_id, user_id, "note updated");
    Ok(note)
}

/// Tag rows stay behind even when no note references them anymore.
pub async fn delete_note(note_id: NoteId, BaseParams { db, ctx }: BaseParams) -> Result<()> {
    let user_id = ctx.user_id();

    db.call(move |conn| {
        let tx = conn.transaction()?;

        let note_id: NoteId = tx.query_row(
            "SELECT id FROM notes WHERE id = ? AND user_id = ?",
            [note_id, user_id],
            |r| r.get(0),
        )?;
        tags::unlink_all(&tx, note_id)?;
        tx.execute("DELETE FROM notes WHERE id = ?", [note_id])?;

        tx.commit()?;
        Ok(())
    })
    .await
    .map_err(db::Error::from)
    .map_err(|e| e.not_found_message("Note not found"))?;

    tracing::info!(note_id, user_id, "note deleted");
    Ok(())
}

/// Notes of the caller carrying every requested tag.
pub async fn search_notes(SearchQuery { tags }: SearchQuery, BaseParams { db, ctx }: BaseParams) -> Result<Vec<Note>> {
    let names = tags::normalize(tags);
    if names.is_empty() {
        return Err(Error::Validation("at least one tag is required".into()));
    }

    let user_id = ctx.user_id();
    db.call(move |conn| {
        let (sql, values) = search_query(user_id, &names).build_rusqlite(SqliteQueryBuilder);

        let notes = conn
            .prepare(&sql)?
            .query_map(&*values.as_params(), |row| Note::try_from(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(with_tags(conn, notes)?)
    })
    .await
    .map_err(db::Error::from)
    .map_err(Error::from)
}

/// Groups matching (note, tag) pairs per note and keeps the groups that matched every name.
/// `names` must be free of duplicates.
fn search_query(user_id: UserId, names: &[String]) -> sea_query::SelectStatement {
    Query::select()
        .columns([
            (Notes::Table, Notes::Id),
            (Notes::Table, Notes::Title),
            (Notes::Table, Notes::Content),
            (Notes::Table, Notes::UserId),
            (Notes::Table, Notes::CreatedAt),
            (Notes::Table, Notes::UpdatedAt),
        ])
        .from(Notes::Table)
        .inner_join(
            NoteTags::Table,
            Expr::col((NoteTags::Table, NoteTags::NoteId)).equals((Notes::Table, Notes::Id)),
        )
        .inner_join(
            Tags::Table,
            Expr::col((Tags::Table, Tags::Id)).equals((NoteTags::Table, NoteTags::TagId)),
        )
        .and_where(Expr::col((Notes::Table, Notes::UserId)).eq(user_id))
        .and_where(Expr::col((Tags::Table, Tags::Name)).is_in(names.iter().cloned()))
        .group_by_col((Notes::Table, Notes::Id))
        .and_having(Expr::expr(Func::count(Expr::col((Tags::Table, Tags::Id)))).eq(names.len() as i64))
        .order_by((Notes::Table, Notes::Id), Order::Asc)
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ctx::Ctx,
        db::{init_test_db, DB},
        users::handlers::{create, CreateUserParameters},
    };

    async fn base(db: &DB, telegram_id: i64) -> BaseParams {
        let user = create(
            db.clone(),
            CreateUserParameters {
                email: None,
                hashed_password: None,
                telegram_id: Some(telegram_id),
            },
        )
        .await
        .unwrap();
        BaseParams::new(db.clone(), Ctx::new(user))
    }

    fn body(title: &str, tags: &[&str]) -> NoteBody {
        NoteBody {
            title: title.into(),
            content: format!("{title} content"),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn tag_names(note: &Note) -> Vec<&str> {
        note.tags.iter().map(|t| t.name.as_str()).collect()
    }

    fn query(tags: &[&str]) -> SearchQuery {
        SearchQuery {
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn create_dedupes_tags() -> Result<()> {
        let db = init_test_db().await?;
        let alice = base(&db, 1).await;

        let note = create_note(body("T", &["x", "y", "x"]), alice.clone()).await?;
        assert_eq!(tag_names(&note), ["x", "y"]);
        assert_eq!(note.user_id, alice.ctx.user_id());

        let listed = find_notes(alice).await?;
        assert_eq!(listed.len(), 1);
        assert_eq!(tag_names(&listed[0]), ["x", "y"]);
        Ok(())
    }

    #[tokio::test]
    async fn update_replaces_tags_wholesale() -> Result<()> {
        let db = init_test_db().await?;
        let alice = base(&db, 1).await;

        let note = create_note(body("T", &["a", "b"]), alice.clone()).await?;
        let updated = update_note(note.id, body("T2", &["b", "c"]), alice.clone()).await?;

        assert_eq!(updated.title, "T2");
        assert_eq!(tag_names(&updated), ["b", "c"]);
        assert!(updated.updated_at >= note.updated_at);

        let listed = find_notes(alice).await?;
        assert_eq!(tag_names(&listed[0]), ["b", "c"]);
        Ok(())
    }

    #[tokio::test]
    async fn other_users_notes_are_not_found() -> Result<()> {
        let db = init_test_db().await?;
        let alice = base(&db, 1).await;
        let bob = base(&db, 2).await;

        let note = create_note(body("T", &["x"]), alice.clone()).await?;

        assert!(find_notes(bob.clone()).await?.is_empty());
        assert!(search_notes(query(&["x"]), bob.clone()).await?.is_empty());

        let res = update_note(note.id, body("hijack", &[]), bob.clone()).await;
        assert!(matches!(res, Err(Error::NotFound(msg)) if msg == "Note not found"));

        let res = delete_note(note.id, bob).await;
        assert!(matches!(res, Err(Error::NotFound(_))));

        assert_eq!(find_notes(alice).await?[0].title, "T");
        Ok(())
    }

    #[tokio::test]
    async fn delete_keeps_shared_tags() -> Result<()> {
        let db = init_test_db().await?;
        let alice = base(&db, 1).await;

        let first = create_note(body("first", &["x", "y"]), alice.clone()).await?;
        create_note(body("second", &["x"]), alice.clone()).await?;

        delete_note(first.id, alice.clone()).await?;

        let (links, tags) = db
            .call(|conn| {
                let links: i64 = conn.query_row("SELECT count(*) FROM note_tags", [], |r| r.get(0))?;
                let tags: i64 = conn.query_row("SELECT count(*) FROM tags", [], |r| r.get(0))?;
                Ok((links, tags))
            })
            .await
            .unwrap();
        assert_eq!(links, 1);
        assert_eq!(tags, 2);

        let res = delete_note(first.id, alice).await;
        assert!(matches!(res, Err(Error::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn search_is_an_intersection() -> Result<()> {
        let db = init_test_db().await?;
        let alice = base(&db, 1).await;

        let both = create_note(body("both", &["a", "b"]), alice.clone()).await?;
        create_note(body("only a", &["a"]), alice.clone()).await?;
        let all = create_note(body("all", &["a", "b", "c"]), alice.clone()).await?;

        let found = search_notes(query(&["a", "b"]), alice.clone()).await?;
        let ids: Vec<_> = found.iter().map(|n| n.id).collect();
        assert_eq!(ids, [both.id, all.id]);
        assert_eq!(tag_names(&found[1]), ["a", "b", "c"]);

        let found = search_notes(query(&["a", "b", "a"]), alice.clone()).await?;
        assert_eq!(found.len(), 2);

        assert!(search_notes(query(&["a", "z"]), alice.clone()).await?.is_empty());

        let res = search_notes(query(&[" ", ""]), alice).await;
        assert!(matches!(res, Err(Error::Validation(_))));
        Ok(())
    }

    #[test]
    fn search_query_shape() {
        let (sql, _) = search_query(1, &["a".into(), "b".into()]).build_rusqlite(SqliteQueryBuilder);
        assert!(sql.contains("GROUP BY"));
        assert!(sql.contains("HAVING COUNT("));
    }
}
