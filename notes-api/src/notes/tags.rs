use rusqlite::{Connection, Row};

use super::{NoteId, Tag};

impl<'a> TryFrom<&Row<'a>> for Tag {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'a>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    }
}

/// Trims names, drops blank ones and collapses repeats, keeping first-seen order.
/// Matching stays case-sensitive.
pub fn normalize(names: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim();
        if !name.is_empty() && !normalized.iter().any(|n| n == name) {
            normalized.push(name.to_owned());
        }
    }
    normalized
}

/// Atomic get-or-create: concurrent writers racing on a new name both end up with the same row.
pub fn get_or_create(conn: &Connection, names: &[String]) -> rusqlite::Result<Vec<Tag>> {
    let mut insert = conn.prepare_cached("INSERT INTO tags (name) VALUES (?) ON CONFLICT (name) DO NOTHING")?;
    let mut select = conn.prepare_cached("SELECT id, name FROM tags WHERE name = ?")?;

    names
        .iter()
        .map(|name| {
            insert.execute([name])?;
            select.query_row([name], |r| Tag::try_from(r))
        })
        .collect()
}

pub fn link(conn: &Connection, note_id: NoteId, tags: &[Tag]) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare_cached("INSERT INTO note_tags (note_id, tag_id) VALUES (?, ?)")?;
    for tag in tags {
        stmt.execute([note_id, tag.id])?;
    }
    Ok(())
}

pub fn unlink_all(conn: &Connection, note_id: NoteId) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM note_tags WHERE note_id = ?", [note_id])
}

/// Tags of one note in the order they were attached.
pub fn for_note(conn: &Connection, note_id: NoteId) -> rusqlite::Result<Vec<Tag>> {
    let mut stmt = conn.prepare_cached(
        r#"SELECT tags.id, tags.name FROM note_tags
        JOIN tags ON tags.id = note_tags.tag_id
        WHERE note_tags.note_id = ?
        ORDER BY note_tags.rowid"#,
    )?;
    let tags = stmt
        .query_map([note_id], |r| Tag::try_from(r))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        crate::db::migrations::MIGRATIONS.to_latest(&mut conn).unwrap();
        conn
    }

    #[test]
    fn normalize_drops_blanks_and_repeats() {
        assert_eq!(
            normalize(names(&[" x", "y", "", "x", "  ", "X"])),
            names(&["x", "y", "X"])
        );
        assert!(normalize(vec![]).is_empty());
    }

    #[test]
    fn get_or_create_reuses_rows() {
        let conn = conn();

        let first = get_or_create(&conn, &names(&["x", "y"])).unwrap();
        let second = get_or_create(&conn, &names(&["y", "z"])).unwrap();

        assert_eq!(first[1], second[0]);
        assert_ne!(second[1].id, first[0].id);

        let count: i64 = conn.query_row("SELECT count(*) FROM tags", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 3);
    }
}
