use lazy_static::lazy_static;
use rusqlite_migration::{Migrations, M};

lazy_static! {
    pub static ref MIGRATIONS: Migrations<'static> = Migrations::new(vec![
        M::up(
            r#"
            CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT UNIQUE,
                hashed_password TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                telegram_id INTEGER UNIQUE,

                CHECK (email IS NOT NULL OR telegram_id IS NOT NULL)
            );
        "#
        ),
        M::up(
            r#"
            CREATE TABLE notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,

                title TEXT NOT NULL,
                content TEXT NOT NULL,
                user_id INTEGER NOT NULL,

                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,

                FOREIGN KEY (user_id) REFERENCES users (id)
            );
            CREATE INDEX notes_user_id ON notes (user_id);
            CREATE INDEX notes_title ON notes (title);
        "#
        ),
        M::up(
            r#"
            CREATE TABLE tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE note_tags (
                note_id INTEGER NOT NULL,
                tag_id INTEGER NOT NULL,

                PRIMARY KEY (note_id, tag_id),
                FOREIGN KEY (note_id) REFERENCES notes (id),
                FOREIGN KEY (tag_id) REFERENCES tags (id)
            );
            CREATE INDEX note_tags_tag_id ON note_tags (tag_id);
        "#
        ),
    ]);
}
