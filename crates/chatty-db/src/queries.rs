use crate::models::{EnrichedMessageRow, NewMessage, UserRow, now_timestamp};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, ErrorCode, Row};

/// Returned by `create_user` when the email is already registered.
#[derive(Debug, thiserror::Error)]
#[error("email already registered")]
pub struct DuplicateEmail;

const USER_COLUMNS: &str = "id, email, full_name, password, profile_pic, created_at, updated_at";

// Both participants are resolved in one query; a dangling id reads as "unknown".
const ENRICHED_SELECT: &str =
    "SELECT m.id, m.sender_id, s.full_name, s.profile_pic,
            m.recipient_id, r.full_name, r.profile_pic,
            m.text, m.image, m.created_at
     FROM messages m
     LEFT JOIN users s ON m.sender_id = s.id
     LEFT JOIN users r ON m.recipient_id = r.id";

const CONVERSATION_FILTER: &str =
    "(m.sender_id = ?1 AND m.recipient_id = ?2) OR (m.sender_id = ?2 AND m.recipient_id = ?1)";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        full_name: &str,
        password_hash: &str,
    ) -> Result<UserRow> {
        let now = now_timestamp();
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, email, full_name, password, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                (id, email, full_name, password_hash, &now),
            );
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    return Err(DuplicateEmail.into());
                }
                Err(e) => return Err(e.into()),
            }

            Ok(UserRow {
                id: id.to_string(),
                email: email.to_string(),
                full_name: full_name.to_string(),
                password: password_hash.to_string(),
                profile_pic: None,
                created_at: now.clone(),
                updated_at: now.clone(),
            })
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Every account except `id`, ordered by name for the sidebar.
    pub fn list_users_except(&self, id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id != ?1 ORDER BY full_name COLLATE NOCASE"
            ))?;
            let rows = stmt
                .query_map([id], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns the updated row, or `None` if the user does not exist.
    pub fn update_profile_pic(&self, id: &str, url: &str) -> Result<Option<UserRow>> {
        let now = now_timestamp();
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET profile_pic = ?1, updated_at = ?2 WHERE id = ?3",
                (url, &now, id),
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_user(conn, "id", id)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, message: &NewMessage<'_>) -> Result<()> {
        let now = now_timestamp();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, recipient_id, text, image, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    message.id,
                    message.sender_id,
                    message.recipient_id,
                    message.text,
                    message.image,
                    now
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_enriched_message(&self, id: &str) -> Result<Option<EnrichedMessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{ENRICHED_SELECT} WHERE m.id = ?1"))?;
            stmt.query_row([id], enriched_from_row).optional()
        })
    }

    /// One page of the conversation between `a` and `b`, oldest first.
    pub fn get_conversation(
        &self,
        a: &str,
        b: &str,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<EnrichedMessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{ENRICHED_SELECT}
                 WHERE {CONVERSATION_FILTER}
                 ORDER BY m.created_at ASC, m.rowid ASC
                 LIMIT ?3 OFFSET ?4"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![a, b, limit, offset], enriched_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_conversation(&self, a: &str, b: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM messages m WHERE {CONVERSATION_FILTER}"),
                [a, b],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"))?;
    stmt.query_row([value], user_from_row).optional()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        full_name: row.get(2)?,
        password: row.get(3)?,
        profile_pic: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn enriched_from_row(row: &Row<'_>) -> rusqlite::Result<EnrichedMessageRow> {
    Ok(EnrichedMessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        sender_name: row.get::<_, Option<String>>(2)?.unwrap_or_else(|| "unknown".to_string()),
        sender_pic: row.get(3)?,
        recipient_id: row.get(4)?,
        recipient_name: row.get::<_, Option<String>>(5)?.unwrap_or_else(|| "unknown".to_string()),
        recipient_pic: row.get(6)?,
        text: row.get(7)?,
        image: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(db: &Database, email: &str, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_user(&id, email, name, "hash").unwrap();
        id
    }

    fn send(db: &Database, from: &str, to: &str, text: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.insert_message(&NewMessage {
            id: &id,
            sender_id: from,
            recipient_id: to,
            text,
            image: None,
        })
        .unwrap();
        id
    }

    #[test]
    fn duplicate_email_is_typed() {
        let db = Database::open_in_memory().unwrap();
        user(&db, "a@example.com", "Alice");

        let err = db
            .create_user(&Uuid::new_v4().to_string(), "a@example.com", "Other", "hash")
            .unwrap_err();
        assert!(err.downcast_ref::<DuplicateEmail>().is_some());
    }

    #[test]
    fn list_users_excludes_caller() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "a@example.com", "Alice");
        user(&db, "b@example.com", "Bob");
        user(&db, "c@example.com", "Carol");

        let others = db.list_users_except(&alice).unwrap();
        let names: Vec<_> = others.iter().map(|u| u.full_name.as_str()).collect();
        assert_eq!(names, vec!["Bob", "Carol"]);
    }

    #[test]
    fn enriched_message_resolves_both_sides() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "a@example.com", "Alice");
        let bob = user(&db, "b@example.com", "Bob");
        db.update_profile_pic(&bob, "https://cdn/bob.jpg").unwrap();

        let id = send(&db, &alice, &bob, "hello");
        let msg = db.get_enriched_message(&id).unwrap().unwrap().into_message();

        assert_eq!(msg.sender.name, "Alice");
        assert_eq!(msg.recipient.name, "Bob");
        assert_eq!(msg.recipient.avatar_url.as_deref(), Some("https://cdn/bob.jpg"));
        assert_eq!(msg.text, "hello");
        assert!(msg.image.is_none());
    }

    #[test]
    fn conversation_includes_both_directions_only() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "a@example.com", "Alice");
        let bob = user(&db, "b@example.com", "Bob");
        let carol = user(&db, "c@example.com", "Carol");

        send(&db, &alice, &bob, "one");
        send(&db, &bob, &alice, "two");
        send(&db, &alice, &carol, "elsewhere");

        let page = db.get_conversation(&bob, &alice, 0, 50).unwrap();
        let texts: Vec<_> = page.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert_eq!(db.count_conversation(&alice, &bob).unwrap(), 2);
    }

    #[test]
    fn conversation_pages_keep_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "a@example.com", "Alice");
        let bob = user(&db, "b@example.com", "Bob");

        for i in 1..=120 {
            send(&db, &alice, &bob, &format!("m{i}"));
        }

        let first = db.get_conversation(&alice, &bob, 0, 50).unwrap();
        assert_eq!(first.len(), 50);
        assert_eq!(first[0].text, "m1");
        assert_eq!(first[49].text, "m50");

        let last = db.get_conversation(&alice, &bob, 100, 50).unwrap();
        assert_eq!(last.len(), 20);
        assert_eq!(last[19].text, "m120");
    }

    #[test]
    fn update_profile_pic_unknown_user() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.update_profile_pic("missing", "x").unwrap().is_none());
    }
}
