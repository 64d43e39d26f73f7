//! Bearer-token session lookup.
//!
//! Stands in for the hosted authentication provider: a session row maps an
//! opaque bearer token to a user id.

use chrono::Utc;
use rusqlite::params;

use vanish_shared::types::UserId;

use crate::convert::uuid_col;
use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Record a session token for a user.
    pub fn create_session(&self, token: &str, user_id: UserId) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO sessions (token, user_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![token, user_id.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Resolve a bearer token to its user, or `None` if unknown.
    pub fn user_for_token(&self, token: &str) -> Result<Option<UserId>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT user_id FROM sessions WHERE token = ?1")?;

        let mut rows = stmt.query_map(params![token], |row| uuid_col(row, 0))?;
        match rows.next() {
            Some(row) => Ok(Some(UserId(row?))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::insert_profile;

    #[test]
    fn token_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let user = insert_profile(&db, "ada");

        db.create_session("tok-1", user).unwrap();
        assert_eq!(db.user_for_token("tok-1").unwrap(), Some(user));
        assert_eq!(db.user_for_token("tok-2").unwrap(), None);
    }
}
