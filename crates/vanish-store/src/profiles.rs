//! CRUD operations for [`Profile`] records.

use rusqlite::params;

use vanish_shared::records::Profile;
use vanish_shared::types::UserId;

use crate::convert::{ts_col, uuid_col};
use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    /// Insert or update a profile.
    pub fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        self.conn().execute(
            "INSERT INTO profiles (user_id, username, display_name, avatar_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                 username = excluded.username,
                 display_name = excluded.display_name,
                 avatar_url = excluded.avatar_url",
            params![
                profile.user_id.to_string(),
                profile.username,
                profile.display_name,
                profile.avatar_url,
                profile.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch a single profile by user id.
    pub fn get_profile(&self, user_id: UserId) -> Result<Profile> {
        self.conn()
            .query_row(
                "SELECT user_id, username, display_name, avatar_url, created_at
                 FROM profiles WHERE user_id = ?1",
                params![user_id.to_string()],
                row_to_profile,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }
}

pub(crate) fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        user_id: UserId(uuid_col(row, 0)?),
        username: row.get(1)?,
        display_name: row.get(2)?,
        avatar_url: row.get(3)?,
        created_at: ts_col(row, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn upsert_and_get() {
        let db = Database::open_in_memory().unwrap();
        let user = UserId::new();

        let mut profile = Profile {
            user_id: user,
            username: "ada".into(),
            display_name: None,
            avatar_url: None,
            created_at: Utc::now(),
        };
        db.upsert_profile(&profile).unwrap();

        profile.display_name = Some("Ada".into());
        db.upsert_profile(&profile).unwrap();

        let loaded = db.get_profile(user).unwrap();
        assert_eq!(loaded.username, "ada");
        assert_eq!(loaded.display_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn missing_profile_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.get_profile(UserId::new()),
            Err(StoreError::NotFound)
        ));
    }
}
