//! Saved section storage
//!
//! User-defined verse ranges for memorization drills.

use crate::error::{Error, Result};
use sqlx::{Pool, Sqlite};
use tilawa_common::SavedSection;
use uuid::Uuid;

type SectionRow = (String, String, i64, i64, i64);

fn from_row(row: SectionRow) -> Result<SavedSection> {
    let (id, name, surah_number, start_ayah, end_ayah) = row;

    let id = Uuid::parse_str(&id)
        .map_err(|e| Error::Internal(format!("Corrupt section id '{}': {}", id, e)))?;
    let to_u16 = |value: i64, field: &str| {
        u16::try_from(value)
            .map_err(|_| Error::Internal(format!("Section {} has invalid {}: {}", id, field, value)))
    };

    Ok(SavedSection {
        id,
        name,
        surah_number: to_u16(surah_number, "surah_number")?,
        start_ayah: to_u16(start_ayah, "start_ayah")?,
        end_ayah: to_u16(end_ayah, "end_ayah")?,
    })
}

/// All sections, oldest first
pub async fn list_sections(db: &Pool<Sqlite>) -> Result<Vec<SavedSection>> {
    let rows: Vec<SectionRow> = sqlx::query_as(
        r#"
        SELECT id, name, surah_number, start_ayah, end_ayah
        FROM saved_sections
        ORDER BY created_at, rowid
        "#,
    )
    .fetch_all(db)
    .await?;

    rows.into_iter().map(from_row).collect()
}

pub async fn get_section(db: &Pool<Sqlite>, id: Uuid) -> Result<SavedSection> {
    let row: Option<SectionRow> = sqlx::query_as(
        "SELECT id, name, surah_number, start_ayah, end_ayah FROM saved_sections WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(db)
    .await?;

    match row {
        Some(row) => from_row(row),
        None => Err(Error::NotFound(format!("Section {}", id))),
    }
}

pub async fn insert_section(db: &Pool<Sqlite>, section: &SavedSection) -> Result<()> {
    section.validate()?;

    sqlx::query(
        r#"
        INSERT INTO saved_sections (id, name, surah_number, start_ayah, end_ayah)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(section.id.to_string())
    .bind(section.name.trim())
    .bind(section.surah_number as i64)
    .bind(section.start_ayah as i64)
    .bind(section.end_ayah as i64)
    .execute(db)
    .await?;

    Ok(())
}

pub async fn delete_section(db: &Pool<Sqlite>, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM saved_sections WHERE id = ?")
        .bind(id.to_string())
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Section {}", id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_schema;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_insert_list_get_delete() {
        let db = setup_test_db().await;

        let kursi = SavedSection::new("Ayat al-Kursi", 2, 255, 257).unwrap();
        let mulk = SavedSection::new("Al-Mulk opening", 67, 1, 5).unwrap();
        insert_section(&db, &kursi).await.unwrap();
        insert_section(&db, &mulk).await.unwrap();

        let all = list_sections(&db).await.unwrap();
        assert_eq!(all, vec![kursi.clone(), mulk.clone()]);

        assert_eq!(get_section(&db, mulk.id).await.unwrap(), mulk);

        delete_section(&db, kursi.id).await.unwrap();
        assert!(matches!(get_section(&db, kursi.id).await, Err(Error::NotFound(_))));
        assert!(matches!(delete_section(&db, kursi.id).await, Err(Error::NotFound(_))));
        assert_eq!(list_sections(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_section_not_stored() {
        let db = setup_test_db().await;

        let section = SavedSection {
            id: Uuid::new_v4(),
            name: "Backwards".to_string(),
            surah_number: 2,
            start_ayah: 10,
            end_ayah: 5,
        };
        assert!(insert_section(&db, &section).await.is_err());
        assert!(list_sections(&db).await.unwrap().is_empty());
    }
}
