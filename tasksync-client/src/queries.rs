/// SQL queries for the local key/value store
pub struct Queries;

impl Queries {
    pub const GET_VALUE: &'static str = "SELECT value FROM kv_store WHERE key = ?1";

    pub const UPSERT_VALUE: &'static str = r#"
        INSERT INTO kv_store (key, value, updated_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
    "#;

    pub const DELETE_VALUE: &'static str = "DELETE FROM kv_store WHERE key = ?1";
}
