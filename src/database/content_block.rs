use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::content_block::ContentBlock;

impl PostgresRepository {
    pub async fn get_content_block(&self, key: &str) -> Result<Option<ContentBlock>, AppError> {
        let block = sqlx::query_as::<_, ContentBlock>(
            r#"
            SELECT id, key, content
            FROM content_blocks
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(block)
    }
}
