use rocket::serde::Serialize;
use schemars::JsonSchema;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContentBlock {
    pub id: Uuid,
    pub key: String,
    pub content: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ContentBlockResponse {
    pub key: String,
    pub content: String,
}

impl From<&ContentBlock> for ContentBlockResponse {
    fn from(block: &ContentBlock) -> Self {
        Self {
            key: block.key.clone(),
            content: block.content.clone(),
        }
    }
}
