use super::types::{Document, Page, RepositoryFolder};
use crate::client::SessionClient;
use crate::envelope::ApiResponse;
use serde_json::Value;

impl SessionClient {
    pub async fn list_documents(&self) -> ApiResponse<Page<Document>> {
        self.get(&self.config().api_path("documents/")).await
    }

    /// The repository root listing. Its shape depends on the storage backend, so it
    /// is returned undecoded.
    pub async fn repository_contents(&self) -> ApiResponse<Value> {
        self.get(&self.config().api_path("repository/")).await
    }

    pub async fn list_repository_folders(&self) -> ApiResponse<Page<RepositoryFolder>> {
        self.get(&self.config().api_path("repository/folders/"))
            .await
    }
}
