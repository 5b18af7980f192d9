use crate::client::{SessionClient, UploadForm, UploadProgress};
use crate::envelope::ApiResponse;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

impl SessionClient {
    /// Uploads a document for review. Retried once after a token refresh.
    pub async fn upload_review_document(
        &self,
        form: UploadForm,
        cancel: Option<&CancellationToken>,
    ) -> ApiResponse<Value> {
        let path = self.config().api_path("review-contracts/");
        self.upload(&path, form, cancel).await
    }

    pub async fn upload_review_document_with_progress<P>(
        &self,
        form: UploadForm,
        progress: P,
        cancel: Option<&CancellationToken>,
    ) -> ApiResponse<Value>
    where
        P: Fn(UploadProgress) + Send + Sync + 'static,
    {
        let path = self.config().api_path("review-contracts/");
        self.upload_with_progress(&path, form, progress, cancel)
            .await
    }
}
