use super::types::{MetadataField, MetadataFieldInput, Page, Workflow, WorkflowInput};
use crate::client::SessionClient;
use crate::envelope::ApiResponse;

impl SessionClient {
    pub async fn create_workflow(&self, input: &WorkflowInput) -> ApiResponse<Workflow> {
        self.post(&self.config().api_path("workflows/"), input).await
    }

    pub async fn list_workflows(&self) -> ApiResponse<Page<Workflow>> {
        self.get(&self.config().api_path("workflows/")).await
    }

    /// Custom fields attached to contracts and documents.
    pub async fn create_metadata_field(
        &self,
        input: &MetadataFieldInput,
    ) -> ApiResponse<MetadataField> {
        self.post(&self.config().api_path("metadata/fields/"), input)
            .await
    }

    pub async fn list_metadata_fields(&self) -> ApiResponse<Page<MetadataField>> {
        self.get(&self.config().api_path("metadata/fields/")).await
    }
}
