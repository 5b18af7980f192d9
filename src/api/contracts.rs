use super::query::{segment, Query};
use super::types::{
    Contract, ContractInput, ContractListParams, ContractVersion, NewContractVersion, Page,
};
use crate::client::{Blob, SessionClient};
use crate::envelope::ApiResponse;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

impl SessionClient {
    fn contract_path(&self, id: &str, action: &str) -> String {
        self.config()
            .api_path(&format!("contracts/{}/{action}", segment(id)))
    }

    pub async fn list_contracts(&self, params: &ContractListParams) -> ApiResponse<Page<Contract>> {
        let path = Query::new()
            .opt("status", params.status.as_deref())
            .opt("contract_type", params.contract_type.as_deref())
            .opt("search", params.search.as_deref())
            .opt("page", params.page)
            .opt("page_size", params.page_size)
            .apply(&self.config().api_path("contracts/"));
        self.get(&path).await
    }

    pub async fn get_contract(&self, id: &str) -> ApiResponse<Contract> {
        self.get(&self.contract_path(id, "")).await
    }

    pub async fn create_contract(&self, input: &ContractInput) -> ApiResponse<Contract> {
        self.post(&self.config().api_path("contracts/"), input).await
    }

    pub async fn update_contract(&self, id: &str, input: &ContractInput) -> ApiResponse<Contract> {
        self.put(&self.contract_path(id, ""), input).await
    }

    pub async fn delete_contract(&self, id: &str) -> ApiResponse<Value> {
        self.delete(&self.contract_path(id, "")).await
    }

    pub async fn clone_contract(&self, id: &str, title: &str) -> ApiResponse<Contract> {
        self.post(&self.contract_path(id, "clone/"), &json!({"title": title}))
            .await
    }

    pub async fn list_contract_versions(&self, id: &str) -> ApiResponse<Page<ContractVersion>> {
        self.get(&self.contract_path(id, "versions/")).await
    }

    pub async fn create_contract_version(
        &self,
        id: &str,
        version: &NewContractVersion,
    ) -> ApiResponse<ContractVersion> {
        self.post(&self.contract_path(id, "create-version/"), version)
            .await
    }

    pub async fn download_contract_pdf(
        &self,
        id: &str,
        cancel: Option<&CancellationToken>,
    ) -> ApiResponse<Blob> {
        self.download(&self.contract_path(id, "download-pdf/"), cancel)
            .await
    }
}
