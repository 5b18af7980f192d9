use super::query::{segment, Query};
use super::types::{
    Clause, ClauseListParams, ContractTemplate, Page, TemplateInput, TemplateListParams,
};
use crate::client::SessionClient;
use crate::envelope::ApiResponse;

impl SessionClient {
    pub async fn list_templates(
        &self,
        params: &TemplateListParams,
    ) -> ApiResponse<Page<ContractTemplate>> {
        let path = Query::new()
            .opt("contract_type", params.contract_type.as_deref())
            .apply(&self.config().api_path("contract-templates/"));
        self.get(&path).await
    }

    pub async fn get_template(&self, id: &str) -> ApiResponse<ContractTemplate> {
        let path = self
            .config()
            .api_path(&format!("contract-templates/{}/", segment(id)));
        self.get(&path).await
    }

    pub async fn create_template(&self, input: &TemplateInput) -> ApiResponse<ContractTemplate> {
        self.post(&self.config().api_path("contract-templates/"), input)
            .await
    }

    pub async fn list_clauses(&self, params: &ClauseListParams) -> ApiResponse<Page<Clause>> {
        let path = Query::new()
            .opt("contract_type", params.contract_type.as_deref())
            .opt("search", params.search.as_deref())
            .apply(&self.config().api_path("clauses/"));
        self.get(&path).await
    }
}
