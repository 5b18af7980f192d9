use super::query::segment;
use super::types::{AiGenerateRequest, TemplateGenerateRequest};
use crate::client::{ApiRequest, SessionClient};
use crate::stream::{Draft, DraftObserver, GenerationEvent, GenerationStream};

impl SessionClient {
    /// Streams an AI draft for a contract, calling `on_update` after every frame.
    pub fn generate_contract_draft<F>(
        &self,
        contract_id: &str,
        request: &AiGenerateRequest,
        on_update: F,
    ) -> GenerationStream
    where
        F: FnMut(&GenerationEvent, &Draft) + Send + 'static,
    {
        let path = self
            .config()
            .api_path(&format!("contracts/{}/ai/generate-stream/", segment(contract_id)));
        self.start_generation(ApiRequest::post(path).json(request), on_update)
    }

    pub fn generate_template_draft<F>(
        &self,
        request: &TemplateGenerateRequest,
        on_update: F,
    ) -> GenerationStream
    where
        F: FnMut(&GenerationEvent, &Draft) + Send + 'static,
    {
        let path = self.config().api_path("ai/generate/template-stream/");
        self.start_generation(ApiRequest::post(path).json(request), on_update)
    }

    fn start_generation<F>(&self, request: ApiRequest, on_update: F) -> GenerationStream
    where
        F: FnMut(&GenerationEvent, &Draft) + Send + 'static,
    {
        tracing::debug!(path = request.path(), "starting draft generation");
        let observer = DraftObserver::new(on_update);
        let draft = observer.draft_handle();
        let subscription = self.open_stream(request, observer);
        GenerationStream::new(subscription, draft)
    }
}
