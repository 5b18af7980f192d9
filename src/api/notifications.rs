use super::types::{Notification, NotificationInput, Page};
use crate::client::SessionClient;
use crate::envelope::ApiResponse;

impl SessionClient {
    pub async fn create_notification(&self, input: &NotificationInput) -> ApiResponse<Notification> {
        self.post(&self.config().api_path("notifications/"), input)
            .await
    }

    pub async fn list_notifications(&self) -> ApiResponse<Page<Notification>> {
        self.get(&self.config().api_path("notifications/")).await
    }
}
