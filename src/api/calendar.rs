use super::query::Query;
use super::types::{AnalyticsParams, CalendarEvent, CalendarEventInput, CalendarRange, Page};
use crate::client::SessionClient;
use crate::envelope::ApiResponse;
use serde_json::Value;

impl SessionClient {
    pub async fn list_calendar_events(&self, range: CalendarRange) -> ApiResponse<Page<CalendarEvent>> {
        let path = Query::new()
            .opt("start_date", Some(range.start_date))
            .opt("end_date", Some(range.end_date))
            .apply(&self.config().api_path("calendar/events/"));
        self.get(&path).await
    }

    pub async fn create_calendar_event(&self, input: &CalendarEventInput) -> ApiResponse<CalendarEvent> {
        self.post(&self.config().api_path("calendar/events/"), input)
            .await
    }

    /// Tenant-wide dashboard metrics. The shape varies by deployment, so it stays untyped.
    pub async fn admin_analytics(&self, params: AnalyticsParams) -> ApiResponse<Value> {
        let path = Query::new()
            .opt("period_days", params.period_days)
            .apply(&self.config().api_path("admin/analytics/"));
        self.get(&path).await
    }
}
