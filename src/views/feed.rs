use chrono::{DateTime, Utc};

use super::ViewState;
use crate::client::ApiClient;
use crate::models::{FeedItem, FeedQuery, FeedResponse};

const LOAD_ERROR: &str = "Failed to load feed";
const MAX_TAGS: usize = 3;

/// The dashboard feed.
pub struct FeedView {
    query: FeedQuery,
    state: ViewState<FeedResponse>,
}

impl FeedView {
    pub fn new(query: FeedQuery) -> Self {
        Self {
            query,
            state: ViewState::Loading,
        }
    }

    pub fn state(&self) -> &ViewState<FeedResponse> {
        &self.state
    }

    /// Fetch one page. No retry; a failure becomes the view's error.
    pub async fn load(&mut self, client: &ApiClient) {
        self.state = match client.get_feed(&self.query).await {
            Ok(response) => ViewState::Ready(response),
            Err(e) => {
                tracing::error!("Failed to load feed: {}", e);
                ViewState::Failed(e.user_message(LOAD_ERROR))
            }
        };
    }

    pub fn render(&self, now: DateTime<Utc>) -> String {
        match &self.state {
            ViewState::Loading => "Loading feed...\n".to_string(),
            ViewState::Failed(message) => format!("Error: {}\n", message),
            ViewState::Ready(response) if response.items.is_empty() => {
                "No feed items yet\n".to_string()
            }
            ViewState::Ready(response) => {
                let mut output = format!("Your Feed ({} items)\n", response.count);
                for item in &response.items {
                    output.push('\n');
                    render_item(&mut output, item, now);
                }
                output
            }
        }
    }
}

fn render_item(output: &mut String, item: &FeedItem, now: DateTime<Utc>) {
    output.push_str(&format!(
        "{} {} [{}]\n",
        item.item_type.icon(),
        item.title,
        item.priority.as_str()
    ));
    if let Some(subtitle) = item.subtitle.as_deref().filter(|s| !s.is_empty()) {
        output.push_str(&format!("  {}\n", subtitle));
    }
    output.push_str(&format!("  {}\n", item.description));

    let mut footer = format!(
        "  {} · {}",
        item.source.integration_name,
        format_timestamp(item.timestamp, now)
    );
    for tag in item.tags.iter().take(MAX_TAGS) {
        footer.push_str(&format!(" #{}", tag));
    }
    output.push_str(&footer);
    output.push('\n');

    if !item.actions.is_empty() {
        let labels: Vec<String> = item
            .actions
            .iter()
            .map(|a| format!("[{}]", a.label))
            .collect();
        output.push_str(&format!("  {}\n", labels.join(" ")));
    }
}

/// Relative age for recent items, the date for anything a week or older.
pub fn format_timestamp(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now - timestamp;
    if age.num_minutes() < 60 {
        format!("{}m ago", age.num_minutes())
    } else if age.num_hours() < 24 {
        format!("{}h ago", age.num_hours())
    } else if age.num_days() < 7 {
        format!("{}d ago", age.num_days())
    } else {
        timestamp.format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    #[test]
    fn timestamps_switch_units_by_age() {
        assert_eq!(format_timestamp(now() - Duration::minutes(5), now()), "5m ago");
        assert_eq!(format_timestamp(now() - Duration::hours(3), now()), "3h ago");
        assert_eq!(format_timestamp(now() - Duration::days(2), now()), "2d ago");
        assert_eq!(format_timestamp(now() - Duration::days(10), now()), "2026-10-08");
    }

    #[test]
    fn loading_and_empty_states_render_placeholders() {
        let mut view = FeedView::new(FeedQuery::page(50, 0));
        assert_eq!(view.render(now()), "Loading feed...\n");

        view.state = ViewState::Ready(FeedResponse {
            items: vec![],
            count: 0,
            limit: 50,
            offset: 0,
        });
        assert_eq!(view.render(now()), "No feed items yet\n");
    }
}
