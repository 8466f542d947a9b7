//! Subscription naming and addressing

pub mod validation;

pub use validation::{validate_subscription_name, SubscriptionNameError};

/// Build the fully qualified resource path for a subscription.
///
/// Names that already carry a `projects/` prefix are returned unchanged.
pub fn subscription_path(project_id: &str, name: &str) -> String {
    if name.starts_with("projects/") {
        name.to_string()
    } else {
        format!("projects/{}/subscriptions/{}", project_id, name)
    }
}
