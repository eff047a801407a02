//! Application counters, exported in Prometheus text format.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use tracing::{info, warn};

/// All metric names used by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    UsersRegistered,
    LoginsSuccess,
    LoginsFailed,
    RecipesCreated,
    RecipesUpdated,
    RecipesDeleted,
    FavoritesAdded,
    ShoppingCartAdded,
    SubscriptionsCreated,
    ShoppingListsDownloaded,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::UsersRegistered => "foodgram_users_registered_total",
            MetricName::LoginsSuccess => "foodgram_logins_success_total",
            MetricName::LoginsFailed => "foodgram_logins_failed_total",
            MetricName::RecipesCreated => "foodgram_recipes_created_total",
            MetricName::RecipesUpdated => "foodgram_recipes_updated_total",
            MetricName::RecipesDeleted => "foodgram_recipes_deleted_total",
            MetricName::FavoritesAdded => "foodgram_favorites_added_total",
            MetricName::ShoppingCartAdded => "foodgram_shopping_cart_added_total",
            MetricName::SubscriptionsCreated => "foodgram_subscriptions_created_total",
            MetricName::ShoppingListsDownloaded => "foodgram_shopping_lists_downloaded_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn increment(name: MetricName) {
    metrics::counter!(name.as_str()).increment(1);
}

/// Installs the global Prometheus recorder. `None` if one is already installed.
pub fn install_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            info!("Prometheus recorder installed");
            Some(handle)
        }
        Err(e) => {
            warn!("Prometheus recorder install failed (possibly already installed): {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_prometheus_conventions() {
        for name in [MetricName::RecipesCreated, MetricName::ShoppingListsDownloaded] {
            assert!(name.as_str().starts_with("foodgram_"));
            assert!(name.as_str().ends_with("_total"));
            assert_eq!(name.to_string(), name.as_str());
        }
    }
}
