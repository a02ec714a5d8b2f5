use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use serde_json::json;
use tracing::instrument;
use vitrine_api_types::{Menu, MenuData};

use crate::{
    application::{
        error::AppError,
        queries::{MENU_QUERY, menu_tag},
    },
    cache::{Optimizer, QueryOptions},
};

#[derive(Clone)]
pub struct MenuService {
    optimizer: Arc<Optimizer>,
    ttl: Duration,
}

impl MenuService {
    pub fn new(optimizer: Arc<Optimizer>, ttl: Duration) -> Self {
        Self { optimizer, ttl }
    }

    #[instrument(skip(self))]
    pub async fn load_menu(&self, location: &str) -> Result<Menu, AppError> {
        self.fetch(location, self.options(location)).await
    }

    /// Load several menus through the batched path, preserving input order.
    #[instrument(skip(self))]
    pub async fn load_menus(&self, locations: &[String]) -> Result<Vec<Menu>, AppError> {
        try_join_all(
            locations
                .iter()
                .map(|location| self.fetch(location, self.options(location).batched())),
        )
        .await
    }

    pub fn menu_changed(&self, location: &str) -> usize {
        self.optimizer.invalidate_by_dependency(&menu_tag(location))
    }

    fn options(&self, location: &str) -> QueryOptions {
        QueryOptions::new()
            .with_ttl(self.ttl)
            .with_dependency(menu_tag(location))
    }

    async fn fetch(&self, location: &str, options: QueryOptions) -> Result<Menu, AppError> {
        let data: MenuData = self
            .optimizer
            .execute_as(MENU_QUERY, &json!({ "location": location }), options)
            .await?;
        data.menu
            .ok_or_else(|| AppError::not_found(format!("menu `{location}`")))
    }
}
