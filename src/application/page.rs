//! Page and section loading.
//!
//! A page load is two stages: the page structure (long TTL, tagged with the
//! page) gives the ordered section list, then every section is fetched
//! through the batched path (short TTL, tagged with the section) so that a
//! page with many sections costs one coalesced burst.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use vitrine_api_types::{PageStructure, PageStructureData, SectionComponents, SectionData};

use crate::{
    application::{
        error::AppError,
        queries::{PAGE_STRUCTURE_QUERY, SECTION_COMPONENTS_QUERY, page_tag, section_tag},
    },
    cache::{Optimizer, QueryOptions},
    config::PageSettings,
    infra::preload::{AssetPreloader, PreloadPriority, PreloadReport},
};

/// A page together with its loaded sections.
#[derive(Debug, Clone, Serialize)]
pub struct PageLoad {
    pub page: PageStructure,
    /// Sections in page order. Sections the API no longer knows are omitted.
    pub sections: Vec<SectionComponents>,
    /// Identifiers of sections holding at least one heavy-media component.
    pub media_sections: Vec<String>,
}

#[derive(Clone)]
pub struct PageService {
    optimizer: Arc<Optimizer>,
    settings: PageSettings,
    preloader: Arc<dyn AssetPreloader>,
}

impl PageService {
    pub fn new(
        optimizer: Arc<Optimizer>,
        settings: PageSettings,
        preloader: Arc<dyn AssetPreloader>,
    ) -> Self {
        Self {
            optimizer,
            settings,
            preloader,
        }
    }

    #[instrument(skip(self))]
    pub async fn load_page(&self, page_id: &str) -> Result<PageLoad, AppError> {
        let data: PageStructureData = self
            .optimizer
            .execute_as(
                PAGE_STRUCTURE_QUERY,
                &json!({ "id": page_id }),
                QueryOptions::new()
                    .with_ttl(self.settings.structure_ttl)
                    .with_dependency(page_tag(page_id)),
            )
            .await?;
        let page = data
            .page
            .ok_or_else(|| AppError::not_found(format!("page `{page_id}`")))?;

        let mut refs = page.sections.clone();
        refs.sort_by_key(|section| section.position);

        let fetches = refs.iter().map(|section| self.load_section(&section.id));
        let mut sections = Vec::with_capacity(refs.len());
        for (section_ref, result) in refs.iter().zip(join_all(fetches).await) {
            match result? {
                Some(section) => sections.push(section),
                None => warn!(
                    page = page_id,
                    section = %section_ref.id,
                    "Section referenced by page was not found"
                ),
            }
        }

        let media_sections = sections
            .iter()
            .filter(|section| self.has_heavy_media(section))
            .map(|section| section.id.clone())
            .collect::<Vec<_>>();

        debug!(
            page = page_id,
            sections = sections.len(),
            media_sections = media_sections.len(),
            "Page loaded"
        );

        Ok(PageLoad {
            page,
            sections,
            media_sections,
        })
    }

    async fn load_section(&self, section_id: &str) -> Result<Option<SectionComponents>, AppError> {
        let data: SectionData = self
            .optimizer
            .execute_as(
                SECTION_COMPONENTS_QUERY,
                &json!({ "id": section_id }),
                QueryOptions::new()
                    .with_ttl(self.settings.section_ttl)
                    .with_dependency(section_tag(section_id))
                    .batched(),
            )
            .await?;
        Ok(data.section)
    }

    fn is_heavy_media(&self, kind: &str) -> bool {
        self.settings.heavy_media_kinds.contains(kind)
    }

    fn has_heavy_media(&self, section: &SectionComponents) -> bool {
        section
            .components
            .iter()
            .any(|component| self.is_heavy_media(&component.kind))
    }

    /// Media URLs of the heavy-media components of a loaded page, deduplicated.
    pub fn media_urls(&self, load: &PageLoad) -> Vec<String> {
        let media_sections: BTreeSet<&str> =
            load.media_sections.iter().map(String::as_str).collect();
        let mut seen = BTreeSet::new();

        load.sections
            .iter()
            .filter(|section| media_sections.contains(section.id.as_str()))
            .flat_map(|section| section.components.iter())
            .filter(|component| self.is_heavy_media(&component.kind))
            .filter_map(|component| component.media_url.clone())
            .filter(|url| seen.insert(url.clone()))
            .collect()
    }

    /// Hand the heavy-media URLs of `load` to the asset preloader.
    pub async fn preload_media(&self, load: &PageLoad, priority: PreloadPriority) -> PreloadReport {
        let urls = self.media_urls(load);
        if urls.is_empty() {
            return PreloadReport::default();
        }

        let report = self.preloader.preload(&urls, priority).await;
        info!(
            page = %load.page.id,
            requested = report.requested,
            fetched = report.fetched,
            failed = report.failed,
            "Page media preloaded"
        );
        report
    }

    /// Discard every cached read derived from this page.
    pub fn page_changed(&self, page_id: &str) -> usize {
        self.optimizer.invalidate_by_dependency(&page_tag(page_id))
    }

    /// Discard every cached read derived from this section.
    pub fn section_changed(&self, section_id: &str) -> usize {
        self.optimizer.invalidate_by_dependency(&section_tag(section_id))
    }
}
