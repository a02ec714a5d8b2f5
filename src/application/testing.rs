use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::cache::{Optimizer, OptimizerConfig, QueryRequest, Transport, TransportError};

/// In-memory content API answering the page, section and menu operations.
#[derive(Default)]
pub(crate) struct FakeCms {
    pages: Mutex<HashMap<String, Value>>,
    sections: Mutex<HashMap<String, Value>>,
    menus: Mutex<HashMap<String, Value>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeCms {
    pub fn with_page(self, id: &str, sections: &[&str]) -> Self {
        let refs: Vec<Value> = sections
            .iter()
            .enumerate()
            .map(|(position, section)| json!({ "id": section, "position": position }))
            .collect();
        self.pages.lock().expect("pages").insert(
            id.to_string(),
            json!({ "id": id, "slug": id, "title": format!("Page {id}"), "sections": refs }),
        );
        self
    }

    /// `components` pairs a component type with an optional media URL.
    pub fn with_section(self, id: &str, components: &[(&str, Option<&str>)]) -> Self {
        let components: Vec<Value> = components
            .iter()
            .enumerate()
            .map(|(position, (kind, media))| {
                json!({
                    "id": format!("{id}-c{position}"),
                    "type": kind,
                    "position": position,
                    "mediaUrl": media,
                    "props": {},
                })
            })
            .collect();
        self.sections
            .lock()
            .expect("sections")
            .insert(id.to_string(), json!({ "id": id, "components": components }));
        self
    }

    pub fn with_menu(self, location: &str, labels: &[&str]) -> Self {
        let items: Vec<Value> = labels
            .iter()
            .map(|label| json!({ "label": label, "href": format!("/{}", label.to_lowercase()) }))
            .collect();
        self.menus
            .lock()
            .expect("menus")
            .insert(location.to_string(), json!({ "location": location, "items": items }));
        self
    }

    /// Make every request whose `id` or `location` variable equals `target` fail.
    pub fn failing(self, target: &str) -> Self {
        self.failing
            .lock()
            .expect("failing")
            .insert(target.to_string());
        self
    }

    pub fn calls_for(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .expect("calls")
            .iter()
            .filter(|call| call.as_str() == operation)
            .count()
    }

    pub fn into_optimizer(self) -> (Arc<Optimizer>, Arc<FakeCms>) {
        let cms = Arc::new(self);
        let optimizer = Arc::new(Optimizer::new(OptimizerConfig::default(), cms.clone()));
        (optimizer, cms)
    }
}

#[async_trait]
impl Transport for FakeCms {
    async fn execute(&self, request: &QueryRequest) -> Result<Value, TransportError> {
        let operation = request.operation_name().unwrap_or_default().to_string();
        self.calls.lock().expect("calls").push(operation.clone());
        tokio::task::yield_now().await;

        let variables = request.variables();
        let target = variables["id"]
            .as_str()
            .or_else(|| variables["location"].as_str())
            .unwrap_or_default()
            .to_string();

        if self.failing.lock().expect("failing").contains(&target) {
            return Err(TransportError::Status {
                status: 503,
                body: format!("{target} unavailable"),
            });
        }

        match operation.as_str() {
            "PageStructure" => {
                let page = self.pages.lock().expect("pages").get(&target).cloned();
                Ok(json!({ "page": page }))
            }
            "SectionComponents" => {
                let section = self.sections.lock().expect("sections").get(&target).cloned();
                Ok(json!({ "section": section }))
            }
            "Menu" => {
                let menu = self.menus.lock().expect("menus").get(&target).cloned();
                Ok(json!({ "menu": menu }))
            }
            other => Err(TransportError::GraphQl(vec![format!(
                "unknown operation `{other}`"
            )])),
        }
    }
}
