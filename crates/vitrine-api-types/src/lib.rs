//! Wire types shared between the Vitrine front end and the content API.
//!
//! The GraphQL envelope types describe a single request/response exchange;
//! the content records mirror the subset of the remote schema that the page
//! and menu orchestrations read.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a GraphQL POST request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlRequest<'a> {
    pub query: &'a str,
    pub variables: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<&'a str>,
}

/// Body of a GraphQL response.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GraphqlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

impl GraphqlResponse {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// One entry of a GraphQL `errors` list.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GraphqlError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphqlError {
    /// The `extensions.code` value, when the server provides one.
    pub fn code(&self) -> Option<&str> {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.get("code"))
            .and_then(Value::as_str)
    }

    /// Whether the error reports a missing or rejected credential.
    pub fn is_authorization(&self) -> bool {
        matches!(
            self.code(),
            Some("UNAUTHENTICATED") | Some("FORBIDDEN") | Some("UNAUTHORIZED")
        )
    }
}

// ============================================================================
// Content records
// ============================================================================

/// Minimal page description: identity plus the ordered section list.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageStructure {
    pub id: String,
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sections: Vec<SectionRef>,
}

/// Reference to a section inside a page structure.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRef {
    pub id: String,
    #[serde(default)]
    pub position: i32,
}

/// A section together with its rendered components.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionComponents {
    pub id: String,
    #[serde(default)]
    pub components: Vec<Component>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub position: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default)]
    pub props: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Menu {
    pub location: String,
    #[serde(default)]
    pub items: Vec<MenuItem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub label: String,
    pub href: String,
    #[serde(default)]
    pub children: Vec<MenuItem>,
}

// ============================================================================
// Query payloads
// ============================================================================

/// `data` payload of the page structure query.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PageStructureData {
    pub page: Option<PageStructure>,
}

/// `data` payload of the section components query.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SectionData {
    pub section: Option<SectionComponents>,
}

/// `data` payload of the menu query.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MenuData {
    pub menu: Option<Menu>,
}
