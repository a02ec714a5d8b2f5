//! GraphQL documents read by the orchestrations.

pub const PAGE_STRUCTURE_QUERY: &str = r#"
query PageStructure($id: ID!) {
  page(id: $id) {
    id
    slug
    title
    sections { id position }
  }
}
"#;

pub const SECTION_COMPONENTS_QUERY: &str = r#"
query SectionComponents($id: ID!) {
  section(id: $id) {
    id
    components { id type position mediaUrl props }
  }
}
"#;

pub const MENU_QUERY: &str = r#"
query Menu($location: String!) {
  menu(location: $location) {
    location
    items { label href children { label href } }
  }
}
"#;

pub fn page_tag(page_id: &str) -> String {
    format!("page:{page_id}")
}

pub fn section_tag(section_id: &str) -> String {
    format!("section:{section_id}")
}

pub fn menu_tag(location: &str) -> String {
    format!("menu:{location}")
}
