//! Tools the assistant can call. The model only ever sees the registry's
//! specs; execution stays on this side of the wire.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::llm::ToolSpec;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn spec(&self) -> ToolSpec;
    async fn execute(&self, input: Value) -> Result<Value>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(Box::as_ref)
    }

    /// Specs in name order so the advertised tool list is stable.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut names: Vec<_> = self.tools.keys().collect();
        names.sort();
        names.into_iter().filter_map(|name| self.tools.get(name)).map(|tool| tool.spec()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Prototype lead record the assistant can surface back to a visitor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub interest: String,
    pub entry_date: String,
    pub source: String,
}

/// In-memory stand-in for the CRM lead table while the assistant is a
/// prototype.
#[derive(Clone, Debug, Default)]
pub struct LeadDirectory {
    entries: Vec<DirectoryEntry>,
}

impl LeadDirectory {
    pub fn new(entries: Vec<DirectoryEntry>) -> Self {
        Self { entries }
    }

    pub fn prototype() -> Self {
        let rows = [
            ("Carlos Pérez", "carlos@email.com", "600000001", "Electricidad", "Google_ads"),
            ("Lucía Gómez", "lucia@email.com", "600000002", "Hostelería", "Facebook_ads"),
            ("Antonio Ruiz", "antonio@email.com", "600000003", "Salud", "Telefono"),
            ("Sara López", "sara@email.com", "600000004", "Electricidad", "Referido"),
            ("Javier Torres", "javier@email.com", "600000005", "Hostelería", "SEO"),
            ("Ana Sánchez", "ana@email.com", "600000006", "Electricidad", "Portales"),
            ("Pedro Morales", "pedro@email.com", "600000007", "Salud", "TikTok_ads"),
            ("Elena Ortega", "elena@email.com", "600000008", "Hostelería", "Otros"),
            ("Raúl Díaz", "raul@email.com", "600000009", "Electricidad", "LinkedIn_ads"),
            ("Marta Navarro", "marta@email.com", "600000010", "Salud", "Emailing"),
        ];
        Self::new(
            rows.into_iter()
                .map(|(name, email, phone, interest, source)| DirectoryEntry {
                    name: name.to_string(),
                    email: email.to_string(),
                    phone: phone.to_string(),
                    interest: interest.to_string(),
                    entry_date: "28/07/2025".to_string(),
                    source: source.to_string(),
                })
                .collect(),
        )
    }

    /// Matches on any field the visitor may have shared: name, email, or
    /// phone (interest/source included for parity with the CRM search).
    pub fn find(&self, data: &str) -> Option<&DirectoryEntry> {
        self.entries.iter().find(|entry| {
            [&entry.name, &entry.email, &entry.phone, &entry.interest, &entry.entry_date, &entry.source]
                .into_iter()
                .any(|field| field == data)
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Course {
    pub name: String,
    pub starts: String,
    pub price: String,
}

#[derive(Clone, Debug, Default)]
pub struct CourseCatalog {
    courses: Vec<Course>,
}

impl CourseCatalog {
    pub fn new(courses: Vec<Course>) -> Self {
        Self { courses }
    }

    pub fn prototype() -> Self {
        Self::new(vec![
            Course {
                name: "Salud".to_string(),
                starts: "02/10/2025".to_string(),
                price: "200€".to_string(),
            },
            Course {
                name: "Electricidad".to_string(),
                starts: "10/10/2025".to_string(),
                price: "300€".to_string(),
            },
            Course {
                name: "Hostelería".to_string(),
                starts: "19/10/2025".to_string(),
                price: "240€".to_string(),
            },
        ])
    }

    pub fn names(&self) -> Vec<&str> {
        self.courses.iter().map(|course| course.name.as_str()).collect()
    }

    pub fn price_of(&self, name: &str) -> Option<&str> {
        self.courses
            .iter()
            .find(|course| course.name == name)
            .map(|course| course.price.as_str())
    }
}

pub struct RetrieveLeadData {
    directory: LeadDirectory,
}

impl RetrieveLeadData {
    pub fn new(directory: LeadDirectory) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Tool for RetrieveLeadData {
    fn name(&self) -> &'static str {
        "retrieve_lead_data"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::function(
            self.name(),
            "Get information about the lead according to some specific data they gave to the \
             assistant, such as name, email, or phone",
            json!({
                "type": "object",
                "properties": {
                    "data": {
                        "type": "string",
                        "description": "The data shared by the lead, such as their name, email or phone number"
                    }
                },
                "required": ["data"]
            }),
        )
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let data = input.get("data").and_then(Value::as_str).unwrap_or_default();
        match self.directory.find(data) {
            Some(entry) => Ok(serde_json::to_value(entry)?),
            None => Ok(json!({"error": "there is no lead corresponding to this data"})),
        }
    }
}

pub struct RetrieveCourses {
    catalog: CourseCatalog,
}

impl RetrieveCourses {
    pub fn new(catalog: CourseCatalog) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for RetrieveCourses {
    fn name(&self) -> &'static str {
        "retrieve_courses"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::function(
            self.name(),
            "Retrieve the list of courses available",
            json!({"type": "object", "properties": {}}),
        )
    }

    async fn execute(&self, _input: Value) -> Result<Value> {
        Ok(json!(self.catalog.names()))
    }
}

pub struct RetrievePrices {
    catalog: CourseCatalog,
}

impl RetrievePrices {
    pub fn new(catalog: CourseCatalog) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for RetrievePrices {
    fn name(&self) -> &'static str {
        "retrieve_prices"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::function(
            self.name(),
            "Retrieve the price of a course by its name",
            json!({
                "type": "object",
                "properties": {
                    "course_name": {
                        "type": "string",
                        "description": "Name of the course to price"
                    }
                },
                "required": ["course_name"]
            }),
        )
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let course_name = input.get("course_name").and_then(Value::as_str).unwrap_or_default();
        match self.catalog.price_of(course_name) {
            Some(price) => Ok(json!({ course_name: price })),
            None => Ok(json!({ course_name: "there is no course corresponding to this name" })),
        }
    }
}

/// Registry with the three prototype tools installed.
pub fn prototype_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::default();
    registry.register(RetrieveLeadData::new(LeadDirectory::prototype()));
    registry.register(RetrieveCourses::new(CourseCatalog::prototype()));
    registry.register(RetrievePrices::new(CourseCatalog::prototype()));
    registry
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{prototype_registry, CourseCatalog, LeadDirectory};

    #[test]
    fn directory_matches_any_shared_field() {
        let directory = LeadDirectory::prototype();
        assert_eq!(directory.find("carlos@email.com").map(|e| e.name.as_str()), Some("Carlos Pérez"));
        assert_eq!(directory.find("600000004").map(|e| e.name.as_str()), Some("Sara López"));
        assert_eq!(directory.find("Marta Navarro").map(|e| e.email.as_str()), Some("marta@email.com"));
        assert!(directory.find("nadie@example.com").is_none());
    }

    #[test]
    fn catalog_prices_known_courses_only() {
        let catalog = CourseCatalog::prototype();
        assert_eq!(catalog.price_of("Salud"), Some("200€"));
        assert_eq!(catalog.price_of("Robótica"), None);
        assert_eq!(catalog.names(), vec!["Salud", "Electricidad", "Hostelería"]);
    }

    #[tokio::test]
    async fn registry_advertises_three_tools_in_stable_order() {
        let registry = prototype_registry();
        assert_eq!(registry.len(), 3);

        let names: Vec<_> =
            registry.specs().iter().map(|spec| spec.function.name.clone()).collect();
        assert_eq!(names, vec!["retrieve_courses", "retrieve_lead_data", "retrieve_prices"]);
    }

    #[tokio::test]
    async fn lead_tool_reports_misses_as_structured_error() {
        let registry = prototype_registry();
        let tool = registry.get("retrieve_lead_data").expect("registered tool");

        let found = tool.execute(json!({"data": "lucia@email.com"})).await.expect("execute");
        assert_eq!(found["interest"], "Hostelería");

        let missing = tool.execute(json!({"data": "desconocido"})).await.expect("execute");
        assert!(missing["error"].as_str().expect("error field").contains("no lead"));
    }

    #[tokio::test]
    async fn price_tool_answers_by_course_name() {
        let registry = prototype_registry();
        let tool = registry.get("retrieve_prices").expect("registered tool");

        let priced = tool.execute(json!({"course_name": "Electricidad"})).await.expect("execute");
        assert_eq!(priced["Electricidad"], "300€");
    }
}
