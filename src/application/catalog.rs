//! Static registry of the tools advertised to the model and to the gateway

use crate::types::ToolDefinition;
use serde_json::json;

/// Immutable tool registry. Construction order is preserved so the schemas
/// sent to the model are deterministic across calls.
pub struct ToolCatalog {
    definitions: Vec<ToolDefinition>,
}

impl ToolCatalog {
    pub fn builtin() -> Self {
        let definitions = vec![
            ToolDefinition {
                name: "fetch_renewable_data".to_string(),
                description: "Fetch data about renewable energy sources".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "energy_type": {
                            "type": "string",
                            "description": "Type of renewable energy (solar, wind, hydro, geothermal, biogas, etc.)"
                        },
                        "location": {
                            "type": "string",
                            "description": "Geographic location for the data"
                        },
                        "time_period": {
                            "type": "string",
                            "description": "Time period for the data (e.g., 'last_week', 'last_month', 'last_year')"
                        }
                    },
                    "required": ["energy_type"]
                }),
            },
            ToolDefinition {
                name: "create_dashboard".to_string(),
                description: "Create a dashboard for visualizing renewable energy data".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "dashboard_type": {
                            "type": "string",
                            "description": "Type of dashboard to create (cbg, solar_farm, wind_farm, hybrid_plant)"
                        },
                        "title": {
                            "type": "string",
                            "description": "Title for the dashboard"
                        },
                        "description": {
                            "type": "string",
                            "description": "Description of the dashboard"
                        }
                    },
                    "required": ["dashboard_type", "title"]
                }),
            },
            ToolDefinition {
                name: "calculate_roi".to_string(),
                description: "Calculate return on investment for renewable energy projects"
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "project_type": {
                            "type": "string",
                            "description": "Type of renewable energy project"
                        },
                        "initial_investment": {
                            "type": "number",
                            "description": "Initial investment amount in USD"
                        },
                        "annual_revenue": {
                            "type": "number",
                            "description": "Expected annual revenue in USD"
                        },
                        "annual_costs": {
                            "type": "number",
                            "description": "Expected annual maintenance and operational costs in USD"
                        },
                        "project_lifetime": {
                            "type": "number",
                            "description": "Expected lifetime of the project in years"
                        }
                    },
                    "required": ["project_type", "initial_investment", "annual_revenue", "project_lifetime"]
                }),
            },
            ToolDefinition {
                name: "get_policy_information".to_string(),
                description: "Get information about renewable energy policies and incentives"
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "country": {
                            "type": "string",
                            "description": "Country for policy information"
                        },
                        "region": {
                            "type": "string",
                            "description": "Region or state within the country (optional)"
                        },
                        "policy_type": {
                            "type": "string",
                            "description": "Type of policy (tax_incentives, subsidies, regulations, etc.)"
                        }
                    },
                    "required": ["country"]
                }),
            },
            ToolDefinition {
                name: "search_renewable_database".to_string(),
                description: "Search the renewable energy database for specific information"
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Search query"
                        },
                        "filter_by": {
                            "type": "string",
                            "description": "Category to filter by (technology, location, company, project, etc.)"
                        },
                        "max_results": {
                            "type": "number",
                            "description": "Maximum number of results to return"
                        }
                    },
                    "required": ["query"]
                }),
            },
        ];

        Self { definitions }
    }

    /// Definitions in construction order.
    pub fn list_definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Not-found is a normal outcome; callers must check.
    pub fn lookup(&self, name: &str) -> Option<&ToolDefinition> {
        self.definitions
            .iter()
            .find(|definition| definition.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definitions_keep_construction_order() {
        let catalog = ToolCatalog::builtin();
        let names: Vec<_> = catalog
            .list_definitions()
            .iter()
            .map(|tool| tool.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "fetch_renewable_data",
                "create_dashboard",
                "calculate_roi",
                "get_policy_information",
                "search_renewable_database",
            ]
        );
    }

    #[test]
    fn lookup_is_case_insensitive_and_total() {
        let catalog = ToolCatalog::builtin();
        assert!(catalog.lookup("Calculate_ROI").is_some());
        assert!(catalog.lookup("nonexistent_tool").is_none());
    }

    #[test]
    fn schemas_declare_required_fields() {
        let catalog = ToolCatalog::builtin();
        let roi = catalog.lookup("calculate_roi").expect("roi tool");
        let required = roi.parameters["required"]
            .as_array()
            .expect("required array");
        assert!(required.contains(&serde_json::json!("initial_investment")));
    }
}
