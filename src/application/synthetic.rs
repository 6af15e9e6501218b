//! Local synthetic generators used when the remote tool backend is down.
//!
//! The data is plausible, not reproducible: repeated calls with the same
//! logical request land in the same bounded range per energy category, but
//! values are re-drawn each time. ROI analysis is the exception — it is real
//! arithmetic and fully deterministic.

use chrono::{Duration, Utc};
use rand::Rng;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SyntheticError {
    #[error("no synthetic generator for tool '{0}'")]
    UnsupportedTool(String),
    #[error("invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },
}

/// Produce a synthetic payload for a known tool.
pub fn generate(tool: &str, arguments: &Value) -> Result<Value, SyntheticError> {
    match tool.to_lowercase().as_str() {
        "fetch_renewable_data" => Ok(renewable_data(arguments)),
        "create_dashboard" => Ok(dashboard(arguments)),
        "calculate_roi" => roi_payload(arguments),
        "get_policy_information" => Ok(policy_information(arguments)),
        "search_renewable_database" => Ok(search_database(arguments)),
        other => Err(SyntheticError::UnsupportedTool(other.to_string())),
    }
}

/// Typical daily generation magnitude and spread per energy category, in MWh.
fn category_profile(energy_type: &str) -> (f64, f64) {
    match energy_type.to_lowercase().as_str() {
        "solar" => (100.0, 30.0),
        "wind" => (150.0, 50.0),
        "hydro" => (200.0, 20.0),
        "geothermal" => (80.0, 10.0),
        "biogas" | "cbg" => (60.0, 15.0),
        _ => (50.0, 20.0),
    }
}

fn renewable_data(arguments: &Value) -> Value {
    let energy_type = str_arg(arguments, "energy_type").unwrap_or("solar");
    let location = str_arg(arguments, "location").unwrap_or("global");
    let time_period = str_arg(arguments, "time_period").unwrap_or("last_month");

    let (days, step_days) = match time_period {
        "last_week" => (7, 1),
        "last_year" => (365, 7),
        _ => (30, 1),
    };

    let (base, variance) = category_profile(energy_type);
    let mut rng = rand::thread_rng();
    let end = Utc::now();
    let mut cursor = end - Duration::days(days);

    let mut generation = Vec::new();
    while cursor <= end {
        let value = base + rng.gen_range(-variance..=variance);
        generation.push(json!({
            "timestamp": cursor.to_rfc3339(),
            "value": round2(value.max(0.0)),
        }));
        cursor += Duration::days(step_days);
    }

    let data = match energy_type.to_lowercase().as_str() {
        "solar" => json!({
            "generation": generation,
            "capacity": round2(rng.gen_range(500.0..2000.0)),
            "efficiency": round2(rng.gen_range(0.15..0.25)),
            "panel_count": rng.gen_range(1000..5000),
        }),
        "wind" => json!({
            "generation": generation,
            "capacity": round2(rng.gen_range(800.0..3000.0)),
            "turbine_count": rng.gen_range(10..50),
            "average_wind_speed": round2(rng.gen_range(5.0..15.0)),
        }),
        "biogas" | "cbg" => json!({
            "generation": generation,
            "feedstock": {
                "organic_waste": round2(rng.gen_range(100.0..500.0)),
                "agricultural_waste": round2(rng.gen_range(50.0..300.0)),
                "food_waste": round2(rng.gen_range(30.0..200.0)),
            },
            "methane_content": round2(rng.gen_range(50.0..70.0)),
            "community_participants": rng.gen_range(5..50),
        }),
        _ => json!({
            "generation": generation,
            "capacity": round2(rng.gen_range(300.0..1500.0)),
            "efficiency": round2(rng.gen_range(0.1..0.4)),
        }),
    };

    json!({
        "status": "success",
        "energy_type": energy_type,
        "location": location,
        "time_period": time_period,
        "data": data,
        "timestamp": Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Clone, Copy)]
pub struct RoiInputs {
    pub initial_investment: f64,
    pub annual_revenue: f64,
    pub annual_costs: f64,
    pub project_lifetime: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoiAnalysis {
    pub net_annual_cash_flow: f64,
    /// None when the project never recovers its investment; serialized as
    /// null rather than a sentinel number.
    pub payback_period_years: Option<f64>,
    pub total_profit: f64,
    pub roi_percentage: f64,
    pub estimated_irr_percentage: f64,
}

/// Deterministic project economics. Callers must guarantee a positive
/// initial investment.
pub fn calculate_roi(inputs: &RoiInputs) -> RoiAnalysis {
    let net_annual_cash_flow = inputs.annual_revenue - inputs.annual_costs;
    let payback_period_years = if net_annual_cash_flow > 0.0 {
        Some(round2(inputs.initial_investment / net_annual_cash_flow))
    } else {
        None
    };
    let total_profit = net_annual_cash_flow * inputs.project_lifetime - inputs.initial_investment;

    RoiAnalysis {
        net_annual_cash_flow: round2(net_annual_cash_flow),
        payback_period_years,
        total_profit: round2(total_profit),
        roi_percentage: round2(total_profit / inputs.initial_investment * 100.0),
        estimated_irr_percentage: round2(
            net_annual_cash_flow / inputs.initial_investment * 100.0,
        ),
    }
}

fn roi_payload(arguments: &Value) -> Result<Value, SyntheticError> {
    let tool = "calculate_roi";
    let project_type = str_arg(arguments, "project_type").unwrap_or("solar");
    let initial_investment = num_arg(arguments, tool, "initial_investment")?;
    let annual_revenue = num_arg(arguments, tool, "annual_revenue")?;
    let project_lifetime = num_arg(arguments, tool, "project_lifetime")?;
    let annual_costs = arguments
        .get("annual_costs")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    if initial_investment <= 0.0 {
        return Err(SyntheticError::InvalidArguments {
            tool: tool.to_string(),
            reason: "initial_investment must be positive".to_string(),
        });
    }
    if project_lifetime <= 0.0 {
        return Err(SyntheticError::InvalidArguments {
            tool: tool.to_string(),
            reason: "project_lifetime must be positive".to_string(),
        });
    }

    let analysis = calculate_roi(&RoiInputs {
        initial_investment,
        annual_revenue,
        annual_costs,
        project_lifetime,
    });

    let mut payload = json!({
        "status": "success",
        "project_type": project_type,
        "initial_investment": initial_investment,
        "annual_revenue": annual_revenue,
        "annual_costs": annual_costs,
        "project_lifetime": project_lifetime,
        "net_annual_cash_flow": analysis.net_annual_cash_flow,
        "payback_period_years": analysis.payback_period_years,
        "total_profit": analysis.total_profit,
        "roi_percentage": analysis.roi_percentage,
        "estimated_irr_percentage": analysis.estimated_irr_percentage,
        "analysis_timestamp": Utc::now().to_rfc3339(),
    });
    if analysis.payback_period_years.is_none() {
        payload["payback_note"] =
            json!("the project never recovers its initial investment at this cash flow");
    }
    Ok(payload)
}

fn dashboard(arguments: &Value) -> Value {
    let dashboard_type = str_arg(arguments, "dashboard_type").unwrap_or("cbg");
    let title = str_arg(arguments, "title")
        .map(String::from)
        .unwrap_or_else(|| {
            format!(
                "Renewable Energy Dashboard - {}",
                dashboard_type.to_uppercase()
            )
        });
    let description = str_arg(arguments, "description")
        .map(String::from)
        .unwrap_or_else(|| format!("Dashboard for {dashboard_type} data visualization"));

    let dashboard_id = format!("{dashboard_type}_{}", Uuid::new_v4().simple());
    let url = format!("/dashboards/{dashboard_id}");

    json!({
        "status": "success",
        "dashboard_id": dashboard_id,
        "dashboard_type": dashboard_type,
        "title": title,
        "description": description,
        "url": url,
        "embed_code": format!(
            "<iframe src=\"{url}/embed\" width=\"100%\" height=\"600\" frameborder=\"0\"></iframe>"
        ),
        "created_at": Utc::now().to_rfc3339(),
        "message": format!("Dashboard '{title}' created successfully"),
    })
}

fn policy_information(arguments: &Value) -> Value {
    let country = str_arg(arguments, "country").unwrap_or("United States");
    let region = str_arg(arguments, "region").unwrap_or("");
    let policy_type = str_arg(arguments, "policy_type").unwrap_or("");

    let mut policies: Vec<Value> = Vec::new();
    match country.to_lowercase().as_str() {
        "us" | "usa" | "united states" => {
            policies.push(json!({
                "name": "Federal Investment Tax Credit (ITC)",
                "type": "tax_incentives",
                "description": "Tax credit for solar, wind, and geothermal installations",
                "eligibility": "Residential and commercial properties",
            }));
            policies.push(json!({
                "name": "Modified Accelerated Cost Recovery System (MACRS)",
                "type": "tax_incentives",
                "description": "Depreciation deduction for renewable energy properties",
                "eligibility": "Business owners who install renewable energy systems",
            }));
            policies.push(json!({
                "name": "Renewable Portfolio Standards (RPS)",
                "type": "regulations",
                "description": "State-level requirements for renewable energy procurement",
                "eligibility": "Varies by state",
            }));
            if region.eq_ignore_ascii_case("california") {
                policies.push(json!({
                    "name": "Net Energy Metering (NEM)",
                    "type": "regulations",
                    "description": "Credit for excess electricity sent to the grid",
                    "eligibility": "California utility customers with renewable systems",
                }));
            }
        }
        "eu" | "european union" => {
            policies.push(json!({
                "name": "Renewable Energy Directive (RED II)",
                "type": "regulations",
                "description": "Sets targets for renewable energy consumption",
                "eligibility": "All EU member states",
            }));
            policies.push(json!({
                "name": "European Green Deal",
                "type": "funding",
                "description": "Investment plan for a sustainable EU economy",
                "eligibility": "Various stakeholders across EU member states",
            }));
        }
        _ => {}
    }

    if !policy_type.is_empty() {
        policies.retain(|policy| {
            policy
                .get("type")
                .and_then(Value::as_str)
                .map(|kind| kind.eq_ignore_ascii_case(policy_type))
                .unwrap_or(false)
        });
    }

    json!({
        "status": "success",
        "country": country,
        "region": if region.is_empty() { "All regions" } else { region },
        "policy_type": if policy_type.is_empty() { "All policies" } else { policy_type },
        "policies": policies,
        "last_updated": Utc::now().to_rfc3339(),
    })
}

fn search_database(arguments: &Value) -> Value {
    let query = str_arg(arguments, "query").unwrap_or("");
    let filter_by = str_arg(arguments, "filter_by").unwrap_or("");
    let max_results = arguments
        .get("max_results")
        .and_then(Value::as_u64)
        .unwrap_or(5) as usize;

    let corpus = [
        (
            "Solar PV Efficiency Breakthrough",
            "technology",
            "New perovskite-silicon tandem solar cells achieve 29.8% efficiency",
        ),
        (
            "Wind Farm Development in North Sea",
            "project",
            "New 1.5 GW offshore wind farm to be developed off the coast of Denmark",
        ),
        (
            "Community Biogas Initiative in Rural India",
            "project",
            "50 villages implement community-scale biogas plants for cooking and electricity",
        ),
        (
            "Geothermal Energy Potential in East Africa",
            "location",
            "Study identifies 10 GW of untapped geothermal potential in the East African Rift",
        ),
        (
            "Battery Storage Integration with Renewable Energy",
            "technology",
            "New battery management systems optimize renewable energy storage",
        ),
    ];

    let query_lower = query.to_lowercase();
    let results: Vec<Value> = corpus
        .iter()
        .filter(|(_, category, _)| {
            filter_by.is_empty() || category.eq_ignore_ascii_case(filter_by)
        })
        .filter(|(title, category, summary)| {
            query_lower.is_empty()
                || title.to_lowercase().contains(&query_lower)
                || summary.to_lowercase().contains(&query_lower)
                || category.to_lowercase().contains(&query_lower)
        })
        .take(max_results)
        .map(|(title, category, summary)| {
            json!({ "title": title, "category": category, "summary": summary })
        })
        .collect();

    json!({
        "status": "success",
        "query": query,
        "filter_by": if filter_by.is_empty() { "All categories" } else { filter_by },
        "results_count": results.len(),
        "results": results,
        "search_timestamp": Utc::now().to_rfc3339(),
    })
}

fn str_arg<'a>(arguments: &'a Value, key: &str) -> Option<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn num_arg(arguments: &Value, tool: &str, key: &str) -> Result<f64, SyntheticError> {
    arguments
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| SyntheticError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("'{key}' must be a number"),
        })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roi_matches_reference_project() {
        let analysis = calculate_roi(&RoiInputs {
            initial_investment: 100_000.0,
            annual_revenue: 20_000.0,
            annual_costs: 5_000.0,
            project_lifetime: 25.0,
        });
        assert_eq!(analysis.net_annual_cash_flow, 15_000.0);
        assert_eq!(analysis.payback_period_years, Some(6.67));
        assert_eq!(analysis.total_profit, 275_000.0);
        assert_eq!(analysis.roi_percentage, 275.0);
        assert_eq!(analysis.estimated_irr_percentage, 15.0);
    }

    #[test]
    fn unprofitable_project_has_no_payback_period() {
        let analysis = calculate_roi(&RoiInputs {
            initial_investment: 100_000.0,
            annual_revenue: 4_000.0,
            annual_costs: 5_000.0,
            project_lifetime: 25.0,
        });
        assert_eq!(analysis.payback_period_years, None);
        assert!(analysis.total_profit < 0.0);

        let payload = generate(
            "calculate_roi",
            &json!({
                "project_type": "solar",
                "initial_investment": 100000,
                "annual_revenue": 4000,
                "annual_costs": 5000,
                "project_lifetime": 25
            }),
        )
        .expect("payload generated");
        assert_eq!(payload["payback_period_years"], Value::Null);
        assert!(payload["payback_note"].is_string());
    }

    #[test]
    fn roi_rejects_missing_required_arguments() {
        let result = generate("calculate_roi", &json!({"project_type": "wind"}));
        assert!(matches!(
            result,
            Err(SyntheticError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn solar_series_stays_in_the_category_range() {
        let payload = generate(
            "fetch_renewable_data",
            &json!({"energy_type": "solar", "time_period": "last_week"}),
        )
        .expect("payload generated");

        let series = payload["data"]["generation"]
            .as_array()
            .expect("generation series");
        assert!((7..=9).contains(&series.len()));
        for point in series {
            let value = point["value"].as_f64().expect("numeric value");
            assert!((70.0..=130.0).contains(&value), "value {value} out of range");
        }
    }

    #[test]
    fn two_solar_calls_share_a_range_but_not_values() {
        let args = json!({"energy_type": "solar", "time_period": "last_week"});
        let first = generate("fetch_renewable_data", &args).expect("first payload");
        let second = generate("fetch_renewable_data", &args).expect("second payload");
        assert_eq!(first["energy_type"], second["energy_type"]);
        // Equality of the full series would mean the generator is frozen.
        assert_ne!(first["data"], second["data"]);
    }

    #[test]
    fn dashboard_stub_provides_url_and_embed_code() {
        let payload = generate(
            "create_dashboard",
            &json!({"dashboard_type": "solar_farm", "title": "Solar Farm Overview"}),
        )
        .expect("payload generated");
        let url = payload["url"].as_str().expect("dashboard url");
        assert!(url.starts_with("/dashboards/solar_farm_"));
        assert!(payload["embed_code"].as_str().expect("embed").contains(url));
    }

    #[test]
    fn unknown_tool_is_unsupported() {
        assert!(matches!(
            generate("translate_text", &json!({})),
            Err(SyntheticError::UnsupportedTool(_))
        ));
    }

    #[test]
    fn policy_lookup_filters_by_type() {
        let payload = generate(
            "get_policy_information",
            &json!({"country": "United States", "policy_type": "regulations"}),
        )
        .expect("payload generated");
        let policies = payload["policies"].as_array().expect("policies");
        assert!(!policies.is_empty());
        for policy in policies {
            assert_eq!(policy["type"], json!("regulations"));
        }
    }
}
