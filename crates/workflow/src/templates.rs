//! Built-in workflow templates for common automation tasks

use serde_json::json;
use workstation_core::workflow::{StepDefinition, StepType, WorkflowDefinition};

/// Compare product prices across two websites
pub fn price_comparison() -> WorkflowDefinition {
    WorkflowDefinition::new("price-comparison", "Price Comparison")
        .describe("Compare product prices across multiple websites")
        .starting_at("navigate-1")
        .step(
            StepDefinition::new("navigate-1", StepType::Navigate)
                .with_config(json!({"url": "$site1Url"}))
                .then(&["extract-1"]),
        )
        .step(
            StepDefinition::new("extract-1", StepType::Extract)
                .with_config(json!({"selector": "$priceSelector", "extract_type": "text"}))
                .then(&["navigate-2"]),
        )
        .step(
            StepDefinition::new("navigate-2", StepType::Navigate)
                .with_config(json!({"url": "$site2Url"}))
                .then(&["extract-2"]),
        )
        .step(
            StepDefinition::new("extract-2", StepType::Extract)
                .with_config(json!({"selector": "$priceSelector", "extract_type": "text"}))
                .then(&["analyze"]),
        )
        .step(
            StepDefinition::new("analyze", StepType::Analyze).with_config(json!({
                "data": {
                    "site1": "$step_extract-1",
                    "site2": "$step_extract-2",
                },
                "analysis_type": "price-comparison",
            })),
        )
}

/// Collect and summarize articles from multiple sources
pub fn content_aggregation() -> WorkflowDefinition {
    WorkflowDefinition::new("content-aggregation", "Content Aggregation")
        .describe("Collect and summarize articles from multiple sources")
        .starting_at("extract-links")
        .step(
            StepDefinition::new("extract-links", StepType::Extract)
                .with_config(json!({"selector": "a.article-link", "extract_type": "href"}))
                .then(&["loop-articles"]),
        )
        .step(
            StepDefinition::new("loop-articles", StepType::Loop)
                .with_config(json!({"items": "$step_extract-links", "max_items": 10}))
                .then(&["aggregate"]),
        )
        .step(
            StepDefinition::new("aggregate", StepType::Analyze).with_config(json!({
                "data": "$step_loop-articles",
                "analysis_type": "content-aggregation",
            })),
        )
}

/// Automatically fill out a web form; the two field steps run in parallel
pub fn form_filling() -> WorkflowDefinition {
    WorkflowDefinition::new("form-filling", "Form Filling")
        .describe("Automatically fill out web forms")
        .starting_at("navigate")
        .step(
            StepDefinition::new("navigate", StepType::Navigate)
                .with_config(json!({"url": "$formUrl"}))
                .then(&["fill-name", "fill-email"]),
        )
        .step(
            StepDefinition::new("fill-name", StepType::Action)
                .with_config(json!({
                    "action_type": "type",
                    "selector": "input[name=\"name\"]",
                    "value": "$name",
                }))
                .then(&["submit"]),
        )
        .step(
            StepDefinition::new("fill-email", StepType::Action)
                .with_config(json!({
                    "action_type": "type",
                    "selector": "input[name=\"email\"]",
                    "value": "$email",
                }))
                .then(&["submit"]),
        )
        .step(
            StepDefinition::new("submit", StepType::Action).with_config(json!({
                "action_type": "click",
                "selector": "button[type=\"submit\"]",
            })),
        )
}

/// Extract structured data from a webpage
pub fn data_extraction() -> WorkflowDefinition {
    WorkflowDefinition::new("data-extraction", "Data Extraction")
        .describe("Extract structured data from a webpage")
        .starting_at("navigate")
        .step(
            StepDefinition::new("navigate", StepType::Navigate)
                .with_config(json!({"url": "$targetUrl"}))
                .then(&["extract-table"]),
        )
        .step(
            StepDefinition::new("extract-table", StepType::Extract)
                .with_config(json!({
                    "selector": "table tbody tr",
                    "extract_type": "structured",
                    "fields": {
                        "name": "td:nth-child(1)",
                        "value": "td:nth-child(2)",
                        "date": "td:nth-child(3)",
                    },
                }))
                .then(&["analyze"]),
        )
        .step(
            StepDefinition::new("analyze", StepType::Analyze).with_config(json!({
                "data": "$step_extract-table",
                "analysis_type": "data-extraction",
            })),
        )
}

/// Monitor a price and alert when it drops below the target
pub fn price_monitoring() -> WorkflowDefinition {
    WorkflowDefinition::new("price-monitoring", "Price Monitoring")
        .describe("Monitor price changes and alert on threshold")
        .starting_at("navigate")
        .step(
            StepDefinition::new("navigate", StepType::Navigate)
                .with_config(json!({"url": "$productUrl"}))
                .then(&["extract-price"]),
        )
        .step(
            StepDefinition::new("extract-price", StepType::Extract)
                .with_config(json!({"selector": "$priceSelector", "extract_type": "text"}))
                .then(&["check-threshold"]),
        )
        .step(
            StepDefinition::new("check-threshold", StepType::Condition)
                .with_config(json!({
                    "condition": "step_extract-price[\"data\"][0] < $targetPrice",
                }))
                .on_success("send-alert")
                .on_error("end"),
        )
        .step(
            StepDefinition::new("send-alert", StepType::Custom).with_config(json!({
                "handler": "send-notification",
                "message": "Price dropped below the target",
            })),
        )
        .step(
            StepDefinition::new("end", StepType::Analyze).with_config(json!({
                "data": "$step_extract-price",
                "analysis_type": "price-monitoring",
            })),
        )
}

/// All built-in templates, registered at startup
pub fn builtin_templates() -> Vec<WorkflowDefinition> {
    vec![
        price_comparison(),
        content_aggregation(),
        form_filling(),
        data_extraction(),
        price_monitoring(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::WorkflowEngine;
    use std::sync::Arc;
    use workstation_common::config::WorkflowConfig;
    use workstation_common::metrics::DefaultMetricsCollector;

    #[test]
    fn all_templates_pass_registration_validation() {
        let engine = WorkflowEngine::new(
            WorkflowConfig {
                step_wait_timeout_seconds: 300,
                step_poll_interval_ms: 500,
            },
            Arc::new(DefaultMetricsCollector),
        );
        for template in builtin_templates() {
            let id = template.id.clone();
            engine
                .register_workflow(template)
                .unwrap_or_else(|e| panic!("template {id} failed validation: {e}"));
        }
        assert_eq!(engine.workflow_ids().len(), 5);
    }

    #[test]
    fn templates_have_stable_ids() {
        let ids: Vec<String> = builtin_templates().iter().map(|t| t.id.clone()).collect();
        assert!(ids.contains(&"price-comparison".to_string()));
        assert!(ids.contains(&"form-filling".to_string()));
    }
}
