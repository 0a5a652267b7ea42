//! Table and JSON rendering for command output.
//!
//! Every renderer returns the full frame as a `String`; printing is left to
//! the caller so watch mode can redraw in one write.

use clap::ValueEnum;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use serde_json::json;

use cpxstat_core::{HealthStatus, InstanceHealth, ServiceAggregate, UnreachableInstance};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
}

const INSTANCE_HEADERS: [&str; 5] = ["Instance", "Service", "CPU Usage", "Memory Usage", "Status"];

const SERVICE_HEADERS: [&str; 7] = [
    "Service",
    "CPU Usage",
    "Memory Usage",
    "Status",
    "Healthy Instances",
    "Unhealthy Instances",
    "Total Instances",
];

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold).fg(Color::Cyan))
            .collect::<Vec<_>>(),
    );
    table
}

fn status_cell(status: HealthStatus) -> Cell {
    let color = match status {
        HealthStatus::Healthy => Color::Green,
        HealthStatus::Unhealthy => Color::Red,
        HealthStatus::Unknown => Color::Yellow,
    };
    Cell::new(status).fg(color)
}

fn number_cell(value: impl ToString) -> Cell {
    Cell::new(value.to_string()).set_alignment(CellAlignment::Right)
}

/// Instance rows followed by one `Unknown` row per unreachable instance.
pub fn instance_table(rows: &[InstanceHealth], unreachable: &[UnreachableInstance]) -> Table {
    let mut table = new_table(&INSTANCE_HEADERS);
    for row in rows {
        table.add_row(vec![
            Cell::new(row.id()),
            Cell::new(row.service()),
            number_cell(row.metric.cpu_display()),
            number_cell(row.metric.memory_display()),
            status_cell(row.status),
        ]);
    }
    for missing in unreachable {
        table.add_row(vec![
            Cell::new(&missing.id),
            Cell::new("-"),
            number_cell("-"),
            number_cell("-"),
            status_cell(HealthStatus::Unknown),
        ]);
    }
    table
}

pub fn service_table(rows: &[ServiceAggregate]) -> Table {
    let mut table = new_table(&SERVICE_HEADERS);
    for row in rows {
        table.add_row(vec![
            Cell::new(&row.service),
            number_cell(row.cpu_display()),
            number_cell(row.memory_display()),
            status_cell(row.status),
            number_cell(row.healthy),
            number_cell(row.unhealthy),
            number_cell(row.total),
        ]);
    }
    table
}

fn unreachable_warning(unreachable: &[UnreachableInstance]) -> Option<String> {
    if unreachable.is_empty() {
        return None;
    }
    let ids: Vec<&str> = unreachable.iter().map(|u| u.id.as_str()).collect();
    Some(format!(
        "warning: {} instance(s) unreachable and excluded: {}",
        unreachable.len(),
        ids.join(", ")
    ))
}

pub fn render_instances(
    rows: &[InstanceHealth],
    unreachable: &[UnreachableInstance],
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => {
            let doc = json!({ "instances": rows, "unreachable": unreachable });
            Ok(format!("{}\n", serde_json::to_string_pretty(&doc)?))
        }
        OutputFormat::Table => {
            if rows.is_empty() && unreachable.is_empty() {
                return Ok("No instances found\n".to_string());
            }
            Ok(format!("Instance Statistics\n{}\n", instance_table(rows, unreachable)))
        }
    }
}

/// Service rollups. `show` passes `empty_table` so a service with no
/// instances still prints its headers.
pub fn render_services(
    rows: &[ServiceAggregate],
    unreachable: &[UnreachableInstance],
    format: OutputFormat,
    empty_table: bool,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => {
            let doc = json!({ "services": rows, "unreachable": unreachable });
            Ok(format!("{}\n", serde_json::to_string_pretty(&doc)?))
        }
        OutputFormat::Table => {
            let mut out = if rows.is_empty() && !empty_table {
                "No services found\n".to_string()
            } else {
                format!("Service Statistics\n{}\n", service_table(rows))
            };
            if let Some(warning) = unreachable_warning(unreachable) {
                out.push_str(&warning);
                out.push('\n');
            }
            Ok(out)
        }
    }
}

/// One instance, with any pass-through registry fields listed under the table.
pub fn render_instance_detail(instance: &InstanceHealth, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(instance)?)),
        OutputFormat::Table => {
            let mut out = format!(
                "Instance Statistics\n{}\n",
                instance_table(std::slice::from_ref(instance), &[])
            );
            for (key, value) in &instance.metric.extra {
                match value {
                    serde_json::Value::String(s) => out.push_str(&format!("{key}: {s}\n")),
                    other => out.push_str(&format!("{key}: {other}\n")),
                }
            }
            Ok(out)
        }
    }
}

/// A failed watch cycle, rendered in place of the frame.
pub fn render_error(err: &dyn std::error::Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format!("{}\n", json!({ "error": err.to_string() })),
        OutputFormat::Table => format!("error: {err}\n"),
    }
}
