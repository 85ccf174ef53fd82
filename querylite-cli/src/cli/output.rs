// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Result formatting for the terminal

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use querylite::{FieldValue, ResultSet};

use super::commands::OutputFormat;

pub struct ResultFormatter;

impl ResultFormatter {
    pub fn format(result: &ResultSet, format: OutputFormat) -> String {
        match format {
            OutputFormat::Table => Self::format_table(result),
            OutputFormat::Json => serde_json::to_string_pretty(&result.to_json())
                .unwrap_or_else(|e| format!("Failed to serialize result: {}", e)),
        }
    }

    fn format_table(result: &ResultSet) -> String {
        if result.column_names().is_empty() {
            return match result.insert_id {
                Some(id) => format!("{} row(s) affected, last insert id {}", result.affected_rows, id),
                None => format!("{} row(s) affected", result.affected_rows),
            };
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(result.column_names().to_vec());

        for row in &result.rows {
            table.add_row(row.values().iter().map(FieldValue::to_string).collect::<Vec<_>>());
        }

        format!("{}\n{} row(s)", table, result.len())
    }
}
