//! Step definitions - Primitive schema and data operations
//!
//! A [`Step`] is one primitive change inside a migration unit: add or drop a
//! column, change a column's stored type, or bulk-delete rows. Steps render
//! themselves to SQL against an explicit [`CapabilitySet`], so backend
//! differences are resolved in one place.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::backends::FEATURE_BINARY_JSON;
use crate::capability::CapabilitySet;

/// Column storage types understood by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Boolean,
    Integer,
    BigInt,
    Text,
    VarChar(u32),
    Timestamp,
    /// Textual JSON storage
    Json,
    /// Binary JSON storage with index support (PostgreSQL JSONB)
    JsonBinary,
    /// Document column whose concrete stored type is chosen by capability:
    /// binary JSON where available, textual JSON otherwise
    Document,
}

impl ColumnType {
    /// Resolve a capability-dependent type to its concrete stored type
    pub fn resolve(&self, caps: &CapabilitySet) -> ColumnType {
        match self {
            ColumnType::Document => {
                if caps.supports_binary_json {
                    ColumnType::JsonBinary
                } else {
                    ColumnType::Json
                }
            }
            other => other.clone(),
        }
    }

    /// Render the SQL type name for the given backend capabilities
    pub fn sql(&self, caps: &CapabilitySet) -> String {
        match self {
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::VarChar(len) => format!("VARCHAR({})", len),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::Json => "JSON".to_string(),
            ColumnType::JsonBinary => "JSONB".to_string(),
            ColumnType::Document => self.resolve(caps).sql(caps),
        }
    }

    /// Short lowercase label, independent of backend capabilities
    pub fn label(&self) -> String {
        match self {
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::Integer => "integer".to_string(),
            ColumnType::BigInt => "bigint".to_string(),
            ColumnType::Text => "text".to_string(),
            ColumnType::VarChar(len) => format!("varchar({})", len),
            ColumnType::Timestamp => "timestamp".to_string(),
            ColumnType::Json => "json".to_string(),
            ColumnType::JsonBinary => "jsonb".to_string(),
            ColumnType::Document => "document".to_string(),
        }
    }

    fn is_json(&self) -> bool {
        matches!(
            self,
            ColumnType::Json | ColumnType::JsonBinary | ColumnType::Document
        )
    }
}

/// A single primitive schema or data operation within a migration unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    AddColumn {
        table: String,
        column: String,
        column_type: ColumnType,
        default: Option<JsonValue>,
    },
    DropColumn {
        table: String,
        column: String,
    },
    ChangeColumnType {
        table: String,
        column: String,
        new_type: ColumnType,
        /// Value-preserving cast expression; defaults to `column::type`
        conversion: Option<String>,
    },
    BulkDelete {
        table: String,
        predicate: String,
    },
}

impl Step {
    /// Add a column with no default
    pub fn add_column(table: &str, column: &str, column_type: ColumnType) -> Self {
        Step::AddColumn {
            table: table.to_string(),
            column: column.to_string(),
            column_type,
            default: None,
        }
    }

    /// Add a column with a default applied atomically with creation
    pub fn add_column_with_default(
        table: &str,
        column: &str,
        column_type: ColumnType,
        default: JsonValue,
    ) -> Self {
        Step::AddColumn {
            table: table.to_string(),
            column: column.to_string(),
            column_type,
            default: Some(default),
        }
    }

    /// Drop a column
    pub fn drop_column(table: &str, column: &str) -> Self {
        Step::DropColumn {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    /// Change a column's stored type using the default cast expression
    pub fn change_column_type(table: &str, column: &str, new_type: ColumnType) -> Self {
        Step::ChangeColumnType {
            table: table.to_string(),
            column: column.to_string(),
            new_type,
            conversion: None,
        }
    }

    /// Change a column's stored type with an explicit conversion expression
    pub fn change_column_type_using(
        table: &str,
        column: &str,
        new_type: ColumnType,
        conversion: &str,
    ) -> Self {
        Step::ChangeColumnType {
            table: table.to_string(),
            column: column.to_string(),
            new_type,
            conversion: Some(conversion.to_string()),
        }
    }

    /// Delete all rows matching a predicate
    pub fn bulk_delete(table: &str, predicate: &str) -> Self {
        Step::BulkDelete {
            table: table.to_string(),
            predicate: predicate.to_string(),
        }
    }

    /// The table this step operates on
    pub fn table(&self) -> &str {
        match self {
            Step::AddColumn { table, .. }
            | Step::DropColumn { table, .. }
            | Step::ChangeColumnType { table, .. }
            | Step::BulkDelete { table, .. } => table,
        }
    }

    /// Render this step to a SQL statement for the given backend capabilities.
    ///
    /// Returns `None` when the step degrades to a no-op on this backend:
    /// a JSON type conversion on a backend with no distinct binary JSON type
    /// changes nothing, since both types share one textual representation.
    ///
    /// Steps do not record the column's current type, so any conversion to a
    /// json-family target (`Json`, `JsonBinary`, or `Document`) degrades this
    /// way, including conversions from non-JSON source types. The same rule
    /// keeps inverse steps symmetric: a `Json`-target down step generated for
    /// a degraded up step is itself a no-op.
    pub fn to_sql(&self, caps: &CapabilitySet) -> Option<String> {
        match self {
            Step::AddColumn {
                table,
                column,
                column_type,
                default,
            } => {
                let mut sql = format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    table,
                    column,
                    column_type.sql(caps)
                );
                if let Some(value) = default {
                    sql.push_str(&format!(" DEFAULT {}", default_literal(value)));
                }
                Some(sql)
            }
            Step::DropColumn { table, column } => {
                Some(format!("ALTER TABLE {} DROP COLUMN {}", table, column))
            }
            Step::ChangeColumnType {
                table,
                column,
                new_type,
                conversion,
            } => {
                if new_type.is_json() && !caps.supports_binary_json {
                    // json and jsonb are representationally identical here
                    return None;
                }
                let resolved = new_type.resolve(caps);
                let using = conversion.clone().unwrap_or_else(|| {
                    format!("{}::{}", column, resolved.sql(caps).to_lowercase())
                });
                Some(format!(
                    "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}",
                    table,
                    column,
                    resolved.sql(caps),
                    using
                ))
            }
            Step::BulkDelete { table, predicate } => {
                Some(format!("DELETE FROM {} WHERE {}", table, predicate))
            }
        }
    }

    /// Produce the safe inverse of this step, where one exists.
    ///
    /// - `AddColumn` inverts to `DropColumn`.
    /// - JSON type conversions round-trip (`json` to `jsonb` and back).
    /// - `DropColumn` and `BulkDelete` destroy information and have no
    ///   safe inverse.
    pub fn inverse(&self) -> Option<Step> {
        match self {
            Step::AddColumn { table, column, .. } => Some(Step::drop_column(table, column)),
            Step::ChangeColumnType {
                table,
                column,
                new_type: ColumnType::JsonBinary,
                ..
            } => Some(Step::change_column_type_using(
                table,
                column,
                ColumnType::Json,
                &format!("{}::json", column),
            )),
            Step::ChangeColumnType {
                table,
                column,
                new_type: ColumnType::Json,
                ..
            } => Some(Step::change_column_type_using(
                table,
                column,
                ColumnType::JsonBinary,
                &format!("{}::jsonb", column),
            )),
            _ => None,
        }
    }

    /// Backend feature this step demands outright, with no defined fallback
    pub fn required_feature(&self) -> Option<&'static str> {
        match self {
            Step::AddColumn {
                column_type: ColumnType::JsonBinary,
                ..
            } => Some(FEATURE_BINARY_JSON),
            _ => None,
        }
    }

    /// Short description for logs and error reports
    pub fn describe(&self) -> String {
        match self {
            Step::AddColumn {
                table,
                column,
                column_type,
                ..
            } => format!("add_column {}.{} {}", table, column, column_type.label()),
            Step::DropColumn { table, column } => {
                format!("drop_column {}.{}", table, column)
            }
            Step::ChangeColumnType {
                table,
                column,
                new_type,
                ..
            } => format!(
                "change_column_type {}.{} -> {}",
                table,
                column,
                new_type.label()
            ),
            Step::BulkDelete { table, predicate } => {
                format!("bulk_delete {} where {}", table, predicate)
            }
        }
    }
}

/// Render a JSON default value as a SQL literal
fn default_literal(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(true) => "TRUE".to_string(),
        JsonValue::Bool(false) => "FALSE".to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}
