// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! CSV encoding of query rows and typed records.

use crate::domain::entities::Record;
use crate::domain::errors::{MigrationError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Writes query rows as CSV with exactly `fields` as columns, in order.
/// Nested values (relationship lookups) are written as JSON text.
pub fn records_to_csv(fields: &[&str], records: &[Record]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(fields)?;
    for record in records {
        writer.write_record(fields.iter().map(|f| cell(record.get(*f))))?;
    }
    finish(writer)
}

/// Serializes typed rows. Headers come from the struct's serde names.
pub fn rows_to_csv<T: Serialize>(rows: &[T]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    finish(writer)
}

/// Parses CSV with headers into typed rows. Empty cells become `None`.
pub fn csv_to_rows<T: DeserializeOwned>(content: &[u8]) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_reader(content);
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| MigrationError::Io(std::io::Error::other(e.to_string())))
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{AssignmentRuleItem, Tm1Entity, UserTerritory};
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_query_rows_to_typed_rows() {
        let rows = vec![record(json!({
            "attributes": {"type": "UserTerritory"},
            "Id": "0R0000000000001",
            "UserId": "005000000000001",
            "TerritoryId": "04T000000000001",
            "IsActive": true
        }))];
        let csv = records_to_csv(Tm1Entity::UserTerritory.fields(), &rows).unwrap();
        assert_eq!(
            String::from_utf8(csv.clone()).unwrap(),
            "Id,UserId,TerritoryId,IsActive\n0R0000000000001,005000000000001,04T000000000001,true\n"
        );
        let parsed: Vec<UserTerritory> = csv_to_rows(&csv).unwrap();
        assert!(parsed[0].is_active);
        assert_eq!(parsed[0].territory_id, "04T000000000001");
    }

    #[test]
    fn test_nulls_and_numbers() {
        let rows = vec![record(json!({
            "Id": "0RI1",
            "RuleId": "0RA1",
            "SortOrder": 2,
            "Field": "Account.BillingState",
            "Operation": "equals",
            "Value": null
        }))];
        let csv = records_to_csv(Tm1Entity::AccountTerritoryAssignmentRuleItem.fields(), &rows)
            .unwrap();
        let parsed: Vec<AssignmentRuleItem> = csv_to_rows(&csv).unwrap();
        assert_eq!(parsed[0].sort_order, 2);
        assert!(parsed[0].value.is_none());
    }

    #[test]
    fn test_values_with_commas_are_quoted() {
        let rows = vec![record(json!({"Id": "1", "Name": "West, Inc", "Type": "x"}))];
        let csv = records_to_csv(&["Id", "Name"], &rows).unwrap();
        assert!(String::from_utf8(csv).unwrap().contains("\"West, Inc\""));
    }
}
