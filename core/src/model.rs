//! Hub domain records.
//!
//! # Design
//! Every field is optional: the same type is used for requests (where
//! unset fields must stay off the wire) and for responses (where the server
//! may omit them). Field names follow the Hub's camelCase JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// One page of a collection endpoint.
///
/// Pagination fields (`number`, `size`, `totalElements`, ...) are kept
/// as-is in `metadata`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HubUser {
    pub id: Option<Uuid>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: Option<Uuid>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub create_date: Option<DateTime<Utc>>,
}

/// A database target registered with the Hub.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: Option<Uuid>,
    pub jdbc_url: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub create_date: Option<DateTime<Utc>>,
    pub project: Option<Project>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HubChangeLog {
    pub id: Option<Uuid>,
    pub external_changelog_id: Option<Uuid>,
    pub file_name: Option<String>,
    pub name: Option<String>,
    pub project: Option<Project>,
}

/// A change set that has been applied to a connection's database.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RanChangeSet {
    pub change_set_id: Option<String>,
    pub author: Option<String>,
    pub file_path: Option<String>,
    pub md5sum: Option<String>,
    pub date_executed: Option<DateTime<Utc>>,
    pub exec_type: Option<String>,
    pub description: Option<String>,
    pub comments: Option<String>,
    pub tag: Option<String>,
    pub deployment_id: Option<String>,
    pub order_executed: Option<i32>,
    pub labels: Option<String>,
    pub contexts: Option<String>,
}

/// Wire wrapper for a ran change set. The tag name is dropped on encode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "hubChange")]
pub struct HubChange(pub RanChangeSet);

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: Option<Uuid>,
    pub operation_type: Option<String>,
    pub connection: Option<Connection>,
    pub change_log: Option<HubChangeLog>,
    pub operation_status: Option<OperationStatus>,
    pub client_metadata: Option<BTreeMap<String, String>>,
    pub parameters: Option<BTreeMap<String, String>>,
    pub create_date: Option<DateTime<Utc>>,
    pub remove_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatus {
    pub id: Option<Uuid>,
    pub status_message: Option<String>,
    pub operation_status_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OperationEvent {
    pub id: Option<Uuid>,
    pub event_type: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub status_message: Option<String>,
    pub log: Option<String>,
}

/// Progress of one change set within an operation.
///
/// `project` and `operation` only select the endpoint and are never part
/// of the body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OperationChangeEvent {
    pub event_type: Option<String>,
    #[serde(skip)]
    pub project: Option<Project>,
    #[serde(skip)]
    pub operation: Option<Operation>,
    pub changeset_id: Option<String>,
    pub changeset_author: Option<String>,
    pub changeset_filename: Option<String>,
    pub changeset_body: Option<String>,
    pub generated_sql: Option<Vec<String>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub date_executed: Option<DateTime<Utc>>,
    pub operation_status_type: Option<String>,
    pub status_message: Option<String>,
    pub logs: Option<String>,
    pub logs_timestamp: Option<DateTime<Utc>>,
}

/// The change sets an operation is about to run. Sent as a list of
/// `HubChange`s to the operation's project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationChange {
    pub project: Option<Project>,
    pub operation: Option<Operation>,
    pub change_sets: Vec<RanChangeSet>,
}

#[cfg(test)]
mod tests {
    use super::*;

    // No `Default` impl, as with most item types callers bring.
    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u32,
    }

    #[test]
    fn list_without_content_is_empty() {
        let page: ListResponse<Item> =
            serde_json::from_str(r#"{"number":0,"totalElements":0}"#).unwrap();
        assert!(page.content.is_empty());
        assert_eq!(page.metadata["totalElements"], 0);
    }

    #[test]
    fn list_keeps_order_and_metadata() {
        let page: ListResponse<Item> =
            serde_json::from_str(r#"{"content":[{"id":2},{"id":1}],"size":2}"#).unwrap();
        assert_eq!(page.content, vec![Item { id: 2 }, Item { id: 1 }]);
        assert_eq!(page.metadata["size"], 2);
        assert!(!page.metadata.contains_key("content"));
    }

    #[test]
    fn change_event_routing_fields_stay_off_the_wire() {
        let event = OperationChangeEvent {
            event_type: Some("UPDATE".to_string()),
            project: Some(Project::default()),
            operation: Some(Operation::default()),
            ..OperationChangeEvent::default()
        };
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("project").is_none());
        assert!(value.get("operation").is_none());
        assert_eq!(value["eventType"], "UPDATE");
    }
}
