//! In-memory `HubService` for tests.
//!
//! Answers from canned data built around one random id and keeps every
//! object it receives, normalized the same way the transport would send
//! it, under `"<operation>/<target id>"`.

use std::collections::BTreeMap;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::HubService;
use crate::codec::Codec;
use crate::error::Result;
use crate::model::{
    Connection, HubChangeLog, HubUser, Operation, OperationChange, OperationChangeEvent,
    OperationEvent, Organization, Project, RanChangeSet,
};

pub struct MockHubService {
    random_id: Uuid,
    pub online: bool,
    pub return_projects: Vec<Project>,
    pub return_connections: Vec<Connection>,
    pub return_change_logs: Vec<HubChangeLog>,
    sent_objects: Mutex<BTreeMap<String, Vec<Value>>>,
    codec: Codec,
}

impl Default for MockHubService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHubService {
    pub fn new() -> Self {
        let mut service = Self {
            random_id: Uuid::nil(),
            online: true,
            return_projects: Vec::new(),
            return_connections: Vec::new(),
            return_change_logs: Vec::new(),
            sent_objects: Mutex::new(BTreeMap::new()),
            codec: Codec::new(),
        };
        service.reset();
        service
    }

    /// Regenerate the canned data around a fresh id and forget everything
    /// recorded so far.
    pub fn reset(&mut self) {
        self.random_id = Uuid::new_v4();
        let project = Project {
            id: Some(self.random_id),
            name: Some("Test project".to_string()),
            create_date: None,
        };
        self.return_connections = vec![Connection {
            id: Some(self.random_id),
            jdbc_url: Some("jdbc://test".to_string()),
            project: Some(project.clone()),
            ..Connection::default()
        }];
        self.return_change_logs = vec![HubChangeLog {
            id: Some(self.random_id),
            name: Some("Mock changelog".to_string()),
            file_name: Some("com/example/test.xml".to_string()),
            project: Some(project.clone()),
            ..HubChangeLog::default()
        }];
        self.return_projects = vec![project];
        self.sent_objects.get_mut().clear();
    }

    /// The id shared by all canned objects since the last `reset`.
    pub fn random_id(&self) -> Uuid {
        self.random_id
    }

    /// Snapshot of everything received, keyed by operation and target.
    pub fn sent_objects(&self) -> BTreeMap<String, Vec<Value>> {
        self.sent_objects.lock().clone()
    }

    fn record<T: Serialize + ?Sized>(
        &self,
        operation: &str,
        target: Option<Uuid>,
        object: &T,
    ) -> Result<()> {
        let value = self.codec.encode_value(object)?.unwrap_or(Value::Null);
        let target = target.map_or_else(|| "none".to_string(), |id| id.to_string());
        self.sent_objects
            .lock()
            .entry(format!("{operation}/{target}"))
            .or_default()
            .push(value);
        Ok(())
    }
}

impl HubService for MockHubService {
    fn is_online(&self) -> bool {
        self.online
    }

    fn get_me(&self) -> Result<HubUser> {
        Ok(HubUser {
            id: Some(self.random_id),
            username: Some("mock-user".to_string()),
        })
    }

    fn get_organization(&self) -> Result<Organization> {
        Ok(Organization {
            id: Some(self.random_id),
            name: Some("Mock organization".to_string()),
        })
    }

    fn get_projects(&self) -> Result<Vec<Project>> {
        Ok(self.return_projects.clone())
    }

    fn create_project(&self, project: &Project) -> Result<Project> {
        self.record("createProject", Some(self.random_id), project)?;
        Ok(Project {
            id: Some(Uuid::new_v4()),
            create_date: Some(Utc::now()),
            ..project.clone()
        })
    }

    fn set_ran_change_sets(&self, connection: &Connection, ran: &[RanChangeSet]) -> Result<()> {
        for change_set in ran {
            self.record("setRanChangeSets", connection.id, change_set)?;
        }
        Ok(())
    }

    fn get_connections(&self, _example: &Connection) -> Result<Vec<Connection>> {
        Ok(self.return_connections.clone())
    }

    fn create_connection(&self, connection: &Connection) -> Result<Connection> {
        let project_id = connection.project.as_ref().and_then(|project| project.id);
        self.record("createConnection", project_id, connection)?;
        Ok(Connection {
            id: Some(Uuid::new_v4()),
            jdbc_url: connection.jdbc_url.clone(),
            ..Connection::default()
        })
    }

    fn create_change_log(&self, change_log: &HubChangeLog) -> Result<HubChangeLog> {
        Ok(HubChangeLog {
            id: Some(Uuid::new_v4()),
            ..change_log.clone()
        })
    }

    fn get_change_log(&self, id: Uuid) -> Result<Option<HubChangeLog>> {
        Ok(self
            .return_change_logs
            .iter()
            .find(|change_log| change_log.id == Some(id))
            .cloned())
    }

    fn create_operation(
        &self,
        operation_type: &str,
        change_log: &HubChangeLog,
        connection: &Connection,
        parameters: &BTreeMap<String, String>,
    ) -> Result<Operation> {
        self.record("startOperation", connection.id, parameters)?;
        Ok(Operation {
            id: Some(Uuid::new_v4()),
            operation_type: Some(operation_type.to_string()),
            connection: Some(connection.clone()),
            change_log: Some(change_log.clone()),
            parameters: Some(parameters.clone()),
            ..Operation::default()
        })
    }

    fn send_operation_event(
        &self,
        operation: &Operation,
        event: &OperationEvent,
    ) -> Result<OperationEvent> {
        self.record("sendOperationEvent", operation.id, event)?;
        Ok(event.clone())
    }

    fn send_operation_change_event(&self, event: &OperationChangeEvent) -> Result<()> {
        let operation_id = event.operation.as_ref().and_then(|operation| operation.id);
        self.record("sendOperationChangeEvent", operation_id, event)
    }

    fn send_operation_changes(&self, change: &OperationChange) -> Result<()> {
        let operation_id = change.operation.as_ref().and_then(|operation| operation.id);
        for change_set in &change.change_sets {
            self.record("sendOperationChanges", operation_id, change_set)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn canned_data_shares_one_id() {
        let mock = MockHubService::new();
        let id = mock.random_id();
        assert_eq!(mock.get_projects().unwrap()[0].id, Some(id));
        assert_eq!(mock.get_connections(&Connection::default()).unwrap()[0].id, Some(id));
        let change_log = mock.get_change_log(id).unwrap().unwrap();
        assert_eq!(change_log.name.as_deref(), Some("Mock changelog"));
        assert!(mock.get_change_log(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn records_ran_change_sets_by_connection() {
        let mock = MockHubService::new();
        let connection = mock.return_connections[0].clone();
        let ran = vec![
            RanChangeSet {
                change_set_id: Some("1".to_string()),
                order_executed: Some(1),
                ..RanChangeSet::default()
            },
            RanChangeSet {
                change_set_id: Some("2".to_string()),
                ..RanChangeSet::default()
            },
        ];
        mock.set_ran_change_sets(&connection, &ran).unwrap();

        let sent = mock.sent_objects();
        let key = format!("setRanChangeSets/{}", mock.random_id());
        assert_eq!(
            sent[&key],
            vec![
                json!({"changeSetId": "1", "orderExecuted": 1}),
                json!({"changeSetId": "2"}),
            ]
        );
    }

    #[test]
    fn create_operation_records_parameters_under_connection() {
        let mock = MockHubService::new();
        let connection = mock.return_connections[0].clone();
        let change_log = mock.return_change_logs[0].clone();
        let mut parameters = BTreeMap::new();
        parameters.insert("changeLogFile".to_string(), "db.xml".to_string());

        let operation = mock
            .create_operation("UPDATE", &change_log, &connection, &parameters)
            .unwrap();
        assert!(operation.id.is_some());
        assert_eq!(operation.operation_type.as_deref(), Some("UPDATE"));

        let key = format!("startOperation/{}", mock.random_id());
        assert_eq!(
            mock.sent_objects()[&key],
            vec![json!({"changeLogFile": "db.xml"})]
        );
    }

    #[test]
    fn get_connection_answers_the_canned_connection() {
        let mock = MockHubService::new();
        let connection = mock.get_connection(&Connection::default(), false).unwrap();
        assert_eq!(connection.id, Some(mock.random_id()));
        assert!(mock.sent_objects().is_empty());
    }

    #[test]
    fn records_operation_changes_and_change_events() {
        let mock = MockHubService::new();
        let operation = Operation {
            id: Some(mock.random_id()),
            ..Operation::default()
        };
        mock.send_operation_changes(&OperationChange {
            operation: Some(operation.clone()),
            change_sets: vec![RanChangeSet {
                change_set_id: Some("1".to_string()),
                author: Some("dev".to_string()),
                ..RanChangeSet::default()
            }],
            ..OperationChange::default()
        })
        .unwrap();
        mock.send_operation_change_event(&OperationChangeEvent {
            event_type: Some("UPDATE".to_string()),
            changeset_id: Some("1".to_string()),
            operation: Some(operation),
            ..OperationChangeEvent::default()
        })
        .unwrap();

        let sent = mock.sent_objects();
        let id = mock.random_id();
        assert_eq!(
            sent[&format!("sendOperationChanges/{id}")],
            vec![json!({"changeSetId": "1", "author": "dev"})]
        );
        assert_eq!(
            sent[&format!("sendOperationChangeEvent/{id}")],
            vec![json!({"eventType": "UPDATE", "changesetId": "1"})]
        );
    }

    #[test]
    fn reset_forgets_recorded_objects() {
        let mut mock = MockHubService::new();
        let old_id = mock.random_id();
        mock.create_connection(&Connection {
            jdbc_url: Some("jdbc://other".to_string()),
            ..Connection::default()
        })
        .unwrap();
        assert!(mock.sent_objects().contains_key("createConnection/none"));

        mock.reset();
        assert!(mock.sent_objects().is_empty());
        assert_ne!(mock.random_id(), old_id);
    }
}
