//! Domain-level operations against the Hub.
//!
//! `HubService` is the contract callers program against. `OnlineHubService`
//! maps each operation onto one transport call; `MockHubService` answers
//! from memory and records what it was sent.

mod mock;
mod online;

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::error::{HubError, Result, TransportError};
use crate::model::{
    Connection, HubChangeLog, HubUser, Operation, OperationChange, OperationChangeEvent,
    OperationEvent, Organization, Project, RanChangeSet,
};

pub use mock::MockHubService;
pub use online::OnlineHubService;

pub trait HubService {
    /// Whether the service is configured to talk to a Hub at all.
    fn is_online(&self) -> bool;

    fn get_me(&self) -> Result<HubUser>;

    fn get_organization(&self) -> Result<Organization>;

    fn get_projects(&self) -> Result<Vec<Project>>;

    fn create_project(&self, project: &Project) -> Result<Project>;

    /// Report the change sets that have been applied to `connection`.
    fn set_ran_change_sets(&self, connection: &Connection, ran: &[RanChangeSet]) -> Result<()>;

    /// Connections of the example's project, narrowed by its JDBC URL when
    /// one is set.
    fn get_connections(&self, example: &Connection) -> Result<Vec<Connection>>;

    /// The one connection matching `example`.
    ///
    /// With no match, a connection is created from the example's JDBC URL,
    /// name, description and project when `create_if_not_exists` is set,
    /// and `NotFound` is returned otherwise. Several matches are `Generic`.
    fn get_connection(
        &self,
        example: &Connection,
        create_if_not_exists: bool,
    ) -> Result<Connection> {
        let mut connections = self.get_connections(example)?;
        match connections.len() {
            0 if create_if_not_exists => self.create_connection(&Connection {
                jdbc_url: example.jdbc_url.clone(),
                name: example.name.clone(),
                description: example.description.clone(),
                project: example.project.clone(),
                ..Connection::default()
            }),
            0 => Err(HubError::not_found("connection not found")),
            1 => Ok(connections.remove(0)),
            count => Err(HubError::generic(TransportError::Ambiguous {
                what: "connection",
                count,
            })),
        }
    }

    fn create_connection(&self, connection: &Connection) -> Result<Connection>;

    fn create_change_log(&self, change_log: &HubChangeLog) -> Result<HubChangeLog>;

    /// `Ok(None)` when the Hub has no change log with this id.
    fn get_change_log(&self, id: Uuid) -> Result<Option<HubChangeLog>>;

    fn create_operation(
        &self,
        operation_type: &str,
        change_log: &HubChangeLog,
        connection: &Connection,
        parameters: &BTreeMap<String, String>,
    ) -> Result<Operation>;

    fn send_operation_event(
        &self,
        operation: &Operation,
        event: &OperationEvent,
    ) -> Result<OperationEvent>;

    /// Report progress of a single change set within an operation.
    fn send_operation_change_event(&self, event: &OperationChangeEvent) -> Result<()>;

    /// Announce the change sets an operation will run.
    fn send_operation_changes(&self, change: &OperationChange) -> Result<()>;
}

pub(crate) fn require_id(id: Option<Uuid>, what: &'static str) -> Result<Uuid> {
    id.ok_or_else(|| HubError::generic(TransportError::MissingId(what)))
}

fn project_id(project: Option<&Project>, what: &'static str) -> Result<Uuid> {
    require_id(project.and_then(|project| project.id), what)
}

/// Project and operation ids for an operation-scoped path. The project
/// falls back to the one of the operation's connection.
fn operation_target(
    project: Option<&Project>,
    operation: Option<&Operation>,
) -> Result<(Uuid, Uuid)> {
    let project = project.or_else(|| {
        operation
            .and_then(|operation| operation.connection.as_ref())
            .and_then(|connection| connection.project.as_ref())
    });
    let project_id = project_id(project, "project")?;
    let operation_id = require_id(operation.and_then(|operation| operation.id), "operation")?;
    Ok((project_id, operation_id))
}
