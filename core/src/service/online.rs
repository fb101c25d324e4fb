//! `HubService` backed by the HTTP transport.
//!
//! Every operation is exactly one transport call with a fixed path under
//! the organization the API key belongs to. The organization is resolved
//! once, in `connect`.

use std::collections::BTreeMap;

use serde::de::IgnoredAny;
use tracing::debug;
use uuid::Uuid;

use super::{operation_target, project_id, require_id, HubService};
use crate::config::{HubConfig, HubSettings};
use crate::error::{HubError, Result};
use crate::model::{
    Connection, HubChange, HubChangeLog, HubUser, ListResponse, Operation, OperationChange,
    OperationChangeEvent, OperationEvent, Organization, Project, RanChangeSet,
};
use crate::transport::Transport;

const ME_PATH: &str = "/api/v1/users/me";
const ORGANIZATIONS_PATH: &str = "/api/v1/organizations";

pub struct OnlineHubService<C = HubSettings> {
    transport: Transport<C>,
    organization_id: Uuid,
}

impl<C: HubConfig> OnlineHubService<C> {
    /// Resolve the caller's organization and bind the service to it.
    ///
    /// This is the first network call; ask `Transport::is_configured`
    /// beforehand to skip the Hub when no URL or key is set.
    pub fn connect(transport: Transport<C>) -> Result<Self> {
        let organization = fetch_organization(&transport)?;
        let organization_id = require_id(organization.id, "organization")?;
        debug!(%organization_id, "hub service bound to organization");
        Ok(Self {
            transport,
            organization_id,
        })
    }

    pub fn organization_id(&self) -> Uuid {
        self.organization_id
    }

    pub fn transport(&self) -> &Transport<C> {
        &self.transport
    }

    fn path(&self, suffix: &str) -> String {
        format!("{ORGANIZATIONS_PATH}/{}{suffix}", self.organization_id)
    }
}

fn fetch_organization<C: HubConfig>(transport: &Transport<C>) -> Result<Organization> {
    let page: ListResponse<Organization> = transport.get_list(ORGANIZATIONS_PATH, &[])?;
    page.content
        .into_iter()
        .next()
        .ok_or_else(|| HubError::not_found("no organization is visible to this API key"))
}

impl<C: HubConfig> HubService for OnlineHubService<C> {
    fn is_online(&self) -> bool {
        self.transport.is_configured()
    }

    fn get_me(&self) -> Result<HubUser> {
        self.transport.get(ME_PATH, &[])
    }

    fn get_organization(&self) -> Result<Organization> {
        fetch_organization(&self.transport)
    }

    fn get_projects(&self) -> Result<Vec<Project>> {
        let page: ListResponse<Project> = self.transport.get_list(&self.path("/projects"), &[])?;
        Ok(page.content)
    }

    fn create_project(&self, project: &Project) -> Result<Project> {
        self.transport.post(&self.path("/projects"), Some(project))
    }

    fn set_ran_change_sets(&self, connection: &Connection, ran: &[RanChangeSet]) -> Result<()> {
        let connection_id = require_id(connection.id, "connection")?;
        let changes: Vec<HubChange> = ran.iter().cloned().map(HubChange).collect();
        self.transport.put::<_, IgnoredAny>(
            &self.path(&format!("/connections/{connection_id}/changesets")),
            Some(&changes),
        )?;
        Ok(())
    }

    fn get_connections(&self, example: &Connection) -> Result<Vec<Connection>> {
        let project_id = project_id(example.project.as_ref(), "project")?;
        let mut query = Vec::new();
        if let Some(jdbc_url) = example.jdbc_url.as_deref() {
            query.push(("jdbcUrl", jdbc_url));
        }
        let page: ListResponse<Connection> = self
            .transport
            .get_list(&self.path(&format!("/projects/{project_id}/connections")), &query)?;
        Ok(page.content)
    }

    fn create_connection(&self, connection: &Connection) -> Result<Connection> {
        let project_id = project_id(connection.project.as_ref(), "project")?;
        self.transport.post(
            &self.path(&format!("/projects/{project_id}/connections")),
            Some(connection),
        )
    }

    fn create_change_log(&self, change_log: &HubChangeLog) -> Result<HubChangeLog> {
        let project_id = project_id(change_log.project.as_ref(), "project")?;
        self.transport.post(
            &self.path(&format!("/projects/{project_id}/changelogs")),
            Some(change_log),
        )
    }

    fn get_change_log(&self, id: Uuid) -> Result<Option<HubChangeLog>> {
        match self.transport.get(&self.path(&format!("/changelogs/{id}")), &[]) {
            Ok(change_log) => Ok(Some(change_log)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn create_operation(
        &self,
        operation_type: &str,
        change_log: &HubChangeLog,
        connection: &Connection,
        parameters: &BTreeMap<String, String>,
    ) -> Result<Operation> {
        let project = connection.project.as_ref().or(change_log.project.as_ref());
        let project_id = project_id(project, "project")?;
        let operation = Operation {
            operation_type: Some(operation_type.to_string()),
            connection: Some(connection.clone()),
            change_log: Some(change_log.clone()),
            parameters: Some(parameters.clone()),
            ..Operation::default()
        };
        self.transport.post(
            &self.path(&format!("/projects/{project_id}/operations")),
            Some(&operation),
        )
    }

    fn send_operation_event(
        &self,
        operation: &Operation,
        event: &OperationEvent,
    ) -> Result<OperationEvent> {
        let (project_id, operation_id) = operation_target(None, Some(operation))?;
        self.transport.post(
            &self.path(&format!(
                "/projects/{project_id}/operations/{operation_id}/operation-events"
            )),
            Some(event),
        )
    }

    fn send_operation_change_event(&self, event: &OperationChangeEvent) -> Result<()> {
        let (project_id, operation_id) =
            operation_target(event.project.as_ref(), event.operation.as_ref())?;
        self.transport.post::<_, IgnoredAny>(
            &self.path(&format!(
                "/projects/{project_id}/operations/{operation_id}/change-events"
            )),
            Some(event),
        )?;
        Ok(())
    }

    fn send_operation_changes(&self, change: &OperationChange) -> Result<()> {
        let (project_id, operation_id) =
            operation_target(change.project.as_ref(), change.operation.as_ref())?;
        let changes: Vec<HubChange> = change.change_sets.iter().cloned().map(HubChange).collect();
        self.transport.post::<_, IgnoredAny>(
            &self.path(&format!("/projects/{project_id}/operations/{operation_id}/changes")),
            Some(&changes),
        )?;
        Ok(())
    }
}
