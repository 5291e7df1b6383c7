//! Cloud identity graph group directory
//!
//! Mirrors group memberships to a Microsoft Graph compatible endpoint.
//! Groups are resolved by object id or display name; members are added
//! through `POST /groups/{id}/members/$ref`. The bearer token is supplied
//! by the caller.

use crate::traits::{AddMemberOutcome, GroupDirectory};
use async_trait::async_trait;
use dirprov_core::config::GraphConfig;
use dirprov_core::types::{IdentityType, MemberIdentity, ObjectHandle, ObjectKind};
use dirprov_core::{Error, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectoryObject {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Collection<T> {
    value: Vec<T>,
}

/// Group directory backed by the identity graph REST API
#[derive(Debug, Clone)]
pub struct GraphGroupDirectory {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl GraphGroupDirectory {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub fn from_config(config: &GraphConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::new(client, &config.endpoint, &config.access_token))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// GET `url`; a 404 yields `None`
    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .header("ConsistencyLevel", "eventual")
            .send()
            .await
            .map_err(|e| Error::remote(format!("Graph request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Remote(format!("Graph returned {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| Error::remote(format!("Invalid graph response: {}", e)))
    }

    /// First object of a filtered collection query
    async fn first_match(&self, collection: &str, filter: &str) -> Result<Option<DirectoryObject>> {
        let url = format!(
            "{}/{}?$filter={}&$select=id,displayName&$count=true",
            self.endpoint,
            collection,
            urlencoding::encode(filter)
        );
        Ok(self
            .get::<Collection<DirectoryObject>>(&url)
            .await?
            .and_then(|list| list.value.into_iter().next()))
    }

    async fn member_id(&self, member: &MemberIdentity) -> Result<String> {
        let found = match member.identity_type {
            IdentityType::UserPrincipalName => {
                let url = format!(
                    "{}/users/{}?$select=id,displayName",
                    self.endpoint,
                    urlencoding::encode(&member.value)
                );
                self.get::<DirectoryObject>(&url).await?
            }
            IdentityType::SamAccountName => {
                let filter = format!("onPremisesSamAccountName eq {}", odata_literal(&member.value));
                self.first_match("users", &filter).await?
            }
            IdentityType::DistinguishedName => {
                return Err(Error::InvalidArgument(
                    "Distinguished names cannot identify graph members".into(),
                ))
            }
        };

        found
            .map(|user| user.id)
            .ok_or_else(|| Error::not_found("user", member.value.clone()))
    }
}

#[async_trait]
impl GroupDirectory for GraphGroupDirectory {
    #[instrument(skip(self))]
    async fn find_group(&self, name: &str) -> Result<Option<ObjectHandle>> {
        let group = if is_object_id(name) {
            let url = format!("{}/groups/{}?$select=id,displayName", self.endpoint, name);
            self.get::<DirectoryObject>(&url).await?
        } else {
            let filter = format!("displayName eq {}", odata_literal(name));
            self.first_match("groups", &filter).await?
        };

        Ok(group.map(|g| {
            let display = g.display_name.unwrap_or_else(|| name.to_string());
            ObjectHandle::new(g.id, display, ObjectKind::Group)
        }))
    }

    #[instrument(skip(self, group, member), fields(group = %group.dn, member = %member))]
    async fn add_member(
        &self,
        group: &ObjectHandle,
        member: &MemberIdentity,
    ) -> Result<AddMemberOutcome> {
        let member_id = self.member_id(member).await?;
        let url = format!("{}/groups/{}/members/$ref", self.endpoint, group.dn);
        let body = serde_json::json!({
            "@odata.id": format!("{}/directoryObjects/{}", self.endpoint, member_id)
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::remote(format!("Graph request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            info!("Member added to graph group");
            return Ok(AddMemberOutcome::Added);
        }

        let text = response.text().await.unwrap_or_default();
        match status {
            StatusCode::BAD_REQUEST if text.contains("already exist") => {
                debug!("Member already present in graph group");
                Ok(AddMemberOutcome::AlreadyMember)
            }
            StatusCode::NOT_FOUND => Err(Error::not_found("group", group.name.clone())),
            _ => Err(Error::Remote(format!("Graph returned {}: {}", status, text))),
        }
    }
}

/// Quote `value` as an OData string literal
fn odata_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Whether `value` has the 8-4-4-4-12 hex shape of a directory object id
fn is_object_id(value: &str) -> bool {
    let parts: Vec<&str> = value.split('-').collect();
    parts.len() == 5
        && parts
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(part, len)| part.len() == len && part.chars().all(|c| c.is_ascii_hexdigit()))
}
