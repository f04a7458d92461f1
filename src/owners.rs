//! Owner resolution for failed databases.

use crate::client::CatalogApi;
use crate::error::{GovernanceError, GovernanceResult};
use crate::models::{DatabaseConnection, Owner};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Owners of one database asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOwners {
    pub database_id: String,
    pub database_name: Option<String>,
    /// One entry per distinct owner id; unresolved owners carry only their id
    pub owners: Vec<Owner>,
    /// Owner ids whose user record could not be fetched
    pub unresolved: Vec<String>,
}

impl ResolvedOwners {
    /// Warning for owners that could only be identified by id.
    pub fn partial_resolution(&self) -> Option<GovernanceError> {
        (!self.unresolved.is_empty()).then(|| {
            GovernanceError::partial_resolution(self.database_id.clone(), self.unresolved.clone())
        })
    }
}

/// Looks up database assets and the users that own them.
pub struct OwnerResolver<'a, A> {
    api: &'a A,
}

impl<'a, A: CatalogApi> OwnerResolver<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// Resolve the owners of a database asset.
    ///
    /// An asset without owners is a [`GovernanceError::DataInconsistency`]. A failed
    /// user lookup does not fail the call: the owner is kept by id and listed in
    /// `unresolved`.
    pub async fn resolve_owners(&self, database_id: &str) -> GovernanceResult<ResolvedOwners> {
        let asset = self.api.database_asset(database_id).await?;
        if asset.owner_ids.is_empty() {
            return Err(GovernanceError::data_inconsistency(
                database_id,
                "Database has no owners assigned",
            ));
        }

        let mut owners = Vec::with_capacity(asset.owner_ids.len());
        let mut unresolved = Vec::new();

        for user_id in &asset.owner_ids {
            match self.api.user(user_id).await {
                Ok(record) => {
                    let owner = Owner::from_record(user_id.as_str(), record);
                    debug!(user_id = %user_id, owner = %owner.label(), "Resolved owner");
                    owners.push(owner);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        database_id = %database_id,
                        user_id = %user_id,
                        error = %e,
                        "Owner lookup failed, keeping owner by id"
                    );
                    unresolved.push(user_id.clone());
                    owners.push(Owner::unresolved(user_id.as_str()));
                }
            }
        }

        Ok(ResolvedOwners {
            database_id: asset.id,
            database_name: asset.name,
            owners,
            unresolved,
        })
    }

    /// Cataloged databases registered under an edge connection.
    pub async fn databases_for_edge(
        &self,
        edge_connection_id: &str,
    ) -> GovernanceResult<Vec<DatabaseConnection>> {
        let connections = self
            .api
            .database_connections(Some(edge_connection_id))
            .await?;
        let total = connections.len();
        let cataloged: Vec<_> = connections
            .into_iter()
            .filter(DatabaseConnection::is_cataloged)
            .collect();

        debug!(
            edge_connection_id = %edge_connection_id,
            total,
            cataloged = cataloged.len(),
            "Database connections for edge"
        );
        Ok(cataloged)
    }
}

/// Owners of one failed connection, deduplicated by user id.
///
/// Each owner remembers the first database it was found on.
#[derive(Debug, Clone, Default)]
pub struct OwnerSet {
    entries: Vec<(Owner, String)>,
    index: HashMap<String, usize>,
}

impl OwnerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an owner; returns false if the user id was already present.
    ///
    /// A duplicate that carries contact details fills in an id-only entry.
    pub fn insert(&mut self, owner: Owner, database_id: &str) -> bool {
        match self.index.get(&owner.user_id) {
            Some(&pos) => {
                let existing = &mut self.entries[pos].0;
                if existing.email.is_none() && existing.display_name.is_none() {
                    *existing = owner;
                }
                false
            }
            None => {
                self.index.insert(owner.user_id.clone(), self.entries.len());
                self.entries.push((owner, database_id.to_string()));
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Owners in first-seen order, each with its first database id.
    pub fn iter(&self) -> impl Iterator<Item = (&Owner, &str)> {
        self.entries.iter().map(|(owner, db)| (owner, db.as_str()))
    }

    pub fn owners(&self) -> impl Iterator<Item = &Owner> {
        self.entries.iter().map(|(owner, _)| owner)
    }
}
