use uuid::Uuid;

use crate::domain::{MembershipPlan, Resource, ResourceRef};

/// Read-only access to the plan and resource catalog.
///
/// Catalog maintenance (creating plans, editing resources) is routine
/// CRUD owned by an external collaborator; the engine only ever reads.
#[mockall::automock]
#[async_trait::async_trait]
pub trait CatalogPort {
    async fn get_plan(&self, plan_id: Uuid) -> Result<MembershipPlan, Error>;
    async fn get_resource(&self, resource: ResourceRef) -> Result<Resource, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("plan {0} does not exist")]
    PlanNotFound(Uuid),

    #[error("{0} does not exist")]
    ResourceNotFound(ResourceRef),

    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not part of the domain
    /// model, such as connectivity, configuration, or permission errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
