//! Account vending workflow.
//!
//! The stages of the provisioning workflow and the services around them:
//!
//! - [`validation`] - Normalize and validate a request
//! - [`orchestrator`] - Start provisioning through the catalog
//! - [`poller`] - Report provisioning progress
//! - [`reconciler`] - Record success, compensate failures
//! - [`dispatcher`] - Start executions from the store change feed
//! - [`bootstrap`] - Import accounts already in the organization
//! - [`intake`] - Front door for creating and looking up requests
//! - [`org_units`] - Organizational unit path resolution
//! - [`workflow`] - In-process runner chaining the stages
//!
//! External services are reached through the traits in [`ports`].

pub mod bootstrap;
pub mod dispatcher;
pub mod intake;
pub mod memory;
pub mod orchestrator;
pub mod org_units;
pub mod poller;
pub mod ports;
pub mod reconciler;
pub mod validation;
pub mod workflow;

pub use bootstrap::{BootstrapJob, BootstrapSummary};
pub use dispatcher::{ChangeDispatcher, DispatchSummary, StreamBatch, StreamRecord};
pub use intake::{AccountIntake, CreateAccountBody, IntakeError};
pub use memory::InMemoryAccountStore;
pub use orchestrator::{ProvisioningConfig, ProvisioningOrchestrator};
pub use org_units::{OrgUnitResolver, UNKNOWN_PATH};
pub use poller::{PollOutcome, StatusPoller};
pub use ports::{
    AccountStore, OrgDirectory, ProvisioningCatalog, RecordUpdate, ServiceError, StoreError,
    WorkflowLauncher,
};
pub use reconciler::{CompensationAck, CompensationStatus, Reconciler};
pub use validation::RequestValidator;
pub use workflow::{InlineWorkflow, WorkflowConfig, WorkflowOutcome};
