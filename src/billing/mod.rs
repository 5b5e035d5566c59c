pub mod api;
pub mod gateway;
pub mod models;
pub mod service;
pub mod state;

pub use api::{
    change_plan as billing_change_plan, get_billing as billing_get_billing,
    list_plans as billing_list_plans, start_trial as billing_start_trial, BillingEnvelope,
    ChangePlanRequest,
};
pub use gateway::{BillingGateway, GatewayCustomer, StripeLikeGateway};
pub use models::Plan;
pub use service::BillingService;
pub use state::{BillingState, Transition, UnknownBillingState};
