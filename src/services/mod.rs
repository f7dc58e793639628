pub mod campaign_service;
pub mod list_service;
pub mod maintenance_service;
pub mod personalize;
pub mod send_service;
pub mod tracking;
