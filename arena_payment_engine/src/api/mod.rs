pub mod match_flow_api;
pub mod objects;
pub mod wallet_api;
