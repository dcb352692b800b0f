pub mod cli;
pub mod config;
pub mod controller;
pub mod dahua;
pub mod digest;
pub mod estimator;
pub mod feed;
pub mod gateway;
pub mod http_client;
pub mod ingest;
pub mod mode;
pub mod observation;
pub mod onvif_gateway;
pub mod onvif_requests;
pub mod pan_tilt;
pub mod pulse;
pub mod scheduler;
pub mod soap;
pub mod target_selector;
pub mod wsse;
pub mod zoom;
