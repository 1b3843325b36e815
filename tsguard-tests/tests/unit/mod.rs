//! Unit tests for tsguard building blocks

mod agent_config;
mod archive;
mod config;
mod credentials;
mod sniff;
