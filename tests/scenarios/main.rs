//! Scenario tests for the deploy agent, driven through mock capabilities

mod helpers;

mod retry_budget;
mod single_flight;
