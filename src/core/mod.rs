pub mod fanout;
pub mod orchestrator;
pub mod transfer_agent;
