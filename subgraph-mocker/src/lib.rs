//! A router coprocessor that answers subgraph requests with generated mock data.
//!
//! Every `SubgraphRequest` payload received from the router is turned into a prompt, sent to a
//! [`Generator`](subgraph_validator::Generator), and the generated data is validated (and
//! corrected once if needed) against the schema of the subgraph before the request is
//! short-circuited with the mock response.

pub mod configuration;
mod coprocessor;
mod executable;
mod external;
pub mod generator;
pub mod server;

pub use coprocessor::Mocker;
pub use executable::main;
