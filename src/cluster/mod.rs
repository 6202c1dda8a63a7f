//! Everything that talks to the cluster: lifecycle control, status polling,
//! the key-value client, and the simulated cluster used without containers.

pub mod api;
pub mod controller;
pub mod launcher;
pub mod node;
pub mod sim;
pub mod transport;

pub use api::{ClusterApiClient, KvOutcome};
pub use controller::{ClusterController, LeaderRound};
pub use launcher::{ComposeLauncher, LaunchAction, Launcher};
pub use node::{Node, NodeStatus, Role};
pub use sim::SimCluster;
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};
