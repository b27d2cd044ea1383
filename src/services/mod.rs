// 服务层模块
pub mod events;
pub mod retry;
pub mod transport;

// 网关接口客户端
pub mod graphman_client;
pub mod restman_client;
pub mod restman_xml;

// 遍历与去重
pub mod inventory;
pub mod traversal;

#[cfg(test)]
pub(crate) mod testing;

pub use events::{EventSink, InventoryEvent, MemorySink, TracingSink};
pub use graphman_client::{GraphmanClient, ServiceQuery};
pub use inventory::{InventoryEntry, InventoryMap, MergeOutcome};
pub use restman_client::{FolderSource, RestmanClient};
pub use retry::RetryPolicy;
pub use transport::{Credentials, GatewayContext, HttpTransport, Transport};
pub use traversal::{DependencyTraversal, QueryTraversal};
