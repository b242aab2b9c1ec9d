mod entity;
mod node_id;
mod update;

pub use entity::{MAX_BIT_INDEX, Metric, Node, NodeKind, SensorReadings, round_tenths};
pub use node_id::NodeId;
pub use update::NodeUpdate;
