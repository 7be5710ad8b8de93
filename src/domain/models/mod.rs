//! Domain models: plain data types with no I/O.

pub mod condition;
pub mod event;
pub mod rule;
pub mod service_operation;
pub mod task;

pub use condition::{ComparisonOperator, ConditionCategory, ConditionNode, LeafCondition, LogicalOperator};
pub use event::{EventKind, TaskEvent};
pub use rule::{CreationRecipe, Rule, RuleStatus, TaskTemplate};
pub use service_operation::{OperationPriority, ServiceKind, ServiceOperation};
pub use task::{Complexity, RelationKind, SyncStatus, Task, TaskMetadata, TaskPriority, TaskStatus, TripleSyncRecord};
