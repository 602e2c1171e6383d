mod errors;
mod order_item;
mod stage;
mod transition;
mod workflow;

pub use errors::DomainError;
pub use order_item::{ItemStatus, OrderItem, Priority};
pub use stage::StageDefinition;
pub use transition::{TransitionAction, TransitionRecord};
pub use workflow::Workflow;
