pub mod approval;
pub mod follow_up;
pub mod function;
pub mod registry;
pub mod review_edit;
pub mod traits;

pub use approval::{ApprovalInfo, ApprovalResult, ApprovalWrapper};
pub use follow_up::{FollowUpAnswer, FollowUpInfo, FollowUpState, FollowUpTool};
pub use function::FunctionTool;
pub use registry::ToolRegistry;
pub use review_edit::{ReviewEditInfo, ReviewEditResult, ReviewEditWrapper};
pub use traits::{Tool, ToolError};

/// Register every payload type this crate can suspend with.
pub fn register_payloads(registry: &mut interlude_core::PayloadRegistry) {
    registry
        .register::<ApprovalInfo>()
        .register::<ReviewEditInfo>()
        .register::<FollowUpInfo>();
}
