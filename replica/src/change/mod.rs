pub mod change_tree;
pub mod operation;

pub use change_tree::ChangeTree;
pub use operation::{ChangeOp, Incoming, OpKind, SlotId};
