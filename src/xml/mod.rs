//! Context-stack driven XML loading.
//!
//! ```text
//! <root>                      stack: [root]
//!   <index file="c.xml">      handler(root, index) ─► include c.xml (fresh stack)
//!                                                 ─► push "index"
//!     <component id=".."/>    stack: [root, index]  handler(index, component)
//!   </index>                  pop ─► [root]
//!   <unknown>...</unknown>    no handler ─► policy (ignore subtree by default)
//! </root>                     end of stream: only the initial context left
//! ```
//!
//! Loaders describe their document shape with a [`HandlerTable`] of
//! [`ParseContext`]s and run it with an [`XmlLoader`]. Handlers may mutate the
//! loader state, push a context for the children of the current element,
//! include another file through the virtual filesystem, or stop the parse.

mod attributes;
mod context;
mod loader;

pub use attributes::AttributeSet;
pub use context::{Flow, Handler, HandlerTable, ParseContext, UnknownElementPolicy};
pub use loader::{ParseOutcome, ParseScope, XmlLoader};
