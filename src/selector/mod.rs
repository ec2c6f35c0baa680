//! Selector mini-language
//!
//! Selectors mix XPath-like path syntax with CSS execution:
//! - `/` child and `//` descendant steps
//! - `@name`, `text()`, `node()` value accessors
//! - `..` parent and `following-sibling::` axes
//! - `[@a='v']`, `[contains(@a,'v')]`, `[contains(text(),'v')]`, `[n]`, `[@a]` filters
//!
//! Each selector is tokenized once into [`Descendant`] steps; quoted
//! literals are carried as tokens so a `/` inside them never splits a step.

mod descendant;
mod filter;
mod steps;
mod translate;

pub use descendant::{Axis, Descendant, StepNode, Terminal};
pub use filter::Filter;
pub use steps::{split_last_step, split_steps};
pub use translate::{to_css, Translation};
