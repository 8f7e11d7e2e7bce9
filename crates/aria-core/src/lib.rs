//! Aria Core - Shared perception types, knowledge enums, clock, and error handling

pub mod clock;
pub mod error;
pub mod keywords;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use keywords::{normalize_keyword, normalize_keywords, tokenize};
pub use types::*;
