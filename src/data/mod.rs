pub mod element;
pub use element::*;
