//! Terminal UI module using ratatui.
//!
//! - `render`: frame layout, title and status bars, overlays
//! - `dashboard`: task selection, run parameters, recent runs
//! - `input`: keyboard event handling
//! - `styles`: color scheme and text styling

pub mod dashboard;
pub mod input;
pub mod render;
pub mod styles;
