//! Hardware drivers.

pub mod tt_riing_quad;
