//! Shared utilities: address classification and visibility ranking.

pub mod ip_utils;

pub use ip_utils::{is_global_net, is_link_local, most_visible, visibility_cmp};
