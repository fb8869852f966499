//! Switchboard core: device resolution and remote source synchronization

pub mod domain;
