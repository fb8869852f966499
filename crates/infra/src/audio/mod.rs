//! Platform-specific host device enumeration using CPAL
//!
//! CPAL abstracts the platform audio APIs:
//! - Windows: WASAPI
//! - Linux: ALSA/PulseAudio
//! - macOS: CoreAudio

pub mod cpal_backend;

pub use cpal_backend::*;
