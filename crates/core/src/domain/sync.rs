//! Synchronization driver
//!
//! One pass reports what the controller currently uses, then pushes the
//! configured device for every route. Route-level failures are reported and
//! skipped; only a broken controller connection ends the pass early.

use crate::domain::config::Route;
use crate::domain::device::{DefaultsContext, DeviceError, Direction, NativeId, Resolved};
use crate::domain::directory::{format_listing, DeviceDirectory, Lookup};
use crate::domain::session::{ControlSession, RpcChannel, SessionError};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors raised while processing a route or a report entry
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl SyncError {
    /// Whether the pass can continue with the next route
    pub fn is_route_scoped(&self) -> bool {
        match self {
            SyncError::Device(DeviceError::OsError(_)) => false,
            SyncError::Device(_) => true,
            SyncError::Session(SessionError::Transport(_)) => false,
            SyncError::Session(_) => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// What a special source is currently set to, from the host's point of view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceAssignment {
    /// Follows the system default device
    SystemDefault,
    /// A device the host currently exposes
    Device { name: String, id: NativeId },
    /// An id the host does not know (unplugged, or another machine's)
    Unknown(NativeId),
    /// The source could not be read, e.g. it is not an audio source
    Unreadable(String),
}

/// One line of the pre-sync report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub role: String,
    pub source_name: String,
    pub assignment: SourceAssignment,
}

/// Result of processing one route
#[derive(Debug)]
pub enum RouteOutcome {
    Applied {
        route: Route,
        source_name: String,
        device: Resolved,
    },
    Skipped {
        route: Route,
        error: SyncError,
    },
}

impl RouteOutcome {
    pub fn route(&self) -> &Route {
        match self {
            RouteOutcome::Applied { route, .. } | RouteOutcome::Skipped { route, .. } => route,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, RouteOutcome::Applied { .. })
    }

    /// Operator-facing explanation for a skipped route
    pub fn diagnostic(&self) -> Option<String> {
        let RouteOutcome::Skipped { route, error } = self else {
            return None;
        };
        let mut message = format!(
            "Skipped {} route '{}' (device {}): {}",
            route.direction, route.source_role, route.device, error
        );
        match error {
            SyncError::Device(DeviceError::NotFound { direction, available, .. })
            | SyncError::Device(DeviceError::UnknownNativeId { direction, available, .. }) => {
                message.push('\n');
                message.push_str(&format_listing(*direction, available, false));
            }
            SyncError::Device(DeviceError::Ambiguous { candidates, direction, .. }) => {
                message.push('\n');
                message.push_str(&format_listing(*direction, candidates, true));
            }
            _ => {}
        }
        Some(message)
    }
}

/// Everything one pass did
#[derive(Debug, Default)]
pub struct SyncSummary {
    pub report: Vec<SourceReport>,
    pub outcomes: Vec<RouteOutcome>,
}

impl SyncSummary {
    pub fn applied(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_applied()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.applied()
    }
}

/// Drives the controller's sources to match the configured routes
pub struct SyncDriver<C: RpcChannel> {
    directory: DeviceDirectory,
    session: ControlSession<C>,
    defaults: DefaultsContext,
}

impl<C: RpcChannel> SyncDriver<C> {
    pub fn new(directory: DeviceDirectory, session: ControlSession<C>, defaults: DefaultsContext) -> Self {
        Self {
            directory,
            session,
            defaults,
        }
    }

    pub fn defaults(&self) -> &DefaultsContext {
        &self.defaults
    }

    pub fn session(&self) -> &ControlSession<C> {
        &self.session
    }

    pub fn into_session(self) -> ControlSession<C> {
        self.session
    }

    /// Read-only view of every special source's current device
    pub async fn report(&mut self) -> Result<Vec<SourceReport>> {
        let sources = self.session.special_sources().await?;
        let mut report = Vec::with_capacity(sources.len());

        for (role, source_name) in sources {
            let assignment = match self.session.source_device_id(&source_name).await {
                Ok(id) => self.classify(id)?,
                Err(SessionError::Transport(e)) => return Err(SessionError::Transport(e).into()),
                Err(e) => SourceAssignment::Unreadable(e.to_string()),
            };

            match &assignment {
                SourceAssignment::SystemDefault => {
                    info!("{} is set to 'default'", source_name)
                }
                SourceAssignment::Device { name, id } => {
                    info!("{} is set to '{}'", source_name, name);
                    debug!(source = %source_name, id = %id, "Native device id");
                }
                SourceAssignment::Unknown(id) => {
                    info!("{} is set to a device-id unknown to the host: '{}'", source_name, id)
                }
                SourceAssignment::Unreadable(reason) => {
                    warn!(source = %source_name, reason = %reason, "Could not read source device")
                }
            }

            report.push(SourceReport {
                role,
                source_name,
                assignment,
            });
        }
        Ok(report)
    }

    fn classify(&self, id: NativeId) -> Result<SourceAssignment> {
        if id.is_default() {
            return Ok(SourceAssignment::SystemDefault);
        }
        Ok(match self.directory.resolve_by_native_id(&id)? {
            Lookup::Found(record) => SourceAssignment::Device {
                name: record.name,
                id,
            },
            Lookup::Default => SourceAssignment::SystemDefault,
            Lookup::NotFound => SourceAssignment::Unknown(id),
        })
    }

    /// Push every route, inputs first, then outputs, keeping config order
    /// within each group.
    pub async fn apply(&mut self, routes: &[Route]) -> Result<Vec<RouteOutcome>> {
        let mut outcomes = Vec::with_capacity(routes.len());

        for direction in [Direction::Input, Direction::Output] {
            let group: Vec<&Route> = routes.iter().filter(|r| r.direction == direction).collect();
            if group.is_empty() {
                continue;
            }
            info!("Setting {} devices", direction);

            for route in group {
                match self.apply_route(route).await {
                    Ok((source_name, device)) => outcomes.push(RouteOutcome::Applied {
                        route: route.clone(),
                        source_name,
                        device,
                    }),
                    Err(e) if e.is_route_scoped() => {
                        let outcome = RouteOutcome::Skipped {
                            route: route.clone(),
                            error: e,
                        };
                        if let Some(diagnostic) = outcome.diagnostic() {
                            warn!("{}", diagnostic);
                        }
                        outcomes.push(outcome);
                    }
                    Err(e) => {
                        error!(route = %route.source_role, error = %e, "Aborting synchronization pass");
                        return Err(e);
                    }
                }
            }
        }
        Ok(outcomes)
    }

    async fn apply_route(&mut self, route: &Route) -> Result<(String, Resolved)> {
        let source_name = self.session.source_name_for_role(&route.source_role).await?;
        let device = self
            .directory
            .resolve_spec(&route.device, route.direction, &self.defaults, true)?;

        match &device {
            Resolved::Device(record) => info!(
                "Setting source {} to host device {}",
                source_name, record.name
            ),
            Resolved::Default => info!("Setting source {} to the system default", source_name),
        }
        self.session
            .set_source_device_id(&source_name, &device.native_id())
            .await?;
        Ok((source_name, device))
    }

    /// Full pass: connect, report, apply, disconnect.
    ///
    /// The session is closed even when the pass aborts.
    pub async fn run(&mut self, routes: &[Route]) -> Result<SyncSummary> {
        let result = self.pass(routes).await;
        if let Err(e) = self.session.disconnect().await {
            warn!(error = %e, "Failed to close controller connection");
        }

        let summary = result?;
        info!(
            applied = summary.applied(),
            skipped = summary.skipped(),
            "Synchronization pass finished"
        );
        Ok(summary)
    }

    async fn pass(&mut self, routes: &[Route]) -> Result<SyncSummary> {
        self.session.connect().await?;
        let report = self.report().await?;
        let outcomes = self.apply(routes).await?;
        Ok(SyncSummary { report, outcomes })
    }
}
