//! Priority failover across telemetry sources.

use std::sync::Arc;

use simhud_telemetry_adapters::{Snapshot, SyntheticSource, TelemetrySource};
use tracing::{debug, info};

/// Which source supplied a tick's snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub source: Arc<str>,
    pub snapshot: Snapshot,
    /// Position in the priority list, `None` for the synthetic fallback.
    pub index: Option<usize>,
}

/// Sources in priority order with the synthetic source as the final entry.
///
/// Each call to [`Failover::poll`] runs one tick of selection:
///
/// 1. every disconnected source gets one `update`, which is its only
///    chance to reconnect;
/// 2. the first connected source supplies the snapshot, reusing the result
///    from step 1 when it just reconnected, otherwise polling it once;
/// 3. a source that drops during its poll is skipped and selection moves on;
/// 4. when nothing is connected the synthetic source supplies the snapshot.
///
/// No source is polled twice in one tick.
pub struct Failover {
    sources: Vec<Box<dyn TelemetrySource>>,
    names: Vec<Arc<str>>,
    fresh: Vec<Option<Snapshot>>,
    fallback: SyntheticSource,
    fallback_name: Arc<str>,
    active: Option<Arc<str>>,
    switches: u64,
}

impl Failover {
    pub fn new(sources: Vec<Box<dyn TelemetrySource>>, fallback: SyntheticSource) -> Self {
        let names = sources.iter().map(|source| Arc::from(source.name())).collect();
        let fresh = vec![None; sources.len()];
        let fallback_name = Arc::from(fallback.name());
        Self {
            sources,
            names,
            fresh,
            fallback,
            fallback_name,
            active: None,
            switches: 0,
        }
    }

    pub fn poll(&mut self) -> Selection {
        for (slot, source) in self.fresh.iter_mut().zip(self.sources.iter_mut()) {
            *slot = if source.connected() {
                None
            } else {
                Some(source.update())
            };
        }

        let mut selected = None;
        for (index, (slot, source)) in self
            .fresh
            .iter_mut()
            .zip(self.sources.iter_mut())
            .enumerate()
        {
            if !source.connected() {
                continue;
            }
            let snapshot = match slot.take() {
                Some(snapshot) => snapshot,
                None => {
                    let snapshot = source.update();
                    if !source.connected() {
                        debug!(source = %source.name(), "Source dropped while selected");
                        continue;
                    }
                    snapshot
                }
            };
            selected = Some((index, snapshot));
            break;
        }

        let selection = match selected.and_then(|(index, snapshot)| {
            self.names.get(index).map(|name| Selection {
                source: Arc::clone(name),
                snapshot,
                index: Some(index),
            })
        }) {
            Some(selection) => selection,
            None => Selection {
                source: Arc::clone(&self.fallback_name),
                snapshot: self.fallback.update(),
                index: None,
            },
        };

        self.note_active(&selection.source);
        selection
    }

    fn note_active(&mut self, source: &Arc<str>) {
        match &self.active {
            Some(current) if current == source => {}
            Some(current) => {
                info!(from = %current, to = %source, "Telemetry source switched");
                self.switches = self.switches.saturating_add(1);
                self.active = Some(Arc::clone(source));
            }
            None => {
                info!(source = %source, "Telemetry source selected");
                self.active = Some(Arc::clone(source));
            }
        }
    }

    /// Name of the source that supplied the most recent tick.
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Number of times the supplying source changed since construction.
    pub fn switches(&self) -> u64 {
        self.switches
    }

    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|name| name.as_ref())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Forget the active source so the next run logs its first selection.
    pub(crate) fn reset_active(&mut self) {
        self.active = None;
    }
}

impl std::fmt::Debug for Failover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Failover")
            .field("sources", &self.names)
            .field("active", &self.active)
            .field("switches", &self.switches)
            .finish_non_exhaustive()
    }
}
