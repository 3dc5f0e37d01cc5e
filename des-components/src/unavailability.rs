//! Periodic server unavailability (breaks, meetings, other duties).

use std::rc::Rc;

use tracing::debug;

use crate::context::RunContext;
use crate::pool::Server;

/// Takes one unit of a server out of service on a fixed cycle.
///
/// Every `every` time units the process requests a unit at `priority`, which
/// on a priority server places it ahead of all patients, then holds it for
/// `duration`.
pub struct UnavailabilityProcess {
    server: Server,
    every: f64,
    duration: f64,
    priority: i64,
    ctx: Rc<RunContext>,
}

impl UnavailabilityProcess {
    pub(crate) fn new(
        server: Server,
        every: f64,
        duration: f64,
        priority: i64,
        ctx: Rc<RunContext>,
    ) -> Self {
        Self {
            server,
            every,
            duration,
            priority,
            ctx,
        }
    }

    pub async fn run(self) {
        let process = format!("{} unavailability", self.server.name());
        loop {
            match self.ctx.handle.timeout(self.every) {
                Ok(timeout) => timeout.await,
                Err(error) => return self.ctx.fail(process, error),
            }

            let lease = self.server.request(self.priority).await;
            debug!(
                resource = %self.server.name(),
                until = self.ctx.handle.now().as_f64() + self.duration,
                "Server unavailable"
            );
            match self.ctx.handle.timeout(self.duration) {
                Ok(timeout) => timeout.await,
                Err(error) => return self.ctx.fail(process, error),
            }
            lease.release();
            debug!(resource = %self.server.name(), "Server available again");
        }
    }
}
