// SPDX-FileCopyrightText: 2025 AyaSanae
//
// SPDX-License-Identifier: GPL-3.0-only

use std::{
    fmt::{self, Display},
    future::Future,
    time::Duration,
};

use log::{error, info};
use tokio::time::{MissedTickBehavior, interval};

use crate::{datapath::Datapath, error::CounterError, session::Session};

/// Something worth telling the operator.
#[derive(Debug)]
pub enum Report<'a> {
    Monitoring(&'a str),
    Count(u64),
    Signal,
    LookupFault(&'a CounterError),
}

impl Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Monitoring(iface) => write!(f, "Counting incoming packets on {iface}.."),
            Report::Count(count) => write!(f, "Received {count} packets"),
            Report::Signal => write!(f, "Received signal, exiting.."),
            Report::LookupFault(e) => write!(f, "Counter lookup failed, exiting..: {e}"),
        }
    }
}

pub trait Reporter {
    fn report(&mut self, report: Report<'_>);
}

/// Writes reports through `log`.
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&mut self, report: Report<'_>) {
        match report {
            Report::LookupFault(_) => error!("{report}"),
            _ => info!("{report}"),
        }
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum Outcome {
    Shutdown,
    LookupFault(CounterError),
}

impl Outcome {
    pub fn exit_status(&self) -> u8 {
        match self {
            Outcome::Shutdown => 0,
            Outcome::LookupFault(_) => 1,
        }
    }
}

/// Polls the counter of an attached [`Session`] until told to stop.
pub struct Supervisor<D: Datapath, R: Reporter> {
    session: Session<D>,
    poll_interval: Duration,
    reporter: R,
}

impl<D: Datapath, R: Reporter> Supervisor<D, R> {
    /// Loads, resolves and attaches. Nothing stays acquired on error.
    pub fn start(
        datapath: D,
        iface: &str,
        poll_interval: Duration,
        reporter: R,
    ) -> Result<Self, CounterError> {
        let session = Session::open(datapath, iface)?;
        Ok(Self {
            session,
            poll_interval,
            reporter,
        })
    }

    /// Reports the running total on every tick until `shutdown` resolves or a
    /// read fails, then detaches and unloads.
    pub async fn run<S>(mut self, shutdown: S) -> Outcome
    where
        S: Future<Output = ()>,
    {
        if let Some(iface) = self.session.interface() {
            self.reporter.report(Report::Monitoring(&iface.name));
        }

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break Outcome::Shutdown,
                _ = ticker.tick() => match self.session.read_counter() {
                    Ok(count) => self.reporter.report(Report::Count(count)),
                    Err(e) => break Outcome::LookupFault(e),
                },
            }
        };

        self.session.teardown();

        match &outcome {
            Outcome::Shutdown => self.reporter.report(Report::Signal),
            Outcome::LookupFault(e) => self.reporter.report(Report::LookupFault(e)),
        }
        outcome
    }
}
