//! VISA-backed GPIB transport.
//!
//! Wraps the `visa-rs` bindings with the async [`Transport`] interface.
//! VISA calls are synchronous, so each operation runs on Tokio's blocking
//! executor, mirroring how the serial drivers wrap their blocking ports.
//!
//! Gated behind the `instrument_visa` feature; a National Instruments (or
//! compatible) VISA runtime must be installed on the host.

use crate::error::{Error, Result};
use crate::transport::Transport;
use async_trait::async_trait;
use std::ffi::CString;
use std::io::{BufRead, BufReader, Write as _};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use visa_rs::prelude::*;

/// GPIB transport over a VISA resource such as `GPIB0::23::INSTR`.
pub struct VisaTransport {
    instr: Arc<Mutex<Instrument>>,
    address: String,
}

impl VisaTransport {
    /// Open the instrument at a GPIB primary address on the default board.
    pub fn open_gpib(address: u8) -> Result<Self> {
        Self::open(&format!("GPIB0::{address}::INSTR"))
    }

    /// Open any VISA resource string.
    ///
    /// Failure here means the bus cannot reach the instrument (missing
    /// VISA runtime, wrong address, device powered off) and is fatal to
    /// the session being constructed.
    pub fn open(resource: &str) -> Result<Self> {
        let unavailable = |reason: String| Error::DeviceUnavailable {
            address: resource.to_string(),
            reason,
        };
        let rm = DefaultRM::new().map_err(|e| unavailable(e.to_string()))?;
        let name = CString::new(resource).map_err(|e| unavailable(e.to_string()))?;
        let instr = rm
            .open(&name.into(), AccessMode::NO_LOCK, Duration::from_secs(5))
            .map_err(|e| unavailable(e.to_string()))?;
        // Queue service-request events so wait_for_event can block on them.
        instr
            .enable_event(EventKind::ServiceReq, Mechanism::Queue, EventFilter::Null)
            .map_err(|e| unavailable(e.to_string()))?;
        Ok(Self {
            instr: Arc::new(Mutex::new(instr)),
            address: resource.to_string(),
        })
    }

    /// The VISA resource string this transport is bound to.
    pub fn address(&self) -> &str {
        &self.address
    }

    async fn blocking<F, R>(&self, op: F) -> Result<R>
    where
        F: FnOnce(&mut Instrument) -> std::result::Result<R, String> + Send + 'static,
        R: Send + 'static,
    {
        let instr = Arc::clone(&self.instr);
        tokio::task::spawn_blocking(move || {
            let mut guard = instr
                .lock()
                .map_err(|_| "VISA handle poisoned".to_string())?;
            op(&mut guard)
        })
        .await
        .map_err(|e| Error::Transport(format!("blocking task failed: {e}")))?
        .map_err(Error::Transport)
    }
}

#[async_trait]
impl Transport for VisaTransport {
    async fn write(&mut self, cmd: &str) -> Result<()> {
        let line = format!("{cmd}\n");
        log::trace!("{} <- '{}'", self.address, cmd);
        self.blocking(move |instr| {
            instr
                .write_all(line.as_bytes())
                .map_err(|e| format!("write failed: {e}"))
        })
        .await
    }

    async fn query(&mut self, cmd: &str) -> Result<String> {
        let line = format!("{cmd}\n");
        let response = self
            .blocking(move |instr| {
                instr
                    .write_all(line.as_bytes())
                    .map_err(|e| format!("write failed: {e}"))?;
                let mut response = String::new();
                let mut reader = BufReader::new(&*instr);
                reader
                    .read_line(&mut response)
                    .map_err(|e| format!("read failed: {e}"))?;
                Ok(response.trim().to_string())
            })
            .await?;
        log::trace!("{} -> '{}'", self.address, response);
        Ok(response)
    }

    async fn wait_for_event(&mut self) -> Result<()> {
        // Indefinite block: the instrument signals completion via SRQ and
        // there is no timeout or cancellation path at this layer.
        self.blocking(|instr| {
            instr
                .wait_on_event(EventKind::ServiceReq, Duration::MAX)
                .map(|_| ())
                .map_err(|e| format!("SRQ wait failed: {e}"))
        })
        .await
    }
}
