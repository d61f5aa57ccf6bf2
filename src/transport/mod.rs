//! Bus transport abstraction.
//!
//! A [`Session`](crate::session::Session) holds a transport capability
//! object instead of inheriting from a bus handle, so the GPIB backend is
//! substitutable: the real [`VisaTransport`] for hardware, a
//! [`MockTransport`] for tests and offline development.

use crate::error::Result;
use crate::scpi;
use async_trait::async_trait;

pub mod mock;
#[cfg(feature = "instrument_visa")]
pub mod visa;

pub use mock::MockTransport;
#[cfg(feature = "instrument_visa")]
pub use visa::VisaTransport;

/// An ASCII command channel to one instrument.
///
/// Implementations are free-form about the underlying bus; the session
/// layer only needs these four capabilities. `wait_for_event` blocks with
/// no timeout; bounded waiting, if needed, is the caller's concern.
#[async_trait]
pub trait Transport: Send {
    /// Send a command. No response is expected.
    async fn write(&mut self, cmd: &str) -> Result<()>;

    /// Send a query and return the raw response text.
    async fn query(&mut self, cmd: &str) -> Result<String>;

    /// Send a query and parse the response as comma-separated floats.
    async fn query_values(&mut self, cmd: &str) -> Result<Vec<f64>> {
        let raw = self.query(cmd).await?;
        scpi::parse_values(&raw)
    }

    /// Block until the instrument raises a service request.
    async fn wait_for_event(&mut self) -> Result<()>;
}
