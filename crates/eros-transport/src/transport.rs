use crate::error::Result;
use crate::stream::ErosStream;

/// A connectable endpoint.
///
/// `connect` is called once per connection attempt by the reconnector and must
/// return a fresh, fully connected stream. Implementations keep whatever they
/// need to retry (device path, host and port) and hold no open handles between
/// attempts; the returned [`ErosStream`] owns the OS resources.
pub trait Transport: Send + 'static {
    /// Open a new connection.
    fn connect(&mut self) -> Result<ErosStream>;

    /// Human-readable endpoint description for logs.
    fn describe(&self) -> String;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self) -> Result<ErosStream> {
        (**self).connect()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
