use crate::cancel::CancelToken;
use crate::device::GreatDancer;
use crate::transport::Transport;

/// Busy-wait limit used unless [`busy_wait_limit`](GreatDancerBuilder::busy_wait_limit) is set.
pub const DEFAULT_BUSY_WAIT_LIMIT: u32 = 100_000;

struct Config {
    busy_wait_limit: Option<u32>,
    cancel_token: CancelToken,
}

/// Used to build new [`GreatDancer`]s.
pub struct GreatDancerBuilder<T: Transport> {
    transport: T,
    config: Config,
}

macro_rules! builder_fields {
    ( $( $(#[$meta:meta])* $name:ident: $type:ty, )* ) => {
        $(
            $(#[$meta])*
            pub fn $name(mut self, $name: $type) -> Self {
                self.config.$name = $name;
                self
            }
        )*
    }
}

impl<T: Transport> GreatDancerBuilder<T> {
    /// Creates a builder for a controller reached through `transport`.
    pub fn new(transport: T) -> GreatDancerBuilder<T> {
        GreatDancerBuilder {
            transport,
            config: Config {
                busy_wait_limit: Some(DEFAULT_BUSY_WAIT_LIMIT),
                cancel_token: CancelToken::new(),
            },
        }
    }

    builder_fields! {
        /// Sets how many times a blocking read polls the transfer-complete register before giving
        /// up with [`Timeout`](crate::UsbError::Timeout). `None` waits forever, or until the
        /// cancellation token fires.
        ///
        /// Default: `Some(100_000)`
        busy_wait_limit: Option<u32>,

        /// Sets the token that stops the IRQ service loop. Keep a clone to cancel from another
        /// thread.
        ///
        /// Default: a fresh token
        cancel_token: CancelToken,
    }

    /// Creates a [`GreatDancer`] with the settings in this builder.
    pub fn build(self) -> GreatDancer<T> {
        GreatDancer::build(
            self.transport,
            self.config.busy_wait_limit,
            self.config.cancel_token,
        )
    }
}
